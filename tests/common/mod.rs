//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use secrecy::SecretString;
use serde_json::{json, Value};

use storefront_sync::error::ShippingError;
use storefront_sync::handlers::{AdminAuth, AppState};
use storefront_sync::orders::{InMemoryOrderStore, Order, OrderSync, PaymentStatus, ShipmentRef};
use storefront_sync::shipping::{Carrier, ShippingOrderPayload, TrackingStatus};
use storefront_sync::webhook::{sign, SignatureVerifier, SIGNATURE_HEADER};

pub const WEBHOOK_SECRET: &str = "whsec_integration_0123456789";
pub const ADMIN_TOKEN: &str = "admin-token-integration-0123456789";

/// Build an order the way the `--orders` fixture file describes one
pub fn order(id: &str, gateway_order_id: &str, status: PaymentStatus) -> Order {
    serde_json::from_value(json!({
        "id": id,
        "payment_status": status,
        "gateway_order_id": gateway_order_id,
        "customer": {
            "first_name": "Vikram",
            "last_name": "Iyer",
            "email": "vikram@example.com",
            "phone": "9123456780",
            "address": {
                "line1": "44 Anna Salai",
                "city": "Chennai",
                "state": "Tamil Nadu",
                "pincode": "600002"
            }
        },
        "items": [
            { "name": "Clutch plate", "sku": "CP-310", "units": 1, "unit_price": 289_900 }
        ],
        "created_at": "2026-10-01T09:30:00Z",
        "updated_at": "2026-10-01T09:30:00Z"
    }))
    .expect("fixture order is valid")
}

/// Carrier double recording bookings
#[derive(Default)]
pub struct StubCarrier {
    pub bookings: AtomicU32,
}

impl StubCarrier {
    pub fn bookings(&self) -> u32 {
        self.bookings.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Carrier for StubCarrier {
    async fn create_shipment(
        &self,
        _payload: &ShippingOrderPayload,
    ) -> Result<ShipmentRef, ShippingError> {
        let n = self.bookings.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ShipmentRef {
            carrier_order_id: 7000 + u64::from(n),
            shipment_id: 8000 + u64::from(n),
            awb_code: Some(format!("AWB{n:04}")),
        })
    }

    async fn track_shipment(&self, awb_code: &str) -> Result<TrackingStatus, ShippingError> {
        Ok(TrackingStatus {
            awb_code: awb_code.to_string(),
            current_status: Some("In Transit".to_string()),
            shipment_status: Some(6),
            courier_name: Some("Blue Dart".to_string()),
            track_url: None,
            etd: None,
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryOrderStore,
    pub carrier: Arc<StubCarrier>,
}

/// Assemble the router over an in-memory store holding `orders`
pub fn app(orders: Vec<Order>, admin: bool) -> TestApp {
    let store = InMemoryOrderStore::with_orders(orders);
    let carrier = Arc::new(StubCarrier::default());

    let state = Arc::new(AppState {
        sync: OrderSync::new(Arc::new(store.clone())),
        verifier: SignatureVerifier::new(SecretString::from(WEBHOOK_SECRET.to_string())),
        carrier: carrier.clone(),
        pickup_location: "Primary".to_string(),
        admin: admin.then(|| AdminAuth::new(&SecretString::from(ADMIN_TOKEN.to_string()))),
    });

    TestApp {
        router: storefront_sync::server::router(state),
        store,
        carrier,
    }
}

pub fn capture_body(payment_id: &str, gateway_order_id: &str) -> Vec<u8> {
    json!({
        "id": format!("evt_{payment_id}"),
        "event": "payment.captured",
        "created_at": 1_790_000_000,
        "payload": {
            "payment": {
                "id": payment_id,
                "order_id": gateway_order_id,
                "amount": 289_900,
                "currency": "INR"
            }
        }
    })
    .to_string()
    .into_bytes()
}

/// A webhook request signed with the shared secret
pub fn signed_webhook(body: Vec<u8>) -> Request<Body> {
    let signature = sign(&body, WEBHOOK_SECRET.as_bytes());
    Request::post("/webhook")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .expect("valid request")
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is JSON")
}
