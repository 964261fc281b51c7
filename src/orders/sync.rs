//! Order sync
//!
//! Applies verified gateway events and carrier results to order records.
//! Every change goes through [`Order::transition`], so replays are no-ops
//! and stale events cannot move an order backwards.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::error::{Error, SyncError};
use crate::orders::model::{Order, PaymentStatus, ShipmentRef, Transition};
use crate::orders::store::OrderStore;
use crate::shipping::{Carrier, ShippingOrderPayload, TrackingStatus};
use crate::webhook::{
    PaymentCaptured, PaymentFailed, RefundProcessed, WebhookEvent, WebhookEventType,
};

/// What an event did to its order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The order changed
    Applied,
    /// The order already reflected the event
    AlreadyApplied,
    /// The event type is not one we act on
    Ignored,
}

type FulfilmentLocks = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Drives order status changes against an [`OrderStore`]
#[derive(Clone)]
pub struct OrderSync {
    store: Arc<dyn OrderStore>,
    /// One lock per order currently being fulfilled, shared across clones
    fulfilment_locks: FulfilmentLocks,
}

impl OrderSync {
    /// Create order sync over `store`
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            store,
            fulfilment_locks: Arc::default(),
        }
    }

    /// The backing store
    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// Route a verified event to its handler.
    ///
    /// Unknown event types are acknowledged and ignored.
    pub async fn dispatch(&self, event: &WebhookEvent) -> Result<SyncOutcome, Error> {
        let outcome = match event.event_type() {
            WebhookEventType::PaymentCaptured => {
                self.apply_payment_captured(&event.as_payment_captured()?).await?
            }
            WebhookEventType::PaymentFailed => {
                self.apply_payment_failed(&event.as_payment_failed()?).await?
            }
            WebhookEventType::RefundProcessed => {
                self.apply_refund_processed(&event.as_refund_processed()?).await?
            }
            WebhookEventType::Unknown => {
                info!(event = %event.event, "Ignoring unhandled webhook event");
                SyncOutcome::Ignored
            }
        };
        Ok(outcome)
    }

    /// Mark the order paid and record the gateway payment id
    #[instrument(skip_all, fields(gateway_order_id = %event.payment.order_id, payment_id = %event.payment.id))]
    pub async fn apply_payment_captured(
        &self,
        event: &PaymentCaptured,
    ) -> Result<SyncOutcome, SyncError> {
        let payment = &event.payment;
        let order = self.load_by_gateway_order(&payment.order_id).await?;

        if order.payment_status.has_reached(PaymentStatus::Paid)
            && order.gateway_payment_id.as_deref() != Some(payment.id.as_str())
        {
            warn!(
                order_id = %order.id,
                stored_payment_id = ?order.gateway_payment_id,
                "Capture for an order already paid with a different payment"
            );
        }

        let payment_id = payment.id.clone();
        self.advance(order, PaymentStatus::Paid, "payment.captured", move |order| {
            order.gateway_payment_id = Some(payment_id);
        })
        .await
    }

    /// Cancel a pending order whose payment failed
    #[instrument(skip_all, fields(gateway_order_id = %event.payment.order_id, payment_id = %event.payment.id))]
    pub async fn apply_payment_failed(
        &self,
        event: &PaymentFailed,
    ) -> Result<SyncOutcome, SyncError> {
        let order = self.load_by_gateway_order(&event.payment.order_id).await?;

        // A failed attempt does not undo a capture that already succeeded
        if order.payment_status != PaymentStatus::Pending
            && order.payment_status != PaymentStatus::Cancelled
        {
            info!(
                order_id = %order.id,
                status = %order.payment_status,
                "Ignoring payment failure for an order past pending"
            );
            return Ok(SyncOutcome::AlreadyApplied);
        }

        self.advance(order, PaymentStatus::Cancelled, "payment.failed", |_| {})
            .await
    }

    /// Mark the order refunded
    #[instrument(skip_all, fields(gateway_order_id = %event.payment.order_id, refund_id = %event.refund.id))]
    pub async fn apply_refund_processed(
        &self,
        event: &RefundProcessed,
    ) -> Result<SyncOutcome, SyncError> {
        let order = self.load_by_gateway_order(&event.payment.order_id).await?;
        let payment_id = event.payment.id.clone();
        self.advance(order, PaymentStatus::Refunded, "refund.processed", move |order| {
            order.gateway_payment_id.get_or_insert(payment_id);
        })
        .await
    }

    /// Book a shipment for a paid order and mark it shipped.
    ///
    /// Calling this for an order that already shipped returns the stored
    /// booking without contacting the carrier. Concurrent calls for the same
    /// order run one at a time, so only the first books with the carrier.
    #[instrument(skip(self, carrier))]
    pub async fn fulfil_order(
        &self,
        order_id: &str,
        carrier: &dyn Carrier,
        pickup_location: &str,
    ) -> Result<ShipmentRef, SyncError> {
        let lock = self
            .fulfilment_locks
            .lock()
            .entry(order_id.to_string())
            .or_default()
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.fulfil_exclusive(order_id, carrier, pickup_location)
                .await
        };

        // Drop the entry once no other caller is waiting on it
        let mut locks = self.fulfilment_locks.lock();
        if locks
            .get(order_id)
            .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2)
        {
            locks.remove(order_id);
        }

        result
    }

    async fn fulfil_exclusive(
        &self,
        order_id: &str,
        carrier: &dyn Carrier,
        pickup_location: &str,
    ) -> Result<ShipmentRef, SyncError> {
        let mut order = self.load(order_id).await?;

        if let Some(shipment) = &order.shipment {
            if order.payment_status.has_reached(PaymentStatus::Shipped) {
                return Ok(shipment.clone());
            }
        }

        if order.payment_status != PaymentStatus::Paid {
            return Err(SyncError::InvalidTransition {
                order_id: order.id,
                from: order.payment_status,
                to: PaymentStatus::Shipped,
            });
        }

        let payload = ShippingOrderPayload::from_order(&order, pickup_location);
        let shipment = carrier.create_shipment(&payload).await?;

        order.transition(PaymentStatus::Shipped, "shipment.created", Utc::now())?;
        order.shipment = Some(shipment.clone());

        if let Err(e) = self.store.update(order).await {
            // The carrier booking exists even though we failed to record it
            error!(
                order_id,
                carrier_order_id = shipment.carrier_order_id,
                shipment_id = shipment.shipment_id,
                error = %e,
                "Shipment booked but order update failed"
            );
            return Err(e.into());
        }

        info!(order_id, shipment_id = shipment.shipment_id, "Order shipped");
        Ok(shipment)
    }

    /// Fetch tracking for a shipped order, marking it delivered when the
    /// carrier reports delivery
    #[instrument(skip(self, carrier))]
    pub async fn refresh_tracking(
        &self,
        order_id: &str,
        carrier: &dyn Carrier,
    ) -> Result<TrackingStatus, SyncError> {
        let order = self.load(order_id).await?;
        let awb = order
            .shipment
            .as_ref()
            .and_then(|s| s.awb_code.clone())
            .ok_or_else(|| SyncError::MissingShipment(order.id.clone()))?;

        let tracking = carrier.track_shipment(&awb).await?;

        if tracking.is_delivered() && order.payment_status == PaymentStatus::Shipped {
            self.advance(order, PaymentStatus::Delivered, "carrier.delivered", |_| {})
                .await?;
        }

        Ok(tracking)
    }

    async fn load(&self, order_id: &str) -> Result<Order, SyncError> {
        self.store
            .get(order_id)
            .await?
            .ok_or_else(|| SyncError::OrderNotFound(order_id.to_string()))
    }

    async fn load_by_gateway_order(&self, gateway_order_id: &str) -> Result<Order, SyncError> {
        match self.store.find_by_gateway_order_id(gateway_order_id).await? {
            Some(order) => Ok(order),
            None => {
                warn!(gateway_order_id, "Webhook references unknown order");
                Err(SyncError::OrderNotFound(gateway_order_id.to_string()))
            }
        }
    }

    async fn advance(
        &self,
        mut order: Order,
        to: PaymentStatus,
        source: &str,
        update: impl FnOnce(&mut Order),
    ) -> Result<SyncOutcome, SyncError> {
        let from = order.payment_status;

        match order.transition(to, source, Utc::now())? {
            Transition::AlreadyReached => {
                info!(order_id = %order.id, status = %from, source, "Event already reflected");
                Ok(SyncOutcome::AlreadyApplied)
            }
            Transition::Applied => {
                update(&mut order);
                let saved = self.store.update(order).await?;
                info!(
                    order_id = %saved.id,
                    from = %from,
                    to = %saved.payment_status,
                    source,
                    "Order status updated"
                );
                Ok(SyncOutcome::Applied)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PersistenceError, ShippingError};
    use crate::orders::model::fixtures;
    use crate::orders::store::InMemoryOrderStore;
    use crate::webhook::Payment;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn captured(payment_id: &str, order_id: &str) -> PaymentCaptured {
        PaymentCaptured {
            event_id: None,
            payment: Payment {
                id: payment_id.to_string(),
                order_id: order_id.to_string(),
                amount: None,
                currency: None,
                error_description: None,
            },
        }
    }

    fn sync_with(orders: Vec<Order>) -> (OrderSync, InMemoryOrderStore) {
        let store = InMemoryOrderStore::with_orders(orders);
        (OrderSync::new(Arc::new(store.clone())), store)
    }

    /// Carrier double that books fixed shipment ids and reports a fixed status
    struct FakeCarrier {
        bookings: AtomicU32,
        delivered: bool,
        reject: bool,
    }

    impl FakeCarrier {
        fn new() -> Self {
            Self {
                bookings: AtomicU32::new(0),
                delivered: false,
                reject: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl Carrier for FakeCarrier {
        async fn create_shipment(
            &self,
            payload: &ShippingOrderPayload,
        ) -> Result<ShipmentRef, ShippingError> {
            self.bookings.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(ShippingError::Provider {
                    status: 422,
                    body: format!("{{\"message\":\"bad pincode {}\"}}", payload.billing_pincode),
                });
            }
            Ok(ShipmentRef {
                carrier_order_id: 900,
                shipment_id: 901,
                awb_code: Some("AWB900".to_string()),
            })
        }

        async fn track_shipment(&self, awb_code: &str) -> Result<TrackingStatus, ShippingError> {
            Ok(TrackingStatus {
                awb_code: awb_code.to_string(),
                current_status: Some(if self.delivered { "Delivered" } else { "In Transit" }.to_string()),
                shipment_status: None,
                courier_name: None,
                track_url: None,
                etd: None,
            })
        }
    }

    #[tokio::test]
    async fn test_capture_marks_order_paid() {
        let (sync, store) = sync_with(vec![fixtures::order("o1", "ord_1", PaymentStatus::Pending)]);

        let outcome = sync.apply_payment_captured(&captured("pay_1", "ord_1")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Applied);

        let order = store.get("o1").await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_1"));
        assert_eq!(order.version, 1);
        assert_eq!(order.history.len(), 1);
    }

    #[tokio::test]
    async fn test_replayed_capture_is_idempotent() {
        let (sync, store) = sync_with(vec![fixtures::order("o1", "ord_1", PaymentStatus::Pending)]);
        let event = captured("pay_1", "ord_1");

        assert_eq!(sync.apply_payment_captured(&event).await.unwrap(), SyncOutcome::Applied);
        let after_first = store.get("o1").await.unwrap().unwrap();

        for _ in 0..3 {
            assert_eq!(
                sync.apply_payment_captured(&event).await.unwrap(),
                SyncOutcome::AlreadyApplied
            );
        }

        let after_replays = store.get("o1").await.unwrap().unwrap();
        assert_eq!(after_replays, after_first);
        assert_eq!(after_replays.history.len(), 1);
    }

    #[tokio::test]
    async fn test_capture_for_unknown_order() {
        let (sync, store) = sync_with(vec![fixtures::order("o1", "ord_1", PaymentStatus::Pending)]);
        let before = store.get("o1").await.unwrap().unwrap();

        let err = sync
            .apply_payment_captured(&captured("pay_9", "ord_missing"))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::OrderNotFound(ref r) if r == "ord_missing"));
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("o1").await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_capture_does_not_resurrect_refunded_order() {
        let (sync, store) = sync_with(vec![fixtures::order("o1", "ord_1", PaymentStatus::Refunded)]);

        let err = sync
            .apply_payment_captured(&captured("pay_1", "ord_1"))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::InvalidTransition { .. }));
        let order = store.get("o1").await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert_eq!(order.version, 0);
    }

    #[tokio::test]
    async fn test_capture_after_shipping_is_noop() {
        let mut order = fixtures::order("o1", "ord_1", PaymentStatus::Shipped);
        order.gateway_payment_id = Some("pay_1".to_string());
        let (sync, store) = sync_with(vec![order]);

        assert_eq!(
            sync.apply_payment_captured(&captured("pay_1", "ord_1")).await.unwrap(),
            SyncOutcome::AlreadyApplied
        );
        assert_eq!(
            store.get("o1").await.unwrap().unwrap().payment_status,
            PaymentStatus::Shipped
        );
    }

    #[tokio::test]
    async fn test_payment_failed_cancels_pending_only() {
        let (sync, store) = sync_with(vec![
            fixtures::order("o1", "ord_1", PaymentStatus::Pending),
            fixtures::order("o2", "ord_2", PaymentStatus::Paid),
        ]);

        let failed = |order_id: &str| PaymentFailed {
            event_id: None,
            payment: captured("pay_x", order_id).payment,
        };

        assert_eq!(
            sync.apply_payment_failed(&failed("ord_1")).await.unwrap(),
            SyncOutcome::Applied
        );
        assert_eq!(
            sync.apply_payment_failed(&failed("ord_2")).await.unwrap(),
            SyncOutcome::AlreadyApplied
        );

        assert_eq!(
            store.get("o1").await.unwrap().unwrap().payment_status,
            PaymentStatus::Cancelled
        );
        assert_eq!(
            store.get("o2").await.unwrap().unwrap().payment_status,
            PaymentStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_dispatch_routes_and_ignores() {
        let (sync, store) = sync_with(vec![fixtures::order("o1", "ord_1", PaymentStatus::Paid)]);

        let refund = WebhookEvent::from_bytes(
            br#"{"event":"refund.processed","payload":{"refund":{"id":"rfnd_1"},"payment":{"id":"pay_1","order_id":"ord_1"}}}"#,
        )
        .unwrap();
        assert_eq!(sync.dispatch(&refund).await.unwrap(), SyncOutcome::Applied);
        assert_eq!(
            store.get("o1").await.unwrap().unwrap().payment_status,
            PaymentStatus::Refunded
        );

        let unknown =
            WebhookEvent::from_bytes(br#"{"event":"order.paid","payload":{}}"#).unwrap();
        assert_eq!(sync.dispatch(&unknown).await.unwrap(), SyncOutcome::Ignored);

        let broken =
            WebhookEvent::from_bytes(br#"{"event":"payment.captured","payload":{}}"#).unwrap();
        assert!(matches!(sync.dispatch(&broken).await, Err(Error::Webhook(_))));
    }

    #[tokio::test]
    async fn test_fulfil_paid_order() {
        let (sync, store) = sync_with(vec![fixtures::order("o1", "ord_1", PaymentStatus::Paid)]);
        let carrier = FakeCarrier::new();

        let shipment = sync.fulfil_order("o1", &carrier, "Primary").await.unwrap();
        assert_eq!(shipment.shipment_id, 901);

        // Second call returns the stored booking without a new one
        let again = sync.fulfil_order("o1", &carrier, "Primary").await.unwrap();
        assert_eq!(again, shipment);
        assert_eq!(carrier.bookings.load(Ordering::SeqCst), 1);

        let order = store.get("o1").await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Shipped);
        assert_eq!(order.shipment, Some(shipment));
    }

    /// Carrier that takes a while to answer each booking
    struct SlowCarrier {
        inner: FakeCarrier,
        delay: std::time::Duration,
    }

    #[async_trait::async_trait]
    impl Carrier for SlowCarrier {
        async fn create_shipment(
            &self,
            payload: &ShippingOrderPayload,
        ) -> Result<ShipmentRef, ShippingError> {
            tokio::time::sleep(self.delay).await;
            self.inner.create_shipment(payload).await
        }

        async fn track_shipment(&self, awb_code: &str) -> Result<TrackingStatus, ShippingError> {
            self.inner.track_shipment(awb_code).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_fulfilment_books_once() {
        let (sync, store) = sync_with(vec![fixtures::order("o1", "ord_1", PaymentStatus::Paid)]);
        let carrier = SlowCarrier {
            inner: FakeCarrier::new(),
            delay: std::time::Duration::from_millis(250),
        };
        let other = sync.clone();

        let (a, b) = tokio::join!(
            sync.fulfil_order("o1", &carrier, "Primary"),
            other.fulfil_order("o1", &carrier, "Primary"),
        );

        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(carrier.inner.bookings.load(Ordering::SeqCst), 1);

        let order = store.get("o1").await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Shipped);
        assert_eq!(order.history.len(), 1);
        assert!(sync.fulfilment_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_fulfil_requires_paid() {
        let (sync, _store) = sync_with(vec![fixtures::order("o1", "ord_1", PaymentStatus::Pending)]);
        let carrier = FakeCarrier::new();

        let err = sync.fulfil_order("o1", &carrier, "Primary").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::InvalidTransition { from: PaymentStatus::Pending, to: PaymentStatus::Shipped, .. }
        ));
        assert_eq!(carrier.bookings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fulfil_surfaces_carrier_error() {
        let (sync, store) = sync_with(vec![fixtures::order("o1", "ord_1", PaymentStatus::Paid)]);
        let carrier = FakeCarrier {
            reject: true,
            ..FakeCarrier::new()
        };

        let err = sync.fulfil_order("o1", &carrier, "Primary").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Shipping(ShippingError::Provider { status: 422, ref body }) if body.contains("560001")
        ));
        assert_eq!(
            store.get("o1").await.unwrap().unwrap().payment_status,
            PaymentStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_refresh_tracking_marks_delivered() {
        let (sync, store) = sync_with(vec![fixtures::order("o1", "ord_1", PaymentStatus::Paid)]);
        let carrier = FakeCarrier {
            delivered: true,
            ..FakeCarrier::new()
        };

        sync.fulfil_order("o1", &carrier, "Primary").await.unwrap();
        let tracking = sync.refresh_tracking("o1", &carrier).await.unwrap();

        assert!(tracking.is_delivered());
        assert_eq!(
            store.get("o1").await.unwrap().unwrap().payment_status,
            PaymentStatus::Delivered
        );
    }

    #[tokio::test]
    async fn test_refresh_tracking_without_shipment() {
        let (sync, _store) = sync_with(vec![fixtures::order("o1", "ord_1", PaymentStatus::Paid)]);
        let err = sync
            .refresh_tracking("o1", &FakeCarrier::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingShipment(_)));
    }

    /// Store whose writes always fail
    struct ReadOnlyStore(InMemoryOrderStore);

    #[async_trait::async_trait]
    impl OrderStore for ReadOnlyStore {
        async fn get(&self, id: &str) -> Result<Option<Order>, PersistenceError> {
            self.0.get(id).await
        }
        async fn find_by_gateway_order_id(
            &self,
            gateway_order_id: &str,
        ) -> Result<Option<Order>, PersistenceError> {
            self.0.find_by_gateway_order_id(gateway_order_id).await
        }
        async fn insert(&self, _order: Order) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("read-only replica".to_string()))
        }
        async fn update(&self, _order: Order) -> Result<Order, PersistenceError> {
            Err(PersistenceError::Unavailable("read-only replica".to_string()))
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_surfaces() {
        let inner =
            InMemoryOrderStore::with_orders([fixtures::order("o1", "ord_1", PaymentStatus::Pending)]);
        let sync = OrderSync::new(Arc::new(ReadOnlyStore(inner.clone())));

        let err = sync
            .apply_payment_captured(&captured("pay_1", "ord_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Persistence(PersistenceError::Unavailable(_))));
        assert_eq!(
            inner.get("o1").await.unwrap().unwrap().payment_status,
            PaymentStatus::Pending
        );
    }
}
