//! Carrier API request and response bodies.

use serde::{Deserialize, Serialize};

use crate::orders::{Order, ShipmentRef};

/// Login request body
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Login response body
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
}

/// Ad-hoc order payload expected by the carrier.
///
/// A read-only projection of an [`Order`]; amounts are in major units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingOrderPayload {
    pub order_id: String,
    /// `YYYY-MM-DD HH:MM`
    pub order_date: String,
    pub pickup_location: String,
    pub billing_customer_name: String,
    pub billing_last_name: String,
    pub billing_address: String,
    pub billing_address_2: String,
    pub billing_city: String,
    pub billing_pincode: String,
    pub billing_state: String,
    pub billing_country: String,
    pub billing_email: String,
    pub billing_phone: String,
    pub shipping_is_billing: bool,
    pub order_items: Vec<ShippingOrderItem>,
    pub payment_method: String,
    pub sub_total: f64,
    pub length: f64,
    pub breadth: f64,
    pub height: f64,
    pub weight: f64,
}

/// One line of [`ShippingOrderPayload::order_items`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingOrderItem {
    pub name: String,
    pub sku: String,
    pub units: u32,
    pub selling_price: f64,
}

fn to_major_units(minor: i64) -> f64 {
    minor as f64 / 100.0
}

impl ShippingOrderPayload {
    /// Project `order` for booking from `pickup_location`
    pub fn from_order(order: &Order, pickup_location: &str) -> Self {
        let customer = &order.customer;
        let address = &customer.address;

        Self {
            order_id: order.id.clone(),
            order_date: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
            pickup_location: pickup_location.to_string(),
            billing_customer_name: customer.first_name.clone(),
            billing_last_name: customer.last_name.clone(),
            billing_address: address.line1.clone(),
            billing_address_2: address.line2.clone().unwrap_or_default(),
            billing_city: address.city.clone(),
            billing_pincode: address.pincode.clone(),
            billing_state: address.state.clone(),
            billing_country: address.country.clone(),
            billing_email: customer.email.clone(),
            billing_phone: customer.phone.clone(),
            shipping_is_billing: true,
            order_items: order
                .items
                .iter()
                .map(|item| ShippingOrderItem {
                    name: item.name.clone(),
                    sku: item.sku.clone(),
                    units: item.units,
                    selling_price: to_major_units(item.unit_price),
                })
                .collect(),
            // Orders only reach the carrier after capture
            payment_method: "Prepaid".to_string(),
            sub_total: to_major_units(order.subtotal()),
            length: order.parcel.length_cm,
            breadth: order.parcel.breadth_cm,
            height: order.parcel.height_cm,
            weight: order.parcel.weight_kg,
        }
    }
}

/// Response to an ad-hoc order booking
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreateOrderResponse {
    pub order_id: u64,
    pub shipment_id: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub awb_code: Option<String>,
}

impl From<CreateOrderResponse> for ShipmentRef {
    fn from(response: CreateOrderResponse) -> Self {
        Self {
            carrier_order_id: response.order_id,
            shipment_id: response.shipment_id,
            awb_code: response.awb_code.filter(|awb| !awb.trim().is_empty()),
        }
    }
}

/// Raw tracking response envelope
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TrackingResponse {
    pub tracking_data: TrackingData,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TrackingData {
    #[serde(default)]
    pub track_status: Option<i64>,
    #[serde(default)]
    pub shipment_status: Option<i64>,
    #[serde(default)]
    pub shipment_track: Vec<ShipmentTrack>,
    #[serde(default)]
    pub track_url: Option<String>,
    #[serde(default)]
    pub etd: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ShipmentTrack {
    #[serde(default)]
    pub awb_code: Option<String>,
    #[serde(default)]
    pub current_status: Option<String>,
    #[serde(default)]
    pub courier_name: Option<String>,
}

/// Carrier shipment status code for a delivered parcel
pub const DELIVERED_STATUS_CODE: i64 = 7;

/// Tracking status for one AWB
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStatus {
    pub awb_code: String,
    pub current_status: Option<String>,
    pub shipment_status: Option<i64>,
    pub courier_name: Option<String>,
    pub track_url: Option<String>,
    /// Estimated time of delivery as reported by the carrier
    pub etd: Option<String>,
}

impl TrackingStatus {
    pub(crate) fn from_data(awb_code: &str, data: TrackingData) -> Self {
        let track = data.shipment_track.into_iter().next();
        let (current_status, courier_name, awb) = match track {
            Some(t) => (t.current_status, t.courier_name, t.awb_code),
            None => (None, None, None),
        };

        Self {
            awb_code: awb
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| awb_code.to_string()),
            current_status,
            shipment_status: data.shipment_status,
            courier_name,
            track_url: data.track_url,
            etd: data.etd,
        }
    }

    /// Whether the carrier reports the parcel as delivered
    pub fn is_delivered(&self) -> bool {
        self.shipment_status == Some(DELIVERED_STATUS_CODE)
            || self
                .current_status
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case("delivered"))
    }
}
