//! Order records and the payment status state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncError;

/// Lifecycle status of an order.
///
/// Forward path is `pending -> paid -> shipped -> delivered`; `refunded`
/// and `cancelled` are terminal exits from `pending` or `paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    /// Statuses reachable in one step from this one
    pub fn allowed_transitions(&self) -> &'static [PaymentStatus] {
        use PaymentStatus::*;
        match self {
            Pending => &[Paid, Refunded, Cancelled],
            Paid => &[Shipped, Refunded, Cancelled],
            Shipped => &[Delivered],
            Delivered | Refunded | Cancelled => &[],
        }
    }

    /// Check if `next` is in the transition table for this status
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Check if no further transitions exist
    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    fn forward_rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Paid => Some(1),
            Self::Shipped => Some(2),
            Self::Delivered => Some(3),
            Self::Refunded | Self::Cancelled => None,
        }
    }

    /// Whether an order in this status has already passed through `target`.
    ///
    /// A shipped order has reached `paid`; a refunded order has reached
    /// `refunded` but not `paid`.
    pub fn has_reached(&self, target: PaymentStatus) -> bool {
        if *self == target {
            return true;
        }
        match (self.forward_rank(), target.forward_rank()) {
            (Some(current), Some(wanted)) => current >= wanted,
            _ => false,
        }
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "refunded" => Ok(Self::Refunded),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// Customer contact and delivery address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
}

/// Postal address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "India".to_string()
}

/// A line item on an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub sku: String,
    pub units: u32,
    /// Unit price in minor currency units (paise)
    pub unit_price: i64,
}

/// Packed parcel dimensions (cm) and weight (kg)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub length_cm: f64,
    pub breadth_cm: f64,
    pub height_cm: f64,
    pub weight_kg: f64,
}

impl Default for Parcel {
    fn default() -> Self {
        Self {
            length_cm: 10.0,
            breadth_cm: 10.0,
            height_cm: 10.0,
            weight_kg: 0.5,
        }
    }
}

/// Carrier booking stored once an order ships
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRef {
    pub carrier_order_id: u64,
    pub shipment_id: u64,
    #[serde(default)]
    pub awb_code: Option<String>,
}

/// One audited status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub id: Uuid,
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    /// What caused the change, e.g. `payment.captured`
    pub source: String,
    pub at: DateTime<Utc>,
}

/// A storefront order as persisted by the order store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub payment_status: PaymentStatus,
    /// Order reference issued by the payment gateway
    pub gateway_order_id: String,
    #[serde(default)]
    pub gateway_payment_id: Option<String>,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub parcel: Parcel,
    #[serde(default)]
    pub shipment: Option<ShipmentRef>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub history: Vec<StatusChange>,
}

/// Result of asking an order to move to a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The status changed and an audit entry was appended
    Applied,
    /// The order was already at or past the target; nothing changed
    AlreadyReached,
}

impl Order {
    /// Order subtotal in minor units, saturating at the `i64` bounds
    pub fn subtotal(&self) -> i64 {
        self.items.iter().fold(0i64, |total, item| {
            total.saturating_add(item.unit_price.saturating_mul(i64::from(item.units)))
        })
    }

    /// Move to `to` if the transition table allows it.
    ///
    /// Reaching a status the order already passed through is a no-op, so
    /// replayed events leave the order and its history untouched.
    pub fn transition(
        &mut self,
        to: PaymentStatus,
        source: &str,
        at: DateTime<Utc>,
    ) -> Result<Transition, SyncError> {
        if self.payment_status.has_reached(to) {
            return Ok(Transition::AlreadyReached);
        }

        if !self.payment_status.can_transition_to(to) {
            return Err(SyncError::InvalidTransition {
                order_id: self.id.clone(),
                from: self.payment_status,
                to,
            });
        }

        self.history.push(StatusChange {
            id: Uuid::new_v4(),
            from: self.payment_status,
            to,
            source: source.to_string(),
            at,
        });
        self.payment_status = to;
        self.updated_at = at;
        Ok(Transition::Applied)
    }
}
