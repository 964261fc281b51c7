//! Payment Gateway Event Types
//!
//! Strongly-typed views over the gateway's webhook envelope. Only the fields
//! order sync needs are modelled; everything else stays in `payload`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WebhookError;

/// Gateway event types we handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookEventType {
    /// Payment captured; the order is paid
    PaymentCaptured,
    /// Payment attempt failed
    PaymentFailed,
    /// Refund settled back to the customer
    RefundProcessed,
    /// Catch-all for events we don't explicitly handle
    Unknown,
}

impl From<&str> for WebhookEventType {
    fn from(s: &str) -> Self {
        match s {
            "payment.captured" => Self::PaymentCaptured,
            "payment.failed" => Self::PaymentFailed,
            "refund.processed" => Self::RefundProcessed,
            _ => Self::Unknown,
        }
    }
}

impl FromStr for WebhookEventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl WebhookEventType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentCaptured => "payment.captured",
            Self::PaymentFailed => "payment.failed",
            Self::RefundProcessed => "refund.processed",
            Self::Unknown => "unknown",
        }
    }

    /// Check if this is a known event type
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Generic gateway event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Delivery id, when the gateway sends one
    #[serde(default)]
    pub id: Option<String>,

    /// Event name, e.g. `payment.captured`
    pub event: String,

    /// Unix timestamp of the event
    #[serde(default)]
    pub created_at: Option<i64>,

    /// Event-specific entities
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl WebhookEvent {
    /// Parse from raw JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(bytes).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    /// Get the typed event type
    pub fn event_type(&self) -> WebhookEventType {
        WebhookEventType::from(self.event.as_str())
    }

    /// Extract a captured payment
    pub fn as_payment_captured(&self) -> Result<PaymentCaptured, WebhookError> {
        self.expect_type(WebhookEventType::PaymentCaptured)?;
        Ok(PaymentCaptured {
            event_id: self.id.clone(),
            payment: self.entity("payment")?,
        })
    }

    /// Extract a failed payment
    pub fn as_payment_failed(&self) -> Result<PaymentFailed, WebhookError> {
        self.expect_type(WebhookEventType::PaymentFailed)?;
        Ok(PaymentFailed {
            event_id: self.id.clone(),
            payment: self.entity("payment")?,
        })
    }

    /// Extract a processed refund
    pub fn as_refund_processed(&self) -> Result<RefundProcessed, WebhookError> {
        self.expect_type(WebhookEventType::RefundProcessed)?;
        Ok(RefundProcessed {
            event_id: self.id.clone(),
            refund: self.entity("refund")?,
            payment: self.entity("payment")?,
        })
    }

    fn expect_type(&self, wanted: WebhookEventType) -> Result<(), WebhookError> {
        if self.event_type() == wanted {
            Ok(())
        } else {
            Err(WebhookError::InvalidPayload(format!(
                "Event {} is not a {} event",
                self.event,
                wanted.as_str()
            )))
        }
    }

    fn entity<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T, WebhookError> {
        let value = self
            .payload
            .get(key)
            .ok_or_else(|| WebhookError::InvalidPayload(format!("payload.{key} is missing")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| WebhookError::InvalidPayload(format!("payload.{key}: {e}")))
    }
}

/// Gateway payment entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment id (pay_...)
    pub id: String,
    /// Gateway order reference (order_...)
    pub order_id: String,
    /// Amount in minor units
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Gateway refund entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    /// Refund id (rfnd_...)
    pub id: String,
    #[serde(default)]
    pub amount: Option<i64>,
}

/// `payment.captured` with typed data
#[derive(Debug, Clone)]
pub struct PaymentCaptured {
    pub event_id: Option<String>,
    pub payment: Payment,
}

/// `payment.failed` with typed data
#[derive(Debug, Clone)]
pub struct PaymentFailed {
    pub event_id: Option<String>,
    pub payment: Payment,
}

/// `refund.processed` with typed data
#[derive(Debug, Clone)]
pub struct RefundProcessed {
    pub event_id: Option<String>,
    pub refund: Refund,
    pub payment: Payment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parsing() {
        assert_eq!(
            WebhookEventType::from("payment.captured"),
            WebhookEventType::PaymentCaptured
        );
        assert_eq!(
            "refund.processed".parse::<WebhookEventType>().unwrap(),
            WebhookEventType::RefundProcessed
        );
        assert_eq!(
            WebhookEventType::from("order.paid"),
            WebhookEventType::Unknown
        );
        assert!(!WebhookEventType::Unknown.is_known());
    }

    #[test]
    fn test_parse_payment_captured() {
        let json = br#"{
            "event": "payment.captured",
            "payload": { "payment": { "id": "pay_1", "order_id": "ord_1", "amount": 334750 } }
        }"#;

        let event = WebhookEvent::from_bytes(json).unwrap();
        assert_eq!(event.event_type(), WebhookEventType::PaymentCaptured);

        let captured = event.as_payment_captured().unwrap();
        assert_eq!(captured.payment.id, "pay_1");
        assert_eq!(captured.payment.order_id, "ord_1");
        assert_eq!(captured.payment.amount, Some(334_750));
        assert!(captured.event_id.is_none());
    }

    #[test]
    fn test_parse_refund_processed() {
        let json = br#"{
            "id": "evt_55",
            "event": "refund.processed",
            "payload": {
                "refund": { "id": "rfnd_1", "amount": 1000 },
                "payment": { "id": "pay_1", "order_id": "ord_1" }
            }
        }"#;

        let refund = WebhookEvent::from_bytes(json)
            .unwrap()
            .as_refund_processed()
            .unwrap();
        assert_eq!(refund.event_id.as_deref(), Some("evt_55"));
        assert_eq!(refund.refund.id, "rfnd_1");
        assert_eq!(refund.payment.order_id, "ord_1");
    }

    #[test]
    fn test_missing_entity_is_invalid_payload() {
        let event = WebhookEvent::from_bytes(br#"{"event":"payment.captured","payload":{}}"#)
            .unwrap();
        let err = event.as_payment_captured().unwrap_err();
        assert_eq!(
            err,
            WebhookError::InvalidPayload("payload.payment is missing".to_string())
        );
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let event = WebhookEvent::from_bytes(
            br#"{"event":"payment.failed","payload":{"payment":{"id":"pay_1","order_id":"ord_1"}}}"#,
        )
        .unwrap();
        assert!(event.as_payment_captured().is_err());
        assert!(event.as_payment_failed().is_ok());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            WebhookEvent::from_bytes(b"not json"),
            Err(WebhookError::InvalidPayload(_))
        ));
    }
}
