//! Error types for storefront-sync
//!
//! One `thiserror` enum per concern, aggregated into [`Error`] for callers
//! that do not care which layer failed.

use thiserror::Error;

use crate::orders::PaymentStatus;

/// The main error type for storefront-sync operations
#[derive(Error, Debug)]
pub enum Error {
    /// Carrier API errors
    #[error("Shipping error: {0}")]
    Shipping(#[from] ShippingError),

    /// Inbound webhook errors
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Order state machine errors
    #[error("Order sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    /// An environment variable is set but unusable
    #[error("Invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Carrier (shipping aggregator) errors
#[derive(Error, Debug)]
pub enum ShippingError {
    /// The credential exchange with the carrier failed
    #[error("Carrier authentication failed: {0}")]
    UpstreamAuth(String),

    /// The carrier answered with a non-2xx status; body is kept verbatim
    #[error("Carrier returned HTTP {status}: {body}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("Carrier request failed: {0}")]
    Transport(String),

    /// A 2xx response whose body could not be understood
    #[error("Unexpected carrier response: {0}")]
    InvalidResponse(String),
}

impl ShippingError {
    /// HTTP status reported by the carrier, if any
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Inbound webhook errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WebhookError {
    /// The signature header was absent
    #[error("Missing signature header")]
    MissingSignature,

    /// The signature did not match the body
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// The body was authentic but not a usable event
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// Order store errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Another writer updated the order first
    #[error("Order {order_id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        /// Order id
        order_id: String,
        /// Version the writer read
        expected: u32,
        /// Version currently stored
        found: u32,
    },

    /// The order to update is no longer stored
    #[error("Order {0} disappeared during update")]
    Missing(String),

    /// The backing store could not be reached
    #[error("Order store unavailable: {0}")]
    Unavailable(String),
}

/// Order sync errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// The referenced order does not exist
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The requested status change is not in the transition table
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Order id
        order_id: String,
        /// Current status
        from: PaymentStatus,
        /// Requested status
        to: PaymentStatus,
    },

    /// The shipped order carries no shipment to track
    #[error("Order {0} has no shipment")]
    MissingShipment(String),

    /// Writing the order failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Booking or tracking with the carrier failed
    #[error("Shipping error: {0}")]
    Shipping(#[from] ShippingError),
}

/// Result type alias for storefront-sync operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_keeps_body() {
        let err = ShippingError::Provider {
            status: 422,
            body: r#"{"message":"Invalid pincode"}"#.to_string(),
        };
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("Invalid pincode"));
        assert_eq!(err.provider_status(), Some(422));
    }

    #[test]
    fn test_transition_error_display() {
        let err = SyncError::InvalidTransition {
            order_id: "ord_9".to_string(),
            from: PaymentStatus::Refunded,
            to: PaymentStatus::Paid,
        };
        assert_eq!(err.to_string(), "Order ord_9 cannot move from refunded to paid");
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = WebhookError::InvalidSignature.into();
        assert!(matches!(err, Error::Webhook(WebhookError::InvalidSignature)));

        let err: SyncError = PersistenceError::Unavailable("down".into()).into();
        assert!(err.to_string().contains("down"));
    }

    #[test]
    fn test_config_error() {
        let err = ConfigError::Missing("STOREFRONT_WEBHOOK_SECRET");
        assert_eq!(
            err.to_string(),
            "STOREFRONT_WEBHOOK_SECRET environment variable not set"
        );
    }
}
