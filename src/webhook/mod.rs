//! Payment gateway webhooks
//!
//! ```text
//! Request -> Signature Verify -> Parse Event -> Order Sync -> 200
//!                  |                 |              |
//!                  v                 v              v
//!                 400               400      404 / 409 / 500
//! ```
//!
//! Signatures are checked over the raw body before any parsing. Events are
//! processed inline; redelivery after a non-2xx answer is the gateway's job.

pub mod events;
pub mod signature;

pub use events::{
    Payment, PaymentCaptured, PaymentFailed, Refund, RefundProcessed, WebhookEvent,
    WebhookEventType,
};
pub use signature::{sign, verify, SignatureVerifier, SIGNATURE_HEADER};
