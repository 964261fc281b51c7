//! storefront-sync - payment webhooks, order status and carrier shipments
//!
//! Glue between the storefront's orders, its payment gateway and its
//! shipping aggregator.
//!
//! # Features
//!
//! - **Webhook verification**: HMAC-SHA256 over the raw body, constant-time compare
//! - **Order sync**: transition-table state machine, idempotent under redelivery
//! - **Carrier client**: shipment booking and tracking with a shared bearer-token cache
//! - **Operations**: health, readiness, status and Prometheus metrics endpoints
//!
//! # Architecture
//!
//! ```text
//! Payment gateway ──▶ POST /webhook ──▶ SignatureVerifier
//!                                            │
//!                                            ▼
//!                                        OrderSync ──▶ OrderStore
//!                                            │
//!                                            ▼
//!                                     ShippingClient ──▶ carrier API
//!                                            │
//!                                            ▼
//!                                       TokenCache
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use storefront_sync::orders::{InMemoryOrderStore, OrderSync};
//! use storefront_sync::webhook::{SignatureVerifier, WebhookEvent};
//!
//! # async fn run(body: &[u8], signature: &str) -> storefront_sync::Result<()> {
//! let verifier = SignatureVerifier::new("whsec_example".to_string().into());
//! verifier.check(body, Some(signature))?;
//!
//! let sync = OrderSync::new(Arc::new(InMemoryOrderStore::new()));
//! let outcome = sync.dispatch(&WebhookEvent::from_bytes(body)?).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod orders;
pub mod server;
pub mod shipping;
pub mod webhook;

// Re-exports for convenience
pub use config::AppConfig;
pub use error::{Error, Result};
pub use orders::{OrderSync, SyncOutcome};
pub use shipping::{ShippingClient, TokenCache};
pub use webhook::SignatureVerifier;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
