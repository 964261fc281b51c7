//! Shipping aggregator integration
//!
//! ```text
//! OrderSync::fulfil_order ──▶ ShippingClient ──▶ carrier REST API
//!                                   │
//!                                   ▼
//!                              TokenCache ──▶ auth/login (on expiry)
//! ```

pub mod client;
pub mod token;
pub mod types;

use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::error::ShippingError;

pub use client::{Carrier, ShippingClient};
pub use token::{CachedToken, CarrierLogin, CredentialExchange, TokenCache};
pub use types::{ShippingOrderItem, ShippingOrderPayload, TrackingStatus};

/// Default timeout for every carrier request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client shared by the login exchange and the shipping client
pub fn http_client(timeout: Duration) -> Result<Client, ShippingError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ShippingError::Transport(e.to_string()))
}

/// Append path `segments` to the carrier base URL, percent-encoding each
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ShippingError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ShippingError::Transport(format!("carrier URL {base} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
