//! Carrier bearer-token cache.
//!
//! The carrier issues long-lived tokens from a credential login. One
//! [`TokenCache`] is built at startup and shared by every request; it hands
//! out the cached token until it nears expiry and then refreshes it.
//!
//! Refreshes are single-flight: the first caller to find the token stale
//! takes the refresh lock and logs in, later callers wait on the lock and
//! pick up the fresh token instead of logging in again.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ShippingError;
use crate::metrics::global_metrics;
use crate::shipping::types::{LoginRequest, LoginResponse};

/// A token and the instant after which it must not be used
#[derive(Clone)]
pub struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    /// Create a cached token
    pub fn new(value: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Check if the token is still usable `margin` from `now`
    pub fn is_fresh(&self, now: Instant, margin: Duration) -> bool {
        now.checked_add(margin)
            .is_some_and(|deadline| deadline < self.expires_at)
    }

    /// Expiry instant
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Exchanges service credentials for a carrier token
#[async_trait::async_trait]
pub trait CredentialExchange: Send + Sync + 'static {
    /// Log in and return a fresh bearer token
    async fn login(&self) -> Result<String, ShippingError>;
}

/// Credential exchange against the carrier's `auth/login` endpoint
pub struct CarrierLogin {
    http: Client,
    login_url: Url,
    email: String,
    password: SecretString,
}

impl CarrierLogin {
    /// Create a login exchange for `base_url`
    pub fn new(
        http: Client,
        base_url: &Url,
        email: String,
        password: SecretString,
    ) -> Result<Self, ShippingError> {
        let login_url = super::endpoint(base_url, &["auth", "login"])?;
        Ok(Self {
            http,
            login_url,
            email,
            password,
        })
    }
}

#[async_trait::async_trait]
impl CredentialExchange for CarrierLogin {
    async fn login(&self) -> Result<String, ShippingError> {
        let body = LoginRequest {
            email: &self.email,
            password: self.password.expose_secret(),
        };

        let response = self
            .http
            .post(self.login_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ShippingError::UpstreamAuth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ShippingError::UpstreamAuth(format!(
                "login returned HTTP {}: {}",
                status.as_u16(),
                text
            )));
        }

        let parsed: LoginResponse = response
            .json()
            .await
            .map_err(|e| ShippingError::UpstreamAuth(format!("unreadable login response: {e}")))?;

        match parsed.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ShippingError::UpstreamAuth(
                "login response carried no token".to_string(),
            )),
        }
    }
}

/// Process-wide carrier token cache
pub struct TokenCache {
    exchange: Arc<dyn CredentialExchange>,
    validity: Duration,
    refresh_margin: Duration,
    current: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
}

impl TokenCache {
    /// Create an empty cache.
    ///
    /// Tokens are kept for `validity` after login and refreshed once fewer
    /// than `refresh_margin` remain.
    pub fn new(
        exchange: Arc<dyn CredentialExchange>,
        validity: Duration,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            exchange,
            validity,
            refresh_margin,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Return the cached token, logging in first if it is missing or stale
    pub async fn get_token(&self) -> Result<String, ShippingError> {
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(token) = self.fresh_token() {
            debug!("Carrier token refreshed by concurrent caller");
            return Ok(token);
        }

        debug!("Carrier token missing or stale, logging in");
        let value = match self.exchange.login().await {
            Ok(value) => value,
            Err(e) => {
                global_metrics().record_token_refresh_failure();
                warn!(error = %e, "Carrier login failed");
                return Err(match e {
                    ShippingError::UpstreamAuth(_) => e,
                    other => ShippingError::UpstreamAuth(other.to_string()),
                });
            }
        };

        let expires_at = Instant::now() + self.validity;
        *self.current.write() = Some(CachedToken::new(value.clone(), expires_at));
        global_metrics().record_token_refresh();
        info!(
            valid_for_secs = self.validity.as_secs(),
            "Carrier token refreshed"
        );

        Ok(value)
    }

    /// Drop the cached token if it is still `rejected`, so the next call
    /// logs in again.
    ///
    /// A token refreshed after `rejected` was handed out is kept.
    pub fn invalidate(&self, rejected: &str) {
        let mut current = self.current.write();
        if current.as_ref().is_some_and(|token| token.value == rejected) {
            *current = None;
            info!("Carrier token invalidated");
        } else {
            debug!("Rejected carrier token already replaced");
        }
    }

    /// Expiry of the cached token, if one is held
    pub fn expires_at(&self) -> Option<Instant> {
        self.current.read().as_ref().map(CachedToken::expires_at)
    }

    fn fresh_token(&self) -> Option<String> {
        let now = Instant::now();
        self.current
            .read()
            .as_ref()
            .filter(|token| token.is_fresh(now, self.refresh_margin))
            .map(|token| token.value.clone())
    }
}
