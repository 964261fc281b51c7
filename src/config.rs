//! Runtime configuration.
//!
//! Everything is read from `STOREFRONT_*` environment variables at startup.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_WEBHOOK_SECRET` (required): shared HMAC secret for gateway webhooks
//! - `STOREFRONT_CARRIER_BASE_URL` (required): carrier API root, e.g. `https://carrier.example/v1/external`
//! - `STOREFRONT_CARRIER_EMAIL` (required): carrier API user
//! - `STOREFRONT_CARRIER_PASSWORD` (required): carrier API password
//! - `STOREFRONT_CARRIER_TOKEN_TTL_SECS` (optional): token lifetime, default 9 days
//! - `STOREFRONT_CARRIER_REFRESH_MARGIN_SECS` (optional): refresh this early, default 300
//! - `STOREFRONT_CARRIER_TIMEOUT_SECS` (optional): per-request timeout, default 10
//! - `STOREFRONT_PICKUP_LOCATION` (optional): carrier pickup location name, default `Primary`
//! - `STOREFRONT_ADMIN_TOKEN` (optional): enables the fulfilment routes behind bearer auth

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};
use url::Url;

use crate::error::ConfigError;

/// Carrier tokens are issued for ten days; refresh a day early
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(9 * 24 * 60 * 60);

/// Default refresh margin before token expiry
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Default pickup location name registered with the carrier
pub const DEFAULT_PICKUP_LOCATION: &str = "Primary";

/// Complete service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub webhook: WebhookConfig,
    pub carrier: CarrierConfig,
    /// Bearer token guarding the fulfilment routes; unset disables them
    pub admin_token: Option<SecretString>,
}

/// Inbound webhook settings
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub secret: SecretString,
}

/// Carrier API settings
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    pub base_url: Url,
    pub email: String,
    pub password: SecretString,
    pub token_validity: Duration,
    pub refresh_margin: Duration,
    pub request_timeout: Duration,
    pub pickup_location: String,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let webhook = WebhookConfig {
            secret: env.secret("STOREFRONT_WEBHOOK_SECRET")?,
        };

        let base_url = parse_base_url(&env.required("STOREFRONT_CARRIER_BASE_URL")?)?;
        let token_validity = env.seconds("STOREFRONT_CARRIER_TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL)?;
        let refresh_margin =
            env.seconds("STOREFRONT_CARRIER_REFRESH_MARGIN_SECS", DEFAULT_REFRESH_MARGIN)?;
        let request_timeout = env.seconds(
            "STOREFRONT_CARRIER_TIMEOUT_SECS",
            crate::shipping::DEFAULT_REQUEST_TIMEOUT,
        )?;

        if token_validity.is_zero() {
            return Err(ConfigError::Invalid {
                var: "STOREFRONT_CARRIER_TOKEN_TTL_SECS",
                reason: "must be greater than 0".to_string(),
            });
        }
        if refresh_margin >= token_validity {
            return Err(ConfigError::Invalid {
                var: "STOREFRONT_CARRIER_REFRESH_MARGIN_SECS",
                reason: format!(
                    "must be shorter than the token lifetime ({}s)",
                    token_validity.as_secs()
                ),
            });
        }
        if request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "STOREFRONT_CARRIER_TIMEOUT_SECS",
                reason: "must be greater than 0".to_string(),
            });
        }

        let carrier = CarrierConfig {
            base_url,
            email: env.required("STOREFRONT_CARRIER_EMAIL")?,
            password: env.secret("STOREFRONT_CARRIER_PASSWORD")?,
            token_validity,
            refresh_margin,
            request_timeout,
            pickup_location: env
                .optional("STOREFRONT_PICKUP_LOCATION")
                .unwrap_or_else(|| DEFAULT_PICKUP_LOCATION.to_string()),
        };

        let admin_token = match env.optional("STOREFRONT_ADMIN_TOKEN") {
            Some(token) => {
                if token.len() < 32 {
                    warn!("STOREFRONT_ADMIN_TOKEN is shorter than 32 characters");
                }
                Some(SecretString::from(token))
            }
            None => {
                info!("STOREFRONT_ADMIN_TOKEN not set, fulfilment routes disabled");
                None
            }
        };

        Ok(Self {
            webhook,
            carrier,
            admin_token,
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn secret(&self, key: &'static str) -> Result<SecretString, ConfigError> {
        let value = SecretString::from(self.required(key)?);
        if value.expose_secret().len() < 16 {
            warn!(var = key, "Secret is shorter than 16 characters");
        }
        Ok(value)
    }

    fn seconds(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::Invalid {
                    var: key,
                    reason: e.to_string(),
                }),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: "STOREFRONT_CARRIER_BASE_URL",
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL".to_string()));
    }
    Ok(url)
}
