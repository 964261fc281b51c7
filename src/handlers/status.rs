//! Status and health check handlers.
//!
//! - `/health` - liveness check
//! - `/ready` - readiness check
//! - `/status` - version, uptime and webhook/carrier counters as JSON
//! - `/metrics` - the same counters in Prometheus text format
//!
//! # Example Response
//!
//! ```json
//! {
//!   "version": "0.1.0",
//!   "name": "storefront-sync",
//!   "status": "running",
//!   "uptime_seconds": 3600,
//!   "fulfilment_enabled": true,
//!   "metrics": {
//!     "webhooks_received": 120,
//!     "webhooks_applied": 112,
//!     "webhooks_duplicate": 6,
//!     "...": 0
//!   },
//!   "timestamp": "2026-01-01T12:00:00Z"
//! }
//! ```

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::AppState;
use crate::metrics::{global_metrics, MetricsSnapshot};

/// Server version from Cargo.toml
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name from Cargo.toml
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

/// Liveness and readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

/// Detailed server status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub name: String,
    /// Always "running" if responding
    pub status: String,
    pub uptime_seconds: u64,
    /// Whether the admin fulfilment routes are mounted
    pub fulfilment_enabled: bool,
    pub metrics: MetricsSnapshot,
    /// RFC 3339 timestamp of when the status was generated
    pub timestamp: String,
}

/// `GET /health`
#[instrument(skip_all)]
pub async fn health_handler() -> impl IntoResponse {
    debug!("Health check requested");
    (StatusCode::OK, Json(HealthResponse::new("healthy")))
}

/// `GET /ready`
///
/// The service holds no connections that need warming; the carrier token is
/// fetched lazily on first use, so ready means the router is up.
#[instrument(skip_all)]
pub async fn readiness_handler() -> impl IntoResponse {
    debug!("Readiness check requested");
    (StatusCode::OK, Json(HealthResponse::new("ready")))
}

/// `GET /status`
#[instrument(skip_all)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Status check requested");

    let metrics = global_metrics().snapshot();
    let response = StatusResponse {
        version: SERVER_VERSION.to_string(),
        name: SERVER_NAME.to_string(),
        status: "running".to_string(),
        uptime_seconds: metrics.uptime_seconds,
        fulfilment_enabled: state.admin.is_some(),
        metrics,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(response))
}

/// `GET /metrics`
#[instrument(skip_all)]
pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        global_metrics().to_prometheus_format(),
    )
}
