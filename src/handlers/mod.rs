//! HTTP handlers
//!
//! - `webhook` - inbound payment gateway deliveries
//! - `shipments` - fulfilment and tracking, behind admin bearer auth
//! - `status` - health, readiness, status and metrics endpoints

pub mod auth;
pub mod shipments;
pub mod status;
pub mod webhook;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{Error, SyncError};
use crate::orders::OrderSync;
use crate::shipping::Carrier;
use crate::webhook::SignatureVerifier;

pub use auth::AdminAuth;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub sync: OrderSync,
    pub verifier: SignatureVerifier,
    pub carrier: Arc<dyn Carrier>,
    pub pickup_location: String,
    /// Present when the fulfilment routes are enabled
    pub admin: Option<AdminAuth>,
}

/// Error body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl Error {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Webhook(_) => StatusCode::BAD_REQUEST,
            Error::Sync(e) => match e {
                SyncError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                SyncError::InvalidTransition { .. } | SyncError::MissingShipment(_) => {
                    StatusCode::CONFLICT
                }
                SyncError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
                SyncError::Shipping(_) => StatusCode::BAD_GATEWAY,
            },
            Error::Shipping(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {}", self);
        } else {
            tracing::info!(status = status.as_u16(), "Request rejected: {}", self);
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
