//! Payment gateway webhook endpoint.
//!
//! `POST /webhook` takes the raw body so the signature is checked over the
//! exact bytes the gateway signed. Only verified bodies are parsed.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::AppState;
use crate::error::Error;
use crate::metrics::global_metrics;
use crate::orders::SyncOutcome;
use crate::webhook::{WebhookEvent, SIGNATURE_HEADER};

/// Acknowledgement for an accepted delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub outcome: SyncOutcome,
}

/// Verify, parse and apply one gateway delivery
#[instrument(skip_all, fields(event = tracing::field::Empty))]
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, Error> {
    let metrics = global_metrics();
    metrics.record_webhook_received();

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = state.verifier.check(&body, signature) {
        metrics.record_webhook_rejected();
        warn!(error = %e, body_len = body.len(), "Rejected webhook delivery");
        return Err(e.into());
    }

    let event = WebhookEvent::from_bytes(&body).map_err(|e| {
        metrics.record_webhook_rejected();
        Error::from(e)
    })?;
    tracing::Span::current().record("event", event.event.as_str());

    let outcome = match state.sync.dispatch(&event).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if matches!(e, Error::Webhook(_)) {
                metrics.record_webhook_rejected();
            } else {
                metrics.record_webhook_failed();
            }
            return Err(e);
        }
    };

    match outcome {
        SyncOutcome::Applied => metrics.record_webhook_applied(),
        SyncOutcome::AlreadyApplied => metrics.record_webhook_duplicate(),
        SyncOutcome::Ignored => metrics.record_webhook_ignored(),
    }

    info!(event_id = ?event.id, outcome = ?outcome, "Webhook processed");
    Ok(Json(WebhookResponse {
        success: true,
        outcome,
    }))
}
