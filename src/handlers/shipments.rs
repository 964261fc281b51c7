//! Fulfilment endpoints
//!
//! - `POST /orders/:id/shipment` books a carrier shipment for a paid order
//! - `GET /orders/:id/tracking` refreshes tracking for a shipped order
//! - `GET /shipments/:awb/tracking` looks up any AWB at the carrier

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::AppState;
use crate::error::Error;
use crate::orders::ShipmentRef;
use crate::shipping::TrackingStatus;

/// Shipment booked for an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentResponse {
    pub success: bool,
    pub order_id: String,
    pub shipment: ShipmentRef,
}

/// Tracking lookup result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingResponse {
    pub success: bool,
    pub tracking: TrackingStatus,
}

#[instrument(skip(state))]
pub async fn create_shipment_handler(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<(StatusCode, Json<ShipmentResponse>), Error> {
    let shipment = state
        .sync
        .fulfil_order(&order_id, state.carrier.as_ref(), &state.pickup_location)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ShipmentResponse {
            success: true,
            order_id,
            shipment,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn order_tracking_handler(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<TrackingResponse>, Error> {
    let tracking = state
        .sync
        .refresh_tracking(&order_id, state.carrier.as_ref())
        .await?;

    Ok(Json(TrackingResponse {
        success: true,
        tracking,
    }))
}

#[instrument(skip(state))]
pub async fn awb_tracking_handler(
    State(state): State<Arc<AppState>>,
    Path(awb): Path<String>,
) -> Result<Json<TrackingResponse>, Error> {
    let tracking = state.carrier.track_shipment(&awb).await?;

    Ok(Json(TrackingResponse {
        success: true,
        tracking,
    }))
}
