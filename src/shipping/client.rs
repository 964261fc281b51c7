//! Carrier REST client.
//!
//! Every call takes a bearer token from the shared [`TokenCache`]. Non-2xx
//! answers come back as [`ShippingError::Provider`] with the body untouched;
//! nothing is retried here.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::ShippingError;
use crate::metrics::global_metrics;
use crate::orders::ShipmentRef;
use crate::shipping::token::TokenCache;
use crate::shipping::types::{
    CreateOrderResponse, ShippingOrderPayload, TrackingResponse, TrackingStatus,
};

/// Shipment booking and tracking operations
#[async_trait::async_trait]
pub trait Carrier: Send + Sync + 'static {
    /// Book a shipment for `payload`
    async fn create_shipment(
        &self,
        payload: &ShippingOrderPayload,
    ) -> Result<ShipmentRef, ShippingError>;

    /// Look up the tracking status of `awb_code`
    async fn track_shipment(&self, awb_code: &str) -> Result<TrackingStatus, ShippingError>;
}

/// Carrier client backed by `reqwest`
pub struct ShippingClient {
    http: Client,
    base_url: Url,
    tokens: Arc<TokenCache>,
}

impl ShippingClient {
    /// Create a client sharing an existing HTTP client
    pub fn with_http(http: Client, base_url: Url, tokens: Arc<TokenCache>) -> Self {
        Self {
            http,
            base_url,
            tokens,
        }
    }

    /// The token cache this client authenticates with
    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ShippingError> {
        let token = self.tokens.get_token().await?;
        global_metrics().record_carrier_request();

        let response = request.bearer_auth(&token).send().await.map_err(|e| {
            global_metrics().record_carrier_failure();
            ShippingError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            global_metrics().record_carrier_failure();
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED {
                self.tokens.invalidate(&token);
            }
            warn!(status = status.as_u16(), "Carrier rejected request");
            return Err(ShippingError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ShippingError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ShippingError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Carrier for ShippingClient {
    #[instrument(skip_all, fields(order_id = %payload.order_id))]
    async fn create_shipment(
        &self,
        payload: &ShippingOrderPayload,
    ) -> Result<ShipmentRef, ShippingError> {
        let url = super::endpoint(&self.base_url, &["orders", "create", "adhoc"])?;
        let response: CreateOrderResponse = self.send(self.http.post(url).json(payload)).await?;

        info!(
            carrier_order_id = response.order_id,
            shipment_id = response.shipment_id,
            carrier_status = response.status.as_deref().unwrap_or("unknown"),
            "Shipment booked"
        );
        Ok(response.into())
    }

    #[instrument(skip(self))]
    async fn track_shipment(&self, awb_code: &str) -> Result<TrackingStatus, ShippingError> {
        let url = super::endpoint(&self.base_url, &["courier", "track", "awb", awb_code])?;
        let response: TrackingResponse = self.send(self.http.get(url)).await?;

        if let Some(error) = response.tracking_data.error.clone() {
            return Err(ShippingError::InvalidResponse(error));
        }

        debug!(
            track_status = ?response.tracking_data.track_status,
            shipment_status = ?response.tracking_data.shipment_status,
            "Tracking fetched"
        );
        Ok(TrackingStatus::from_data(awb_code, response.tracking_data))
    }
}
