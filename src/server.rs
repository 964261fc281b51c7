//! Router assembly and serving.
//!
//! ```text
//! POST /webhook ─────────────────────────▶ webhook_handler ──▶ OrderSync
//! POST /orders/:id/shipment ──▶ require_admin ──▶ fulfil_order ──▶ Carrier
//! GET  /orders/:id/tracking ──▶ require_admin ──▶ refresh_tracking
//! GET  /shipments/:awb/tracking ─▶ require_admin ──▶ Carrier
//! GET  /health /ready /status /metrics
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers::{auth, shipments, status, webhook, AppState};

/// Build the application router.
///
/// Fulfilment routes are only mounted when `state.admin` is set.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/webhook", post(webhook::webhook_handler))
        .route("/health", get(status::health_handler))
        .route("/ready", get(status::readiness_handler))
        .route("/status", get(status::status_handler))
        .route("/metrics", get(status::metrics_handler));

    if state.admin.is_some() {
        let admin = Router::new()
            .route("/orders/:id/shipment", post(shipments::create_shipment_handler))
            .route("/orders/:id/tracking", get(shipments::order_tracking_handler))
            .route("/shipments/:awb/tracking", get(shipments::awb_tracking_handler))
            .route_layer(from_fn_with_state(state.clone(), auth::require_admin));
        app = app.merge(admin);
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Serve `app` on `addr` until Ctrl+C or SIGTERM
pub async fn serve(addr: SocketAddr, app: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
