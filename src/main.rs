//! storefront-sync server
//!
//! Receives payment gateway webhooks and books carrier shipments.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use storefront_sync::config::AppConfig;
use storefront_sync::handlers::{AdminAuth, AppState};
use storefront_sync::orders::{InMemoryOrderStore, Order, OrderSync};
use storefront_sync::shipping::{self, CarrierLogin, ShippingClient, TokenCache};
use storefront_sync::webhook::SignatureVerifier;

/// storefront-sync server
#[derive(Parser, Debug)]
#[command(name = "sf-sync")]
#[command(version)]
#[command(about = "Payment webhook and shipment sync server for the storefront")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON file of orders to preload into the in-memory store
    #[arg(long)]
    orders: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;

    let http = shipping::http_client(config.carrier.request_timeout)?;
    let login = CarrierLogin::new(
        http.clone(),
        &config.carrier.base_url,
        config.carrier.email.clone(),
        config.carrier.password.clone(),
    )?;
    let tokens = Arc::new(TokenCache::new(
        Arc::new(login),
        config.carrier.token_validity,
        config.carrier.refresh_margin,
    ));
    let carrier = ShippingClient::with_http(http, config.carrier.base_url.clone(), tokens);

    let store = match &args.orders {
        Some(path) => InMemoryOrderStore::with_orders(load_orders(path)?),
        None => InMemoryOrderStore::new(),
    };
    tracing::info!(orders = store.len().await, "Order store ready");

    let state = Arc::new(AppState {
        sync: OrderSync::new(Arc::new(store)),
        verifier: SignatureVerifier::new(config.webhook.secret.clone()),
        carrier: Arc::new(carrier),
        pickup_location: config.carrier.pickup_location.clone(),
        admin: config.admin_token.as_ref().map(AdminAuth::new),
    });

    let addr = SocketAddr::new(args.host, args.port);
    tracing::info!(
        version = storefront_sync::VERSION,
        carrier = %config.carrier.base_url,
        "storefront-sync starting on {}",
        addr
    );

    storefront_sync::server::serve(addr, storefront_sync::server::router(state))
        .await
        .context("server error")?;

    tracing::info!("storefront-sync stopped");
    Ok(())
}

fn load_orders(path: &Path) -> anyhow::Result<Vec<Order>> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
}
