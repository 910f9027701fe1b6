//! Labfleet controller - booking API and reconciliation loop.
//!
//! This is the main entry point for the controller process. It owns the
//! authoritative store, serves the user-facing HTTP API, and runs the
//! reconciler plus health monitor as a background task.

use std::sync::Arc;

use labfleet_auth::{AuthConfig, TokenAuthority};
use labfleet_control::{ControlPlaneService, HttpAgentClient, Reconciler};
use labfleet_gateway::{create_router, GatewayConfig, GatewayState};
use labfleet_store::RocksStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,labfleet=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting labfleet controller");

    let config = GatewayConfig::from_env();
    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        tick_interval_secs = config.reconciler.tick_interval_secs,
        "Controller configuration loaded"
    );

    // Open the authoritative store.
    let store = Arc::new(RocksStore::open(&config.data_dir)?);
    tracing::info!(path = %config.data_dir, "Opened RocksDB store");

    // Build the orchestration plane.
    let control = Arc::new(ControlPlaneService::new(Arc::clone(&store)));

    // Spawn the reconciler and health monitor as one background task.
    let agent_client = Arc::new(HttpAgentClient::new(&config.reconciler));
    let reconciler = Reconciler::new(Arc::clone(&store), agent_client, config.reconciler.clone());
    tokio::spawn(reconciler.run());
    tracing::info!("Reconciliation loop spawned");

    // Token authority for the API.
    let tokens = Arc::new(TokenAuthority::new(&AuthConfig {
        secret: config.token_secret.clone(),
        token_ttl_hours: config.token_ttl_hours,
    }));

    let listen_addr = config.listen_addr.clone();
    let state = GatewayState::new(control, tokens, config);
    let app = create_router(state);

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
