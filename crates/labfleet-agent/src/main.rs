//! Labfleet agent - worker-side container lifecycle service.
//!
//! This is the main entry point for the agent process. It connects to the
//! local Docker daemon and serves the container lifecycle API the
//! controller drives.

use std::sync::Arc;

use labfleet_agent::{create_router, AgentConfig, AgentState, DockerRuntime};
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

    tracing::info!("Starting labfleet agent");

    let config = AgentConfig::from_env();
    tracing::info!(
        listen_addr = %config.listen_addr,
        advertised_host = %config.advertised_host,
        "Agent configuration loaded"
    );

    let runtime = Arc::new(DockerRuntime::connect()?);
    tracing::info!("Connected to Docker daemon");

    let listen_addr = config.listen_addr.clone();
    let state = AgentState { runtime, config };
    let app = create_router(state);

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
