//! HTTP API gateway for the labfleet booking platform.
//!
//! This crate provides the controller process's public surface:
//!
//! - Bearer-token authentication with typed role gating
//! - REST endpoints for registration, booking submission, and administration
//! - Error mapping to the `{"error": …}` body contract
//!
//! The binary also owns process wiring: it opens the store, builds the
//! control plane, and spawns the reconciler task alongside the HTTP server.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use labfleet_auth::{AuthConfig, TokenAuthority};
//! use labfleet_control::ControlPlaneService;
//! use labfleet_gateway::{create_router, GatewayConfig, GatewayState};
//! use labfleet_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/labfleet")?);
//! let control = Arc::new(ControlPlaneService::new(store));
//! let config = GatewayConfig::default();
//! let tokens = Arc::new(TokenAuthority::new(&AuthConfig {
//!     secret: config.token_secret.clone(),
//!     token_ttl_hours: config.token_ttl_hours,
//! }));
//!
//! let state = GatewayState::new(control, tokens, config);
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::{Admin, AuthUser, Student};
pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
