//! Gateway application state.
//!
//! This module defines the shared state available to all request handlers.

use std::sync::Arc;

use labfleet_auth::TokenAuthority;
use labfleet_control::ControlPlane;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
pub struct GatewayState<C>
where
    C: ControlPlane,
{
    /// The orchestration plane for booking and agent operations.
    pub control: Arc<C>,
    /// Issues and validates bearer tokens.
    pub tokens: Arc<TokenAuthority>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<C> GatewayState<C>
where
    C: ControlPlane,
{
    /// Create a new gateway state.
    #[must_use]
    pub fn new(control: Arc<C>, tokens: Arc<TokenAuthority>, config: GatewayConfig) -> Self {
        Self {
            control,
            tokens,
            config,
        }
    }
}

impl<C> Clone for GatewayState<C>
where
    C: ControlPlane,
{
    fn clone(&self) -> Self {
        Self {
            control: Arc::clone(&self.control),
            tokens: Arc::clone(&self.tokens),
            config: self.config.clone(),
        }
    }
}
