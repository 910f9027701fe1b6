//! HTTP client for communicating with worker agents.
//!
//! This module provides the [`AgentClient`] trait and its production
//! [`HttpAgentClient`] implementation, used by the reconciler and health
//! monitor for all controller→agent RPC. Every call carries its own
//! timeout ceiling; a timed-out or errored call is retried on the next
//! reconciler tick, never inline.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use labfleet_core::UserId;
use labfleet_store::Agent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ReconcilerConfig;

/// Errors from a single agent RPC.
///
/// The split matters to the reconciler: transient failures leave the
/// booking where it is and the next tick retries; definitive rejections
/// are logged and also retried, but never crash a tick.
#[derive(Debug, Error)]
pub enum AgentCallError {
    /// Timeout, connection failure, or agent-side 5xx. Retry next tick.
    #[error("transient agent error: {0}")]
    Transient(String),

    /// The agent answered with a definitive 4xx (e.g. unknown image).
    #[error("agent rejected request ({status}): {message}")]
    Rejected {
        /// The HTTP status the agent returned.
        status: u16,
        /// The agent's error message, if parseable.
        message: String,
    },
}

/// Request body for starting a container.
#[derive(Debug, Clone, Serialize)]
pub struct StartContainerRequest {
    /// Owner of the booking, recorded as a container label.
    pub user_id: UserId,
    /// Image to run.
    pub image: String,
    /// CPU cores to grant.
    pub cpu: u32,
    /// Memory limit as submitted (e.g. `"4g"`).
    pub memory: String,
    /// Host port to bind (container port is the same number).
    pub port: u16,
}

/// Response from a successful container start.
#[derive(Debug, Clone, Deserialize)]
pub struct StartContainerResponse {
    /// Name the agent gave the container.
    pub container_name: String,
    /// URL the user reaches the session at.
    pub url: String,
    /// Bound port.
    pub port: u16,
}

/// One container in an agent's listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSummary {
    /// Truncated container id.
    pub id: String,
    /// Container name.
    pub name: String,
    /// Runtime status string.
    pub status: String,
    /// Container labels.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Outcome of a stop call. Both are terminal successes for the
/// controller: an unknown container means the work is already done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The agent stopped and removed the container.
    Stopped,
    /// The agent had no container by that name.
    NotFound,
}

/// Trait for agent communication.
///
/// This trait abstracts the agent RPC surface, allowing tests to point the
/// reconciler at a mock HTTP server.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Probe an agent's health endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent is unreachable or unhealthy.
    async fn health(&self, agent: &Agent) -> Result<(), AgentCallError>;

    /// Ask an agent to start a container.
    ///
    /// # Errors
    ///
    /// Returns [`AgentCallError::Rejected`] for definitive 4xx answers and
    /// [`AgentCallError::Transient`] for everything retryable.
    async fn start_container(
        &self,
        agent: &Agent,
        request: &StartContainerRequest,
    ) -> Result<StartContainerResponse, AgentCallError>;

    /// Ask an agent to stop and remove a container.
    ///
    /// A 404 maps to [`StopOutcome::NotFound`], which callers treat as
    /// idempotent success.
    ///
    /// # Errors
    ///
    /// Returns an error for transient failures and non-404 rejections.
    async fn stop_container(
        &self,
        agent: &Agent,
        container_name: &str,
    ) -> Result<StopOutcome, AgentCallError>;

    /// List the managed containers on an agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent is unreachable.
    async fn list_containers(&self, agent: &Agent)
        -> Result<Vec<ContainerSummary>, AgentCallError>;
}

/// Error response format used by agents.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP implementation of [`AgentClient`] using per-call timeouts.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    client: reqwest::Client,
    health_timeout: Duration,
    start_timeout: Duration,
    stop_timeout: Duration,
}

impl HttpAgentClient {
    /// Create a client with the timeouts from the reconciler config.
    ///
    /// # Panics
    ///
    /// Panics if the underlying HTTP client cannot be created.
    #[must_use]
    pub fn new(config: &ReconcilerConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            health_timeout: Duration::from_secs(config.health_timeout_secs),
            start_timeout: Duration::from_secs(config.start_timeout_secs),
            stop_timeout: Duration::from_secs(config.stop_timeout_secs),
        }
    }

    fn transport_error(e: &reqwest::Error) -> AgentCallError {
        AgentCallError::Transient(e.to_string())
    }

    /// Read the agent's error body, falling back to the status line.
    async fn rejection(response: reqwest::Response) -> AgentCallError {
        let status = response.status();
        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("agent returned status {status}"));

        if status.is_client_error() {
            AgentCallError::Rejected {
                status: status.as_u16(),
                message,
            }
        } else {
            AgentCallError::Transient(message)
        }
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn health(&self, agent: &Agent) -> Result<(), AgentCallError> {
        let url = format!("{}/health", agent.base_url());

        let response = self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn start_container(
        &self,
        agent: &Agent,
        request: &StartContainerRequest,
    ) -> Result<StartContainerResponse, AgentCallError> {
        let url = format!("{}/start_container", agent.base_url());

        let response = self
            .client
            .post(&url)
            .json(request)
            .timeout(self.start_timeout)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        if response.status().is_success() {
            response
                .json::<StartContainerResponse>()
                .await
                .map_err(|e| AgentCallError::Transient(format!("failed to parse response: {e}")))
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn stop_container(
        &self,
        agent: &Agent,
        container_name: &str,
    ) -> Result<StopOutcome, AgentCallError> {
        let url = format!("{}/stop_container/{container_name}", agent.base_url());

        let response = self
            .client
            .post(&url)
            .timeout(self.stop_timeout)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        if response.status().is_success() {
            Ok(StopOutcome::Stopped)
        } else if response.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(StopOutcome::NotFound)
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn list_containers(
        &self,
        agent: &Agent,
    ) -> Result<Vec<ContainerSummary>, AgentCallError> {
        let url = format!("{}/containers", agent.base_url());

        let response = self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        if response.status().is_success() {
            response
                .json::<Vec<ContainerSummary>>()
                .await
                .map_err(|e| AgentCallError::Transient(format!("failed to parse response: {e}")))
        } else {
            Err(Self::rejection(response).await)
        }
    }
}
