//! HTTP error mapping for the agent API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::runtime::RuntimeError;

/// Errors surfaced by the agent's HTTP API.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The start request named no image.
    #[error("Missing image parameter")]
    MissingImage,

    /// The requested image could not be found or pulled.
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// No container by that name exists.
    #[error("Container not found")]
    ContainerNotFound,

    /// The container runtime failed.
    #[error("{0}")]
    Runtime(String),
}

impl AgentError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingImage | Self::ImageNotFound(_) => StatusCode::BAD_REQUEST,
            Self::ContainerNotFound => StatusCode::NOT_FOUND,
            Self::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

impl From<RuntimeError> for AgentError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::ImageNotFound(image) => Self::ImageNotFound(image),
            RuntimeError::ContainerNotFound(_) => Self::ContainerNotFound,
            RuntimeError::Runtime(message) => Self::Runtime(message),
        }
    }
}
