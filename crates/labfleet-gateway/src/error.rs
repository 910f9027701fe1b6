//! API error types and responses.
//!
//! Every error body has the shape `{"error": …}` where the value is a
//! string, or a field→messages object for validation failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use labfleet_control::{ControlError, ValidationErrors};

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid authentication token, or failed login.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller's role does not admit this route.
    #[error("{0}")]
    Forbidden(String),

    /// The addressed entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// State machine or uniqueness violation.
    #[error("{0}")]
    Conflict(String),

    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// Field validation failed; the body carries per-field messages.
    #[error("validation failed")]
    Validation(ValidationErrors),

    /// No agent can satisfy the request right now.
    #[error("{0}")]
    Unavailable(String),

    /// Internal server error; detail stays in the logs.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Validation(errors) => json!({ "error": errors }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Validation(errors) => Self::Validation(errors),
            ControlError::InvalidCredentials => Self::Unauthorized("invalid credentials".into()),
            ControlError::Auth(e) => {
                tracing::debug!(error = %e, "Token rejected");
                Self::Unauthorized("unauthorized".into())
            }
            ControlError::AccountDisabled => Self::Forbidden("account disabled".into()),
            e @ (ControlError::BookingNotFound(_)
            | ControlError::AgentNotFound(_)
            | ControlError::UserNotFound(_)) => Self::NotFound(e.to_string()),
            e @ (ControlError::EmailExists
            | ControlError::Overlap
            | ControlError::WrongStatus { .. }) => Self::Conflict(e.to_string()),
            e @ ControlError::AgentNotAvailable(_) => Self::BadRequest(e.to_string()),
            e @ ControlError::NoAvailableAgents => Self::Unavailable(e.to_string()),
            e @ (ControlError::Store(_) | ControlError::Internal(_)) => {
                tracing::error!(error = %e, "Internal error");
                Self::Internal("internal error".into())
            }
        }
    }
}
