//! Error types for the orchestration plane.
//!
//! This module defines all errors that can occur during booking and agent
//! management operations.

use std::collections::BTreeMap;

use labfleet_core::{AgentId, BookingId, UserId};
use labfleet_store::{BookingStatus, StoreError};
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Per-field validation messages, keyed by field name.
pub type ValidationErrors = BTreeMap<&'static str, Vec<String>>;

/// Errors that can occur in orchestration plane operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The requested booking was not found (or is not visible to the caller).
    #[error("booking not found: {0}")]
    BookingNotFound(BookingId),

    /// The requested agent was not found.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// The requested user was not found.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// A user with this email already exists.
    #[error("email already registered")]
    EmailExists,

    /// Login failed: unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Login refused: the account has been disabled.
    #[error("account disabled")]
    AccountDisabled,

    /// The request failed field validation.
    #[error("validation failed")]
    Validation(ValidationErrors),

    /// The new booking overlaps one of the caller's approved or active
    /// bookings.
    #[error("booking overlaps with existing session")]
    Overlap,

    /// The operation is not allowed in the booking's current status.
    #[error("cannot {action} booking in {found:?} status")]
    WrongStatus {
        /// What the caller tried to do.
        action: &'static str,
        /// The status the booking was in.
        found: BookingStatus,
    },

    /// The explicitly selected agent is not online.
    #[error("selected agent not available")]
    AgentNotAvailable(AgentId),

    /// No online agent can satisfy the booking's resource request.
    #[error("no available agents")]
    NoAvailableAgents,

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Authentication layer error.
    #[error("authentication error: {0}")]
    Auth(#[from] labfleet_auth::AuthError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::AgentNotAvailable(_) => 400,
            Self::InvalidCredentials | Self::Auth(_) => 401,
            Self::AccountDisabled => 403,
            Self::BookingNotFound(_) | Self::AgentNotFound(_) | Self::UserNotFound(_) => 404,
            Self::EmailExists | Self::Overlap | Self::WrongStatus { .. } => 409,
            Self::NoAvailableAgents => 503,
            Self::Store(_) | Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        assert_eq!(
            ControlError::BookingNotFound(BookingId::new(1)).http_status_code(),
            404
        );
        assert_eq!(ControlError::EmailExists.http_status_code(), 409);
        assert_eq!(ControlError::Overlap.http_status_code(), 409);
        assert_eq!(
            ControlError::WrongStatus {
                action: "approve",
                found: BookingStatus::Active
            }
            .http_status_code(),
            409
        );
        assert_eq!(ControlError::NoAvailableAgents.http_status_code(), 503);
        assert_eq!(ControlError::InvalidCredentials.http_status_code(), 401);
        assert_eq!(ControlError::AccountDisabled.http_status_code(), 403);
        assert_eq!(
            ControlError::Validation(ValidationErrors::new()).http_status_code(),
            400
        );
    }
}
