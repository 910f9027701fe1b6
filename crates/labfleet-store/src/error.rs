//! Error types for the storage layer.

use crate::types::BookingStatus;
use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("record not found")]
    NotFound,

    /// A user with this email already exists.
    #[error("email already registered")]
    EmailExists,

    /// A guarded transition found the booking in an unexpected status.
    #[error("booking is in {found:?} status")]
    WrongStatus {
        /// The status the booking was actually in.
        found: BookingStatus,
    },

    /// A capacity debit would take an agent's available resources negative.
    #[error("agent has insufficient capacity")]
    InsufficientCapacity,

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}
