//! Error types for authentication.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during token or password operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token's expiry has passed.
    #[error("token expired")]
    TokenExpired,

    /// The token failed signature or claims validation.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Password hashing or verification failed.
    #[error("password hashing error: {0}")]
    Hash(String),
}
