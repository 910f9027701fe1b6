//! Token issuing and password hashing for labfleet.
//!
//! This crate provides:
//!
//! - HS256 JWT issuing and validation via a process-wide signing secret
//! - Bcrypt password hashing for stored credentials
//!
//! Tokens carry the claims `{sub, role, email, iat, exp}`. Roles are a
//! closed set; a token whose role string is unknown fails validation rather
//! than defaulting to anything.
//!
//! # Example
//!
//! ```
//! use labfleet_auth::{AuthConfig, TokenAuthority};
//! use labfleet_core::{Role, UserId};
//!
//! let authority = TokenAuthority::new(&AuthConfig {
//!     secret: "test-secret".into(),
//!     token_ttl_hours: 12,
//! });
//!
//! let token = authority
//!     .issue(UserId::new(1), Role::Student, "alice@x")
//!     .unwrap();
//! let claims = authority.verify(&token).unwrap();
//! assert_eq!(claims.user_id, UserId::new(1));
//! assert_eq!(claims.role, Role::Student);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod password;
pub mod token;

pub use error::{AuthError, Result};
pub use password::{hash_password, verify_password};
pub use token::{AuthClaims, TokenAuthority};

/// Configuration for token issuing.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC signing secret for bearer tokens.
    pub secret: String,
    /// Token lifetime in hours.
    pub token_ttl_hours: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_ttl_hours: 12,
        }
    }
}
