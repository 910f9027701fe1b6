//! Bearer token issuing and validation.
//!
//! Tokens are HS256 JWTs signed with the controller's process-wide secret.
//! The claims mirror what request handlers need for gating: the user id,
//! role, and email.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use labfleet_core::{Role, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::AuthConfig;

/// JWT claims as serialized on the wire.
#[derive(Debug, Serialize, Deserialize)]
struct RawClaims {
    /// User id.
    sub: UserId,
    /// User role; closed set, unknown strings fail deserialization.
    role: Role,
    /// User email.
    email: String,
    /// Issued-at (unix seconds).
    iat: i64,
    /// Expiry (unix seconds).
    exp: i64,
}

/// Validated claims extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthClaims {
    /// The authenticated user's id.
    pub user_id: UserId,
    /// The authenticated user's role.
    pub role: Role,
    /// The authenticated user's email.
    pub email: String,
}

/// Issues and validates bearer tokens with a shared HMAC secret.
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_hours: u32,
}

impl TokenAuthority {
    /// Create a token authority from configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl_hours: config.token_ttl_hours,
        }
    }

    /// Issue a token for the given user.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue(&self, user_id: UserId, role: Role, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = RawClaims {
            sub: user_id,
            role,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(i64::from(self.ttl_hours))).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Validate a token and extract its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenExpired`] for expired tokens and
    /// [`AuthError::InvalidToken`] for anything else that fails validation,
    /// including unknown role strings.
    pub fn verify(&self, token: &str) -> Result<AuthClaims> {
        let validation = Validation::new(Algorithm::HS256);
        let data =
            decode::<RawClaims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        Ok(AuthClaims {
            user_id: data.claims.sub,
            role: data.claims.role,
            email: data.claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority(secret: &str) -> TokenAuthority {
        TokenAuthority::new(&AuthConfig {
            secret: secret.into(),
            token_ttl_hours: 1,
        })
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let authority = authority("secret-a");
        let token = authority
            .issue(UserId::new(7), Role::Admin, "admin@x")
            .unwrap();

        let claims = authority.verify(&token).unwrap();
        assert_eq!(claims.user_id, UserId::new(7));
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.email, "admin@x");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = authority("secret-a")
            .issue(UserId::new(1), Role::Student, "a@x")
            .unwrap();

        let err = authority("secret-b").verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = authority("s").verify("not.a.token").unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        // Hand-roll a token whose exp is in the past.
        let config = AuthConfig {
            secret: "s".into(),
            token_ttl_hours: 1,
        };
        let now = Utc::now();
        let claims = RawClaims {
            sub: UserId::new(1),
            role: Role::Student,
            email: "a@x".into(),
            iat: (now - chrono::Duration::hours(2)).timestamp(),
            exp: (now - chrono::Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        let err = TokenAuthority::new(&config).verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }
}
