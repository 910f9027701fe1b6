//! Password hashing with bcrypt.

use crate::error::{AuthError, Result};

/// Hash a plaintext password for storage.
///
/// # Errors
///
/// Returns an error if bcrypt fails internally.
pub fn hash_password(plain: &str) -> Result<String> {
    bcrypt::hash(plain, bcrypt::DEFAULT_COST).map_err(|e| AuthError::Hash(e.to_string()))
}

/// Verify a plaintext password against a stored hash.
///
/// # Errors
///
/// Returns an error if the stored hash is malformed.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(plain, hash).map_err(|e| AuthError::Hash(e.to_string()))
}
