//! Error types for validator construction.
//!
//! Note that token *validation* never errors; only building a validator
//! from key material can fail.

use thiserror::Error;

/// Result type alias using [`AuthError`].
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors raised while constructing a [`TokenValidator`](crate::TokenValidator).
#[derive(Debug, Error)]
pub enum AuthError {
    /// The configured key material could not be parsed.
    #[error("Invalid key material: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}
