//! Connection token validation.
//!
//! The WebSocket handler resolves an identity before upgrading. The
//! [`TokenValidator`] trait is the seam; [`JwtValidator`] is the production
//! implementation.

mod jwt;

pub use jwt::JwtValidator;

use crate::errors::RelayError;

/// Resolves a bearer token to the identity bound to the connection.
#[async_trait::async_trait]
pub trait TokenValidator: Send + Sync {
    /// Validate `token` and return the user identity it carries.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::InvalidToken` for every validation failure.
    async fn validate(&self, token: &str) -> Result<String, RelayError>;
}
