//! HS256 token validation.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Only HS256 is accepted; the header `alg` cannot select another algorithm
//! - `exp` and `iat` are validated when present
//! - All failures surface as the same generic message

use super::TokenValidator;
use crate::errors::RelayError;
use common::jwt::{check_token_size, validate_iat, UserClaims};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::collections::HashSet;
use std::time::Duration;
use tracing::instrument;

const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Validates client tokens signed with a shared HMAC secret.
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    clock_skew: Duration,
}

impl JwtValidator {
    /// Create a validator for `secret` with the given `iat` clock skew.
    #[must_use]
    pub fn new(secret: &SecretString, clock_skew: Duration) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.expose_secret().as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        // exp is optional, but checked when the token carries it
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = true;

        Self {
            decoding_key,
            validation,
            clock_skew,
        }
    }

    fn invalid() -> RelayError {
        RelayError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
    }
}

#[async_trait::async_trait]
impl TokenValidator for JwtValidator {
    #[instrument(skip_all)]
    async fn validate(&self, token: &str) -> Result<String, RelayError> {
        check_token_size(token).map_err(|_| Self::invalid())?;

        let token_data =
            decode::<UserClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                tracing::debug!(target: "relay.auth.jwt", error = %e, "Token verification failed");
                Self::invalid()
            })?;
        let claims = token_data.claims;

        if let Some(iat) = claims.iat {
            if let Err(e) = validate_iat(iat, self.clock_skew) {
                tracing::debug!(target: "relay.auth.jwt", error = ?e, "Token iat validation failed");
                return Err(Self::invalid());
            }
        }

        let user_id = claims.identity().map_err(|e| {
            tracing::debug!(target: "relay.auth.jwt", error = ?e, "Token identity rejected");
            Self::invalid()
        })?;

        tracing::debug!(target: "relay.auth.jwt", "Token validated successfully");
        Ok(user_id.to_string())
    }
}
