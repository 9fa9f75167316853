//! Builder patterns for test tokens
//!
//! Provides a fluent API for signing connection tokens with the harness
//! secret.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Secret shared by `TestRelayServer` and `TestTokenBuilder`.
pub const TEST_JWT_SECRET: &str = "relay-test-secret-do-not-use-in-production";

/// Builder for signed test tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .expires_in(3600)
///     .sign();
/// ```
pub struct TestTokenBuilder {
    user_id: Option<String>,
    exp: Option<i64>,
    iat: Option<i64>,
    secret: String,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults (user `test-user`, valid for an hour)
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            user_id: Some("test-user".to_string()),
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            iat: Some(now.timestamp()),
            secret: TEST_JWT_SECRET.to_string(),
        }
    }

    /// Set the identity carried in `user_id`
    pub fn for_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// Leave `user_id` out of the claims
    pub fn without_user(mut self) -> Self {
        self.user_id = None;
        self
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = Some(timestamp);
        self
    }

    /// Sign with a different secret
    pub fn signed_with(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    /// Build the claims as a JSON value
    pub fn build(&self) -> Value {
        let mut claims = Map::new();
        if let Some(user_id) = &self.user_id {
            claims.insert("user_id".to_string(), json!(user_id));
        }
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), json!(exp));
        }
        if let Some(iat) = self.iat {
            claims.insert("iat".to_string(), json!(iat));
        }
        Value::Object(claims)
    }

    /// Sign the claims with HS256
    pub fn sign(self) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &self.build(),
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("HS256 signing of test claims should not fail")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
