//! Relay service configuration.
//!
//! Configuration is loaded from environment variables. Sensitive fields are
//! redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default capacity of each session's outbound mailbox.
pub const DEFAULT_SESSION_MAILBOX_CAPACITY: usize = 256;

/// Default capacity of each room actor's mailbox.
pub const DEFAULT_ROOM_MAILBOX_CAPACITY: usize = 64;

/// Default per-frame write deadline in seconds.
pub const DEFAULT_WRITE_TIMEOUT_SECONDS: u64 = 10;

/// Default delay before an empty room actor retires, in seconds.
pub const DEFAULT_ROOM_IDLE_TIMEOUT_SECONDS: u64 = 300;

/// Default number of history entries kept per room.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Room joined when the client does not name one.
pub const DEFAULT_ROOM: &str = "default";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Relay service configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP/WebSocket bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Redis URL for the history store. `None` selects the in-memory store.
    /// Protected by `SecretString` since URLs may embed credentials.
    pub redis_url: Option<SecretString>,

    /// HS256 key used to verify client tokens.
    pub jwt_secret: SecretString,

    /// Clock skew tolerance for token `iat` validation.
    pub jwt_clock_skew: Duration,

    /// Per-session outbound mailbox capacity (default: 256).
    pub session_mailbox_capacity: usize,

    /// Per-room actor mailbox capacity (default: 64).
    pub room_mailbox_capacity: usize,

    /// Deadline for writing one frame to a client socket (default: 10s).
    pub write_timeout: Duration,

    /// How long a room may sit with zero members before it retires (default: 300s).
    pub room_idle_timeout: Duration,

    /// History entries kept per room (default: 100).
    pub history_limit: usize,

    /// Log output format (default: text).
    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field(
                "redis_url",
                &self.redis_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("session_mailbox_capacity", &self.session_mailbox_capacity)
            .field("room_mailbox_capacity", &self.room_mailbox_capacity)
            .field("write_timeout", &self.write_timeout)
            .field("room_idle_timeout", &self.room_idle_timeout)
            .field("history_limit", &self.history_limit)
            .field("log_format", &self.log_format)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_secret = vars
            .get("RELAY_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("RELAY_JWT_SECRET".to_string()))?;
        let jwt_secret = SecretString::from(jwt_secret.clone());

        let redis_url = vars
            .get("REDIS_URL")
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::from(s.clone()));

        let bind_address = vars
            .get("RELAY_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let session_mailbox_capacity = parse_positive(
            vars,
            "RELAY_SESSION_MAILBOX_CAPACITY",
            DEFAULT_SESSION_MAILBOX_CAPACITY,
        )?;

        let room_mailbox_capacity = parse_positive(
            vars,
            "RELAY_ROOM_MAILBOX_CAPACITY",
            DEFAULT_ROOM_MAILBOX_CAPACITY,
        )?;

        let write_timeout_seconds = parse_positive(
            vars,
            "RELAY_WRITE_TIMEOUT_SECONDS",
            DEFAULT_WRITE_TIMEOUT_SECONDS,
        )?;

        let room_idle_timeout_seconds = parse_positive(
            vars,
            "RELAY_ROOM_IDLE_TIMEOUT_SECONDS",
            DEFAULT_ROOM_IDLE_TIMEOUT_SECONDS,
        )?;

        let history_limit = parse_positive(vars, "RELAY_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT)?;

        let jwt_clock_skew = match vars.get("RELAY_JWT_CLOCK_SKEW_SECONDS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|e| {
                    ConfigError::InvalidValue(format!(
                        "RELAY_JWT_CLOCK_SKEW_SECONDS must be an integer: {e}"
                    ))
                })?;
                let skew = Duration::from_secs(secs);
                if skew > MAX_CLOCK_SKEW {
                    return Err(ConfigError::InvalidValue(format!(
                        "RELAY_JWT_CLOCK_SKEW_SECONDS must be at most {}",
                        MAX_CLOCK_SKEW.as_secs()
                    )));
                }
                skew
            }
            None => DEFAULT_CLOCK_SKEW,
        };

        let log_format = match vars.get("RELAY_LOG_FORMAT").map(String::as_str) {
            None | Some("" | "text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue(format!(
                    "RELAY_LOG_FORMAT must be 'text' or 'json', got '{other}'"
                )));
            }
        };

        Ok(Config {
            bind_address,
            redis_url,
            jwt_secret,
            jwt_clock_skew,
            session_mailbox_capacity,
            room_mailbox_capacity,
            write_timeout: Duration::from_secs(write_timeout_seconds),
            room_idle_timeout: Duration::from_secs(room_idle_timeout_seconds),
            history_limit,
            log_format,
        })
    }
}

/// Parse an optional strictly-positive integer, falling back to `default`.
fn parse_positive<T>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: fmt::Display,
{
    let Some(raw) = vars.get(key) else {
        return Ok(default);
    };

    let value: T = raw
        .parse()
        .map_err(|e| ConfigError::InvalidValue(format!("{key} must be an integer: {e}")))?;

    if value == T::default() {
        return Err(ConfigError::InvalidValue(format!(
            "{key} must be greater than zero"
        )));
    }

    Ok(value)
}
