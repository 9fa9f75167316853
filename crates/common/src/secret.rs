//! Secret types for values that must never reach the logs.
//!
//! Re-exports the [`secrecy`] types used across the relay. Wrap the JWT signing
//! key, bearer tokens and connection URLs that may embed credentials
//! (`redis://:password@host`) in these types.
//!
//! `SecretString` implements `Debug` with redaction, so any struct deriving
//! `Debug` around it stays safe to pass to `tracing` macros. Values are zeroized
//! on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct HistoryBackend {
//!     name: String,
//!     url: SecretString,
//! }
//!
//! let backend = HistoryBackend {
//!     name: "redis".to_string(),
//!     url: SecretString::from("redis://:hunter2@localhost:6379"),
//! };
//!
//! assert!(!format!("{backend:?}").contains("hunter2"));
//! assert_eq!(backend.url.expose_secret(), "redis://:hunter2@localhost:6379");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
