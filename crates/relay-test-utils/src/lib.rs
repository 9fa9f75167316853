//! # Relay Test Utilities
//!
//! Shared test utilities for the room relay service.
//!
//! This crate provides:
//! - Server test harness (`TestRelayServer` for E2E tests)
//! - Token builders (`TestTokenBuilder`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestRelayServer::spawn().await?;
//!     let token = TestTokenBuilder::new().for_user("alice").sign();
//!
//!     let (ws, _) = tokio_tungstenite::connect_async(server.ws_url(&token, "lobby")).await?;
//!     Ok(())
//! }
//! ```

pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use server_harness::*;
pub use token_builders::*;
