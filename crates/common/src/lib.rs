//! Common utilities and types shared across the Room Relay crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, clock skew, user claims)
pub mod jwt;
