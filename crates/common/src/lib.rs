//! Common utilities shared across the API envelope workspace.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT pre-validation utilities (size limits, iat checks)
pub mod jwt;

/// Module for tracing subscriber initialisation
pub mod logging;
