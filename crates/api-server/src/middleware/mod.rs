//! HTTP middleware layers.
//!
//! # Components
//!
//! - `envelope` - Response envelope and audit interception (outermost layer)
//! - `auth` - Authentication middleware for protected routes

pub mod auth;
pub mod envelope;

pub use auth::{require_auth, AuthState, ClaimsExt};
pub use envelope::{api_envelope, EnvelopeSettings, EnvelopeState};
