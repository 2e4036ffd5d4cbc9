//! API server library.
//!
//! An Axum HTTP API whose responses under the API prefix are rewritten into
//! a uniform envelope, with every call recorded to an audit log.
//!
//! # Architecture
//!
//! Handler -> Service -> Repository, wrapped by the envelope middleware:
//!
//! ```text
//! middleware/envelope.rs -> routes/mod.rs -> handlers/*.rs -> services/*.rs
//!          |
//!          +-> audit/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `audit` - Audit records and the sink seam
//! - `auth` - Bearer token validation
//! - `config` - Service configuration from environment
//! - `envelope` - Envelope wire format and outcome normalization
//! - `errors` - Error types and the fault tag
//! - `handlers` - HTTP request handlers
//! - `middleware` - Envelope and authentication layers
//! - `models` - Data models
//! - `observability` - Metrics
//! - `repositories` - Database access
//! - `routes` - Axum router setup
//! - `services` - Email delivery

pub mod audit;
pub mod auth;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
