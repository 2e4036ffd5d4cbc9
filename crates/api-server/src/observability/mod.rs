//! Observability for the API server.
//!
//! Provides metrics definitions and the Prometheus recorder.

pub mod metrics;
