//! Metrics definitions for the API server.
//!
//! All metrics follow Prometheus naming conventions:
//! - `api_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `outcome`: success, failure, exception, interrupted
//! - `status_code`: HTTP status codes actually produced
//! - `result`: success, error
//! - `operation`: bounded by code (insert_api_log, ping, ...)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Which normalization path produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeOutcome {
    /// Inner status 200, wrapped or reused.
    Success,
    /// Non-200 status without a fault.
    Failure,
    /// Fault or panic.
    Exception,
    /// Body failed after the response had started; passed through.
    Interrupted,
}

impl EnvelopeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeOutcome::Success => "success",
            EnvelopeOutcome::Failure => "failure",
            EnvelopeOutcome::Exception => "exception",
            EnvelopeOutcome::Interrupted => "interrupted",
        }
    }
}

/// Initialize the Prometheus recorder and return the handle used by the
/// `/metrics` endpoint.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("api_envelope_duration".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set envelope duration buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("api_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Envelope Metrics
// ============================================================================

/// Record one intercepted API exchange.
///
/// Metric: `api_envelope_responses_total`, `api_envelope_duration_seconds`
/// Labels: `outcome`, `status_code`
pub fn record_envelope_response(outcome: EnvelopeOutcome, status_code: u16, duration: Duration) {
    histogram!("api_envelope_duration_seconds",
        "outcome" => outcome.as_str()
    )
    .record(duration.as_secs_f64());

    counter!("api_envelope_responses_total",
        "outcome" => outcome.as_str(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

// ============================================================================
// Audit Metrics
// ============================================================================

/// Record an audit write attempt.
///
/// Metric: `api_audit_writes_total`
/// Labels: `result`
pub fn record_audit_write(success: bool) {
    let result = if success { "success" } else { "error" };

    counter!("api_audit_writes_total",
        "result" => result
    )
    .increment(1);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution.
///
/// Metric: `api_db_query_duration_seconds`, `api_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("api_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("api_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
