//! Response envelope and audit middleware.
//!
//! Installed as the outermost layer. For every request under the API prefix
//! (docs excluded) it:
//!
//! 1. Buffers the request body and replays it to the inner pipeline
//! 2. Runs the inner pipeline, catching panics
//! 3. Buffers the response body and rewrites it into an [`Envelope`]
//! 4. Writes an audit record for the exchange
//!
//! Requests outside the API prefix pass through untouched.

use crate::audit::{is_audit_excluded, ApiExchange, ApiLogSink, AuditRecord};
use crate::config::Config;
use crate::envelope::{normalize_not_success, normalize_success, Envelope};
use crate::errors::{install_panic_capture, ApiFault, Fault};
use crate::middleware::auth::ClaimsExt;
use crate::observability::metrics::{self, EnvelopeOutcome};
use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        response::Parts,
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::Response,
};
use bytes::BytesMut;
use chrono::Utc;
use futures::{FutureExt, StreamExt};
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

/// Interception settings derived from [`Config`].
#[derive(Debug, Clone)]
pub struct EnvelopeSettings {
    /// Lowercase, no trailing slash.
    pub api_prefix: String,
    /// Lowercase, no trailing slash.
    pub docs_prefix: String,
    /// Lowercase path prefixes never audited.
    pub audit_excluded_paths: Vec<String>,
    pub enable_api_logging: bool,
    pub expose_fault_details: bool,
    pub max_body_bytes: usize,
}

impl EnvelopeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_prefix: config.api_path_prefix.to_ascii_lowercase(),
            docs_prefix: config.docs_path_prefix.to_ascii_lowercase(),
            audit_excluded_paths: config.audit_excluded_paths.clone(),
            enable_api_logging: config.enable_api_logging,
            expose_fault_details: config.environment.exposes_fault_details(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Whether a request for `path` is enveloped.
    ///
    /// True when the path lies under the API prefix and under neither the
    /// docs prefix nor `{api_prefix}{docs_prefix}`. Matching is by whole
    /// path segments, ignoring case.
    pub fn intercepts(&self, path: &str) -> bool {
        let path = path.to_ascii_lowercase();

        if !has_segment_prefix(&path, &self.api_prefix) {
            return false;
        }

        if self.docs_prefix.is_empty() {
            return true;
        }

        let nested_docs = format!("{}{}", self.api_prefix, self.docs_prefix);
        !(has_segment_prefix(&path, &self.docs_prefix) || has_segment_prefix(&path, &nested_docs))
    }

    pub fn is_audit_excluded(&self, path: &str) -> bool {
        is_audit_excluded(path, &self.audit_excluded_paths)
    }
}

/// `path` equals `prefix` or continues it with a `/`. An empty prefix
/// matches everything.
fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// State for the envelope middleware.
pub struct EnvelopeState {
    pub settings: EnvelopeSettings,
    pub audit_sink: Arc<dyn ApiLogSink>,
}

impl EnvelopeState {
    pub fn new(settings: EnvelopeSettings, audit_sink: Arc<dyn ApiLogSink>) -> Self {
        if settings.expose_fault_details {
            install_panic_capture();
        }
        Self {
            settings,
            audit_sink,
        }
    }
}

/// How the inner pipeline finished.
enum InnerOutcome {
    /// Response produced and fully buffered.
    Completed { parts: Parts, body: Bytes },

    /// Tagged fault or panic.
    Faulted {
        fault: Fault,
        subject: Option<String>,
    },

    /// The body failed after the status line was already produced.
    Interrupted { parts: Parts, error: axum::Error },
}

/// Envelope and audit middleware.
///
/// See the module docs for the processing steps.
#[instrument(
    skip_all,
    name = "api.middleware.envelope",
    fields(method = %req.method(), path = %req.uri().path())
)]
pub async fn api_envelope(
    State(state): State<Arc<EnvelopeState>>,
    req: Request,
    next: Next,
) -> Response {
    let settings = &state.settings;
    let path = req.uri().path().to_string();

    if !settings.intercepts(&path) {
        return next.run(req).await;
    }

    let started = Instant::now();
    let request_time = Utc::now();
    let method = req.method().to_string();
    let query_string = req
        .uri()
        .query()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();
    let remote_address = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let (request_parts, request_body) = req.into_parts();
    let (request_text, outcome) = match collect_limited(request_body, settings.max_body_bytes).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            let req = Request::from_parts(request_parts, Body::from(bytes));
            (text, run_inner(next, req, settings.max_body_bytes).await)
        }
        Err(e) => {
            tracing::warn!(target: "api.middleware.envelope", error = %e, "Failed to read request body");
            let fault = Fault::Api(ApiFault::new(
                StatusCode::BAD_REQUEST,
                "The request body could not be read.",
            ));
            (String::new(), InnerOutcome::Faulted { fault, subject: None })
        }
    };

    let (parts, envelope, subject, kind) = match outcome {
        InnerOutcome::Completed { parts, body } => {
            let subject = parts.extensions.claims().map(|c| c.sub.clone());
            if parts.status == StatusCode::OK {
                let envelope = normalize_success(parts.status, &body);
                (parts, envelope, subject, EnvelopeOutcome::Success)
            } else {
                let envelope = normalize_not_success(parts.status);
                (parts, envelope, subject, EnvelopeOutcome::Failure)
            }
        }
        InnerOutcome::Faulted { fault, subject } => {
            tracing::warn!(
                target: "api.middleware.envelope",
                status = fault.status().as_u16(),
                fault = ?fault,
                "Request faulted"
            );
            let (mut parts, ()) = Response::new(()).into_parts();
            parts.status = fault.status();
            fault.apply_headers(&mut parts.headers);
            let envelope = fault.to_envelope(settings.expose_fault_details);
            (parts, envelope, subject, EnvelopeOutcome::Exception)
        }
        InnerOutcome::Interrupted { parts, error } => {
            tracing::warn!(
                target: "api.middleware.envelope",
                status = parts.status.as_u16(),
                error = %error,
                "Response body failed after the response started; passing the error through"
            );
            metrics::record_envelope_response(
                EnvelopeOutcome::Interrupted,
                parts.status.as_u16(),
                started.elapsed(),
            );
            let stream = futures::stream::once(async move { Err::<Bytes, _>(error) });
            return Response::from_parts(parts, Body::from_stream(stream));
        }
    };

    let status = parts.status;
    let body = encode_envelope(&envelope);
    let duration = started.elapsed();

    if settings.enable_api_logging && !settings.is_audit_excluded(&path) {
        let response_text = String::from_utf8_lossy(&body);
        let exchange = ApiExchange {
            request_time,
            duration,
            status_code: status.as_u16(),
            method: &method,
            path: &path,
            query_string: &query_string,
            request_body: &request_text,
            response_body: &response_text,
            remote_address: &remote_address,
            subject: subject.as_deref(),
        };
        write_audit(state.audit_sink.as_ref(), AuditRecord::from_exchange(&exchange)).await;
    }

    metrics::record_envelope_response(kind, status.as_u16(), duration);

    write_envelope(parts, body)
}

/// Run the inner pipeline and buffer its response, turning panics into
/// faults.
async fn run_inner(next: Next, req: Request, max_body_bytes: usize) -> InnerOutcome {
    let inner = async move {
        let response = next.run(req).await;

        if let Some(fault) = response.extensions().get::<Fault>().cloned() {
            let subject = response.claims().map(|c| c.sub.clone());
            return InnerOutcome::Faulted { fault, subject };
        }

        let (parts, body) = response.into_parts();
        match collect_limited(body, max_body_bytes).await {
            Ok(body) => InnerOutcome::Completed { parts, body },
            // Nothing has been sent yet, so this is still a fault
            Err(CollectError::TooLarge { limit }) => {
                tracing::error!(
                    target: "api.middleware.envelope",
                    status = parts.status.as_u16(),
                    limit,
                    "Response body exceeds the buffering limit"
                );
                InnerOutcome::Faulted {
                    fault: Fault::Unhandled {
                        message: format!("The response body exceeds {limit} bytes."),
                        details: None,
                    },
                    subject: parts.extensions.claims().map(|c| c.sub.clone()),
                }
            }
            Err(CollectError::Body(error)) => InnerOutcome::Interrupted { parts, error },
        }
    };

    match AssertUnwindSafe(inner).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => {
            tracing::error!(target: "api.middleware.envelope", "Request handler panicked");
            InnerOutcome::Faulted {
                fault: Fault::from_panic(payload.as_ref()),
                subject: None,
            }
        }
    }
}

#[derive(Debug, Error)]
enum CollectError {
    #[error("body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("body stream failed: {0}")]
    Body(axum::Error),
}

/// Buffer a body, refusing more than `limit` bytes.
async fn collect_limited(body: Body, limit: usize) -> Result<Bytes, CollectError> {
    let mut stream = body.into_data_stream();
    let mut buffer = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(CollectError::Body)?;
        if buffer.len().saturating_add(chunk.len()) > limit {
            return Err(CollectError::TooLarge { limit });
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer.freeze())
}

async fn write_audit(sink: &dyn ApiLogSink, record: AuditRecord) {
    match sink.log(record).await {
        Ok(()) => metrics::record_audit_write(true),
        Err(e) => {
            tracing::warn!(target: "api.audit", error = %e, "Failed to write API audit record");
            metrics::record_audit_write(false);
        }
    }
}

fn encode_envelope(envelope: &Envelope) -> Bytes {
    match serde_json::to_vec(envelope) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            tracing::error!(target: "api.middleware.envelope", error = %e, "Failed to serialize envelope");
            Bytes::new()
        }
    }
}

/// Replace the body, keeping the inner headers except the stale length.
fn write_envelope(mut parts: Parts, body: Bytes) -> Response {
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::from_parts(parts, Body::from(body))
}
