//! API error types and the fault tag used by the envelope middleware.
//!
//! Handlers return [`ApiError`]. Its `IntoResponse` impl renders the
//! production form of the envelope and attaches a [`Fault`] extension to the
//! response, so the outer middleware can tell a fault apart from an ordinary
//! non-success status and re-render it for the configured environment.

use crate::envelope::{Envelope, StructuredError, ValidationErrors};
use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::Cell;
use std::sync::Once;
use thiserror::Error;

/// Message returned for authentication failures.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized Access";

/// Message returned for unhandled faults in production.
pub const UNHANDLED_MESSAGE: &str = "An unhandled error occurred.";

const WWW_AUTHENTICATE_VALUE: &str = "Bearer realm=\"api\", error=\"invalid_token\"";

thread_local! {
    /// Location and backtrace of the latest panic on this thread.
    static LAST_PANIC: Cell<Option<String>> = const { Cell::new(None) };
}

static PANIC_CAPTURE: Once = Once::new();

/// Install a panic hook that records where each panic happened.
///
/// The report is taken at the panic site, before unwinding, and read back by
/// [`Fault::from_panic`] on the same thread. The previously installed hook
/// still runs. Idempotent.
pub fn install_panic_capture() {
    PANIC_CAPTURE.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| format!("panicked at {}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "panicked at an unknown location".to_string());
            let report = format!("{location}\n{}", Backtrace::force_capture());
            LAST_PANIC.with(|slot| slot.set(Some(report)));
            previous(info);
        }));
    });
}

/// A domain error raised deliberately by a handler.
///
/// Carries its own status and message plus optional validation details and
/// reference metadata, all of which reach the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFault {
    pub status: StatusCode,
    pub message: String,
    pub validation_errors: Option<ValidationErrors>,
    pub reference_code: Option<String>,
    pub reference_link: Option<String>,
}

impl ApiFault {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            validation_errors: None,
            reference_code: None,
            reference_link: None,
        }
    }

    #[must_use]
    pub fn with_validation_error(
        mut self,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.validation_errors
            .get_or_insert_with(ValidationErrors::new)
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    #[must_use]
    pub fn with_reference_code(mut self, code: impl Into<String>) -> Self {
        self.reference_code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_reference_link(mut self, link: impl Into<String>) -> Self {
        self.reference_link = Some(link.into());
        self
    }
}

impl std::fmt::Display for ApiFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)
    }
}

/// API error type.
///
/// Maps to HTTP status codes:
/// - Api: the fault's own status
/// - Unauthorized: 401 Unauthorized
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Api(ApiFault),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CONFLICT, message)
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Api(ApiFault::new(status, message))
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Api(fault) => fault.status.as_u16(),
            ApiError::Unauthorized(_) => 401,
            ApiError::Database(_) | ApiError::Internal(_) => 500,
        }
    }

    /// The fault tag the envelope middleware renders from.
    pub fn to_fault(&self) -> Fault {
        match self {
            ApiError::Api(fault) => Fault::Api(fault.clone()),
            ApiError::Unauthorized(_) => Fault::Unauthorized,
            ApiError::Database(err) => Fault::Unhandled {
                message: err.clone(),
                details: Some(format!("{self:?}")),
            },
            ApiError::Internal(err) => Fault::Unhandled {
                message: err.root_cause().to_string(),
                details: Some(format!("{err:?}")),
            },
        }
    }
}

/// Convert sqlx errors to ApiError
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<ApiFault> for ApiError {
    fn from(fault: ApiFault) -> Self {
        ApiError::Api(fault)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Log actual error server-side; the client only sees the envelope
        match &self {
            ApiError::Database(err) => {
                tracing::error!(target: "api.database", error = %err, "Database operation failed");
            }
            ApiError::Internal(err) => {
                tracing::error!(target: "api.errors", error = ?err, "Unhandled internal error");
            }
            ApiError::Unauthorized(reason) => {
                tracing::debug!(target: "api.auth", reason = %reason, "Request rejected");
            }
            ApiError::Api(_) => {}
        }

        let fault = self.to_fault();
        let mut response = fault.render(false);
        response.extensions_mut().insert(fault);
        response
    }
}

/// Fault tag carried in response extensions.
///
/// A response without this tag is never treated as a fault, whatever its
/// status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Domain error with its own status and message.
    Api(ApiFault),

    /// Authentication failure.
    Unauthorized,

    /// Anything else, including panics inside the pipeline.
    Unhandled {
        message: String,
        details: Option<String>,
    },
}

impl Fault {
    /// Build a fault from a caught panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "request handler panicked".to_string()
        };

        // Only present when install_panic_capture ran before the panic
        let details = LAST_PANIC.with(Cell::take);

        Fault::Unhandled { message, details }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Fault::Api(fault) => fault.status,
            Fault::Unauthorized => StatusCode::UNAUTHORIZED,
            Fault::Unhandled { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Exception envelope for this fault.
    ///
    /// Unhandled faults only expose their message and details when
    /// `expose_details` is set.
    pub fn to_envelope(&self, expose_details: bool) -> Envelope {
        let error = match self {
            Fault::Api(fault) => StructuredError {
                message: fault.message.clone(),
                validation_errors: fault.validation_errors.clone(),
                reference_code: fault.reference_code.clone(),
                reference_link: fault.reference_link.clone(),
                details: None,
            },
            Fault::Unauthorized => StructuredError::new(UNAUTHORIZED_MESSAGE),
            Fault::Unhandled { message, details } if expose_details => StructuredError {
                details: details.clone(),
                ..StructuredError::new(message.clone())
            },
            Fault::Unhandled { .. } => StructuredError::new(UNHANDLED_MESSAGE),
        };

        Envelope::exception(self.status(), error)
    }

    /// Headers that accompany this fault on the wire.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        if matches!(self, Fault::Unauthorized) {
            headers.insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static(WWW_AUTHENTICATE_VALUE),
            );
        }
    }

    /// Full response for this fault.
    pub fn render(&self, expose_details: bool) -> Response {
        let mut response = (self.status(), Json(self.to_envelope(expose_details))).into_response();
        self.apply_headers(response.headers_mut());
        response
    }
}
