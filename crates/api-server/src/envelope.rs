//! Uniform response envelope.
//!
//! Every response under the API prefix is rewritten into an [`Envelope`]:
//!
//! ```json
//! {
//!   "version": "0.1.0",
//!   "statusCode": 404,
//!   "message": "Failure",
//!   "responseException": {
//!     "message": "The specified URI does not exist. Please verify and try again."
//!   }
//! }
//! ```
//!
//! `responseException` and `result` are omitted when absent. Key order and
//! names are part of the wire contract.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Envelope version, fixed per build.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error text for a 404 without a fault.
pub const NOT_FOUND_MESSAGE: &str =
    "The specified URI does not exist. Please verify and try again.";

/// Error text for a 204 without a fault.
pub const NO_CONTENT_MESSAGE: &str = "The specified URI does not contain any content.";

/// Error text for every other non-success status without a fault.
pub const UNPROCESSABLE_MESSAGE: &str =
    "Your request cannot be processed. Please contact a support.";

/// Outcome category carried in `message` for middleware-built envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMessage {
    Success,
    Failure,
    Exception,
}

impl ResponseMessage {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseMessage::Success => "Success",
            ResponseMessage::Failure => "Failure",
            ResponseMessage::Exception => "Exception",
        }
    }
}

/// Field name to list of validation messages.
pub type ValidationErrors = BTreeMap<String, Vec<String>>;

/// Structured error carried in `responseException`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredError {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<ValidationErrors>,

    #[serde(
        rename = "referenceErrorCode",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reference_code: Option<String>,

    #[serde(
        rename = "referenceDocumentLink",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reference_link: Option<String>,

    /// Diagnostic trace, only populated outside production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl StructuredError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            validation_errors: None,
            reference_code: None,
            reference_link: None,
            details: None,
        }
    }
}

/// The uniform response wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default = "default_version", deserialize_with = "null_as_version")]
    pub version: String,

    #[serde(default)]
    pub status_code: u16,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,

    #[serde(
        rename = "responseException",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<StructuredError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Envelope {
    /// Envelope with a message and neither result nor error.
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            version: API_VERSION.to_string(),
            status_code,
            message: message.into(),
            error: None,
            result: None,
        }
    }

    /// Envelope carrying a result payload. A JSON `null` result is dropped.
    pub fn with_result(status_code: u16, message: impl Into<String>, result: Value) -> Self {
        Self {
            result: non_null(result),
            ..Self::new(status_code, message)
        }
    }

    /// Fresh "Success" envelope around a handler body.
    pub fn success(status: StatusCode, result: Value) -> Self {
        Self::with_result(status.as_u16(), ResponseMessage::Success.as_str(), result)
    }

    /// "Failure" envelope for a non-success status.
    pub fn failure(status: StatusCode, error: StructuredError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(status.as_u16(), ResponseMessage::Failure.as_str())
        }
    }

    /// "Exception" envelope for a fault.
    pub fn exception(status: StatusCode, error: StructuredError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(status.as_u16(), ResponseMessage::Exception.as_str())
        }
    }

    /// Heuristic for bodies that already are envelopes.
    ///
    /// A body counts as an envelope when it is a JSON object that decodes
    /// into the envelope shape AND carries a non-null `result` or a non-empty
    /// `message`. Anything else (arrays, primitives, objects without either
    /// field, objects whose known fields have the wrong types) is treated as
    /// a plain payload. An ordinary payload object that happens to carry a
    /// non-empty `message` field therefore passes as an envelope.
    pub fn from_existing(body: &Value) -> Option<Self> {
        if !body.is_object() {
            return None;
        }

        Envelope::deserialize(body)
            .ok()
            .filter(|envelope| envelope.result.is_some() || !envelope.message.is_empty())
    }
}

/// Handler-built envelopes travel as HTTP 200; the middleware aligns
/// `statusCode` with the status actually written.
impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Normalize a 200 response body.
///
/// - Body that is not valid JSON: empty envelope
/// - Already an envelope (see [`Envelope::from_existing`]): reused, with
///   `statusCode` overwritten by the actual status
/// - Anything else: wrapped as a fresh "Success" envelope
pub fn normalize_success(status: StatusCode, body: &[u8]) -> Envelope {
    let parsed: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => return Envelope::new(status.as_u16(), ""),
    };

    if let Some(mut existing) = Envelope::from_existing(&parsed) {
        if existing.status_code != status.as_u16() {
            existing.status_code = status.as_u16();
        }
        return existing;
    }

    Envelope::success(status, parsed)
}

/// Normalize a non-200 response that finished without a fault.
pub fn normalize_not_success(status: StatusCode) -> Envelope {
    let message = match status {
        StatusCode::NOT_FOUND => NOT_FOUND_MESSAGE,
        StatusCode::NO_CONTENT => NO_CONTENT_MESSAGE,
        _ => UNPROCESSABLE_MESSAGE,
    };

    Envelope::failure(status, StructuredError::new(message))
}

fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        other => Some(other),
    }
}

fn default_version() -> String {
    API_VERSION.to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_version))
}
