//! Audit record construction.
//!
//! An [`ApiExchange`] is the raw view of one intercepted request/response
//! pair. [`AuditRecord::from_exchange`] applies the storage rules: response
//! bodies are reduced to their envelope `result`, long texts are truncated,
//! and the caller is resolved to a user id.

use crate::envelope::Envelope;
use chrono::{DateTime, Utc};
use serde_json::Value;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Texts longer than this are truncated before storage.
pub const AUDIT_TRUNCATE_THRESHOLD: usize = 256;

/// Number of characters kept from a truncated text.
pub const AUDIT_TRUNCATED_LENGTH: usize = 200;

/// Prefix marking a truncated text.
pub const AUDIT_TRUNCATED_PREFIX: &str = "(Truncated to 200 chars) ";

const RESULT_MARKER: &str = "\"result\":";

/// Raw data of one intercepted exchange.
#[derive(Debug, Clone)]
pub struct ApiExchange<'a> {
    pub request_time: DateTime<Utc>,
    pub duration: Duration,
    pub status_code: u16,
    pub method: &'a str,
    pub path: &'a str,
    /// Raw query string including the leading `?`, or empty.
    pub query_string: &'a str,
    pub request_body: &'a str,
    /// Final body written to the client.
    pub response_body: &'a str,
    /// Client IP, or empty when unknown.
    pub remote_address: &'a str,
    /// Authenticated subject, if any.
    pub subject: Option<&'a str>,
}

/// One persisted API log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub request_time: DateTime<Utc>,
    pub duration_millis: i64,
    pub status_code: u16,
    pub method: String,
    pub path: String,
    pub query_string: String,
    pub request_body: String,
    pub response_body: String,
    pub remote_address: String,
    pub user_id: Uuid,
}

impl AuditRecord {
    pub fn from_exchange(exchange: &ApiExchange<'_>) -> Self {
        Self {
            request_time: exchange.request_time,
            duration_millis: i64::try_from(exchange.duration.as_millis()).unwrap_or(i64::MAX),
            status_code: exchange.status_code,
            method: exchange.method.to_string(),
            path: exchange.path.to_string(),
            query_string: truncate_for_audit(exchange.query_string),
            request_body: truncate_for_audit(exchange.request_body),
            response_body: truncate_for_audit(&extract_result_for_audit(exchange.response_body)),
            remote_address: exchange.remote_address.to_string(),
            user_id: resolve_user_id(exchange.subject),
        }
    }
}

/// Truncate texts over the threshold, counted in characters.
pub fn truncate_for_audit(text: &str) -> String {
    if text.chars().count() > AUDIT_TRUNCATE_THRESHOLD {
        let kept: String = text.chars().take(AUDIT_TRUNCATED_LENGTH).collect();
        format!("{AUDIT_TRUNCATED_PREFIX}{kept}")
    } else {
        text.to_string()
    }
}

/// Reduce an envelope body to its `result`, compactly re-serialized.
///
/// Only bodies containing the literal `"result":` are parsed. Anything that
/// does not parse as an envelope with a result is kept verbatim.
pub fn extract_result_for_audit(response_body: &str) -> String {
    if !response_body.contains(RESULT_MARKER) {
        return response_body.to_string();
    }

    match serde_json::from_str::<Envelope>(response_body) {
        Ok(Envelope {
            result: Some(Value::String(text)),
            ..
        }) => text,
        Ok(Envelope {
            result: Some(result),
            ..
        }) => serde_json::to_string(&result).unwrap_or_else(|_| response_body.to_string()),
        _ => response_body.to_string(),
    }
}

/// The caller's user id, or the nil id when unauthenticated or when the
/// subject is not a UUID.
pub fn resolve_user_id(subject: Option<&str>) -> Uuid {
    subject
        .and_then(|sub| Uuid::parse_str(sub).ok())
        .unwrap_or(Uuid::nil())
}

/// Whether `path` starts with any deny-list entry, case-insensitively.
///
/// Entries are expected lowercase.
pub fn is_audit_excluded(path: &str, excluded: &[String]) -> bool {
    let path = path.to_ascii_lowercase();
    excluded.iter().any(|prefix| path.starts_with(prefix.as_str()))
}
