//! Data types shared by handlers and services.

use serde::{Deserialize, Serialize};

/// Health check response.
///
/// Returned by `GET /health`, outside the enveloped prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy" or "unhealthy").
    pub status: String,

    /// Storage backend ("postgres" or "sqlite").
    pub backend: String,

    /// Database connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

/// Maximum accepted subject length.
pub const MAX_EMAIL_SUBJECT_LENGTH: usize = 998;

/// Body of `POST /api/email/send`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailDto {
    pub to_name: String,
    pub to_address: String,
    pub subject: String,
    pub body: String,
    pub template_name: Option<String>,
}

impl EmailDto {
    /// Field-level validation errors, empty when the model is valid.
    pub fn validate(&self) -> Vec<(&'static str, &'static str)> {
        let mut errors = Vec::new();

        if self.to_address.trim().is_empty() {
            errors.push(("toAddress", "is required"));
        } else if !looks_like_email(self.to_address.trim()) {
            errors.push(("toAddress", "is not a valid email address"));
        }

        if self.to_name.trim().is_empty() {
            errors.push(("toName", "is required"));
        }

        if self.subject.chars().count() > MAX_EMAIL_SUBJECT_LENGTH {
            errors.push(("subject", "is too long"));
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// `local@domain` with a dot in the domain and no whitespace.
fn looks_like_email(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !address.chars().any(char::is_whitespace)
        && !domain.contains('@')
}

/// Result of `GET /api/userprofile/get`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileResponse {
    pub user_id: String,
    pub scopes: Vec<String>,
    pub expires_at: i64,
}
