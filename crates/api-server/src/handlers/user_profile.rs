//! User profile handler.
//!
//! Returns the authenticated caller's profile from their token claims.

use crate::auth::Claims;
use crate::envelope::Envelope;
use crate::errors::ApiError;
use crate::models::UserProfileResponse;
use axum::Extension;
use tracing::instrument;

pub const PROFILE_MESSAGE: &str = "Retrieved User Profile";

/// Handler for GET /api/userprofile/get
///
/// Requires the auth middleware. The path is on the default audit deny-list.
///
/// ## Response
///
/// ```json
/// {
///   "version": "0.1.0",
///   "statusCode": 200,
///   "message": "Retrieved User Profile",
///   "result": {
///     "userId": "3f1c0e2a-8a57-4c1b-9d7e-2b6b9d1f0a11",
///     "scopes": ["email:send"],
///     "expiresAt": 1234567890
///   }
/// }
/// ```
#[instrument(skip_all, name = "api.handlers.user_profile")]
pub async fn get_user_profile(Extension(claims): Extension<Claims>) -> Result<Envelope, ApiError> {
    tracing::debug!(target: "api.handlers.user_profile", "Returning user profile");

    let profile = UserProfileResponse {
        user_id: claims.sub.clone(),
        scopes: claims.scopes().iter().map(ToString::to_string).collect(),
        expires_at: claims.exp,
    };

    let result = serde_json::to_value(profile).map_err(anyhow::Error::from)?;
    Ok(Envelope::with_result(200, PROFILE_MESSAGE, result))
}
