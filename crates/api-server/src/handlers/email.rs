//! Email handlers.

use crate::envelope::Envelope;
use crate::errors::ApiError;
use crate::models::EmailDto;
use crate::routes::AppState;
use crate::services::{build_test_email, EmailAddress};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Returned in place of an error when the body fails validation.
pub const INVALID_MODEL_MESSAGE: &str = "User Model is Invalid";

pub const EMAIL_SENT_MESSAGE: &str = "Email Successfuly Sent";

/// Handler for POST /api/email/send
///
/// An unreadable or invalid body yields a 400 envelope written over HTTP 200,
/// not a fault; the envelope middleware aligns its `statusCode` with 200.
/// Every message is sent with the test template, whatever the caller asks
/// for.
#[instrument(skip_all, name = "api.handlers.send_email")]
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmailDto>, JsonRejection>,
) -> Result<Envelope, ApiError> {
    let dto = match payload {
        Ok(Json(dto)) => dto,
        Err(rejection) => {
            tracing::debug!(target: "api.handlers.email", error = %rejection, "Email body rejected");
            return Ok(Envelope::new(400, INVALID_MODEL_MESSAGE));
        }
    };

    let errors = dto.validate();
    if !errors.is_empty() {
        tracing::debug!(target: "api.handlers.email", errors = ?errors, "Email model invalid");
        return Ok(Envelope::new(400, INVALID_MODEL_MESSAGE));
    }

    let sender = &state.email_sender;
    let message = build_test_email(
        sender.sender(),
        EmailAddress::new(dto.to_name.trim(), dto.to_address.trim()),
    );

    tracing::info!(target: "api.handlers.email", subject = %message.subject, "Sending test email");
    sender.send(&message).await?;

    Ok(Envelope::new(200, EMAIL_SENT_MESSAGE))
}
