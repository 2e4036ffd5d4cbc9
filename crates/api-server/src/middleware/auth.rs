//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, validates it and
//! injects the claims into request extensions. The claims are also copied to
//! the response extensions so outer layers (the audit writer) can identify
//! the caller after the handler has run.

use crate::auth::{Claims, JwtValidator};
use crate::errors::ApiError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_validator: Arc<JwtValidator>,
}

/// Authentication middleware that validates bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 401 fault if the token is missing or invalid
/// - Otherwise the handler's response, tagged with the caller's claims
#[instrument(skip_all, name = "api.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "api.middleware.auth", "Missing Authorization header");
            ApiError::Unauthorized("Missing Authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "api.middleware.auth", "Invalid Authorization header format");
        ApiError::Unauthorized("Invalid Authorization header format".to_string())
    })?;

    let claims = state.jwt_validator.validate(token)?;

    req.extensions_mut().insert(claims.clone());

    let mut response = next.run(req).await;
    response.extensions_mut().insert(claims);

    Ok(response)
}

/// Access to the authenticated caller's claims.
///
/// Implemented for requests (handlers) and responses (outer middleware).
pub trait ClaimsExt {
    /// Returns `None` if the auth middleware did not run for this exchange.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::http::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}

impl<B> ClaimsExt for axum::http::Response<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}

impl ClaimsExt for axum::http::Extensions {
    fn claims(&self) -> Option<&Claims> {
        self.get::<Claims>()
    }
}
