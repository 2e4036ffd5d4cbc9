//! Bearer token validation.
//!
//! # Security
//!
//! - Tokens are size- and shape-checked BEFORE decoding
//! - Only HS256 is accepted
//! - Expiration and issued-at claims are validated, `iat` with clock skew
//! - Every failure maps to the same generic reason

use crate::auth::claims::Claims;
use crate::errors::ApiError;
use common::jwt::{check_token_shape, validate_iat};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::time::Duration;
use tracing::instrument;

const INVALID_TOKEN: &str = "The access token is invalid or expired";

/// Validates HS256 bearer tokens against a shared secret.
pub struct JwtValidator {
    /// `None` rejects every token.
    secret: Option<SecretString>,

    clock_skew: Duration,
}

impl JwtValidator {
    pub fn new(secret: Option<SecretString>, clock_skew_seconds: i64) -> Self {
        Self {
            secret,
            clock_skew: Duration::from_secs(clock_skew_seconds.unsigned_abs()),
        }
    }

    /// Validate a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for every validation failure.
    #[instrument(skip_all, name = "api.auth.jwt")]
    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        let Some(secret) = &self.secret else {
            tracing::warn!(target: "api.auth.jwt", "No JWT secret configured; rejecting token");
            return Err(ApiError::Unauthorized(INVALID_TOKEN.to_string()));
        };

        check_token_shape(token).map_err(|e| {
            tracing::debug!(target: "api.auth.jwt", error = ?e, "Token pre-validation failed");
            ApiError::Unauthorized(INVALID_TOKEN.to_string())
        })?;

        let key = DecodingKey::from_secret(secret.expose_secret().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.required_spec_claims = ["exp", "sub"].iter().map(ToString::to_string).collect();

        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(|e| {
                tracing::debug!(target: "api.auth.jwt", error = %e, "Token verification failed");
                ApiError::Unauthorized(INVALID_TOKEN.to_string())
            })?
            .claims;

        validate_iat(claims.iat, self.clock_skew).map_err(|e| {
            tracing::debug!(target: "api.auth.jwt", error = ?e, "Token iat validation failed");
            ApiError::Unauthorized(INVALID_TOKEN.to_string())
        })?;

        tracing::debug!(target: "api.auth.jwt", "Token validated successfully");
        Ok(claims)
    }
}
