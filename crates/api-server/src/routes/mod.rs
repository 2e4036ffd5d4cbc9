//! HTTP routes.
//!
//! Defines the Axum router and application state.

use crate::auth::JwtValidator;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{api_envelope, require_auth, AuthState, EnvelopeState};
use crate::repositories::DbPool;
use crate::services::EmailSender;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Upper bound on handling one request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DbPool,

    /// Service configuration.
    pub config: Config,

    /// Outgoing email seam.
    pub email_sender: Arc<dyn EmailSender>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Health check (database ping) - public, not enveloped
/// - `/metrics` - Prometheus metrics endpoint - public, not enveloped
/// - `{api}/email/send` - Send the test email - requires authentication
/// - `{api}/userprofile/get` - Caller profile - requires authentication
/// - TraceLayer for request logging
/// - 30 second request timeout
/// - Envelope and audit middleware (outermost)
pub fn build_routes(
    state: Arc<AppState>,
    envelope_state: Arc<EnvelopeState>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let jwt_validator = Arc::new(JwtValidator::new(
        state.config.jwt_secret.clone(),
        state.config.jwt_clock_skew_seconds,
    ));
    let auth_state = Arc::new(AuthState { jwt_validator });

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected API routes (authentication required)
    let api_routes = Router::new()
        .route("/email/send", post(handlers::send_email))
        .route("/userprofile/get", get(handlers::get_user_profile))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state.clone());

    let router = public_routes
        .merge(metrics_routes)
        .nest(&state.config.api_path_prefix, api_routes);

    with_middleware(router, envelope_state, REQUEST_TIMEOUT)
}

/// Apply the global middleware layers.
///
/// Each `.layer` call wraps the ones before it, so execution order is:
/// 1. api_envelope - Envelope and audit ALL API responses (outermost),
///    including framework-level 404/405/408
/// 2. TraceLayer - Log request details
/// 3. TimeoutLayer - Timeout the request (innermost)
fn with_middleware(router: Router, envelope_state: Arc<EnvelopeState>, timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(envelope_state, api_envelope))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::audit::MemoryApiLogSink;
    use crate::envelope::UNPROCESSABLE_MESSAGE;
    use crate::middleware::EnvelopeSettings;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_timeout_is_enveloped_and_audited() {
        let sink = Arc::new(MemoryApiLogSink::new());
        let envelope_state = Arc::new(EnvelopeState::new(
            EnvelopeSettings {
                api_prefix: "/api".to_string(),
                docs_prefix: "/swagger".to_string(),
                audit_excluded_paths: Vec::new(),
                enable_api_logging: true,
                expose_fault_details: false,
                max_body_bytes: 1024,
            },
            sink.clone(),
        ));
        let router = Router::new().route(
            "/api/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                "late"
            }),
        );
        let app = with_middleware(router, envelope_state, Duration::from_millis(50));

        let response = app
            .oneshot(Request::builder().uri("/api/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["statusCode"], 408);
        assert_eq!(body["message"], "Failure");
        assert_eq!(body["responseException"]["message"], UNPROCESSABLE_MESSAGE);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records.first().unwrap().status_code, 408);
    }

    #[test]
    fn test_app_state_is_clone() {
        // Required for Axum's State extractor.
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_config_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<Config>();
    }
}
