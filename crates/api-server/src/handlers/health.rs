//! Health check handler.
//!
//! Served outside the API prefix so orchestrators see a plain body.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Health check handler.
///
/// Pings the database and returns the service status. An unreachable
/// database is reported in the body, not as an error, so orchestrators can
/// read the response.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "backend": "sqlite",
///   "database": "healthy"
/// }
/// ```
#[instrument(skip_all, name = "api.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let db_status = if state.db.ping().await {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: db_status.to_string(),
        backend: state.db.backend().to_string(),
        database: Some(db_status.to_string()),
    })
}
