//! API server
//!
//! Serves the enveloped HTTP API and writes the API audit log.

use api_server::config::Config;
use api_server::middleware::{EnvelopeSettings, EnvelopeState};
use api_server::observability::metrics::init_metrics_recorder;
use api_server::repositories::{ApiLogRepository, DbPool};
use api_server::routes::{self, AppState};
use api_server::services::TracingEmailSender;
use common::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration before tracing so LOG_FORMAT applies
    let config = Config::from_env()?;

    init_tracing("api_server=debug,tower_http=debug", config.log_format)?;

    info!("Starting API server");
    info!(
        bind_address = %config.bind_address,
        environment = ?config.environment,
        enable_api_logging = config.enable_api_logging,
        api_path_prefix = %config.api_path_prefix,
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        anyhow::anyhow!(e)
    })?;

    info!("Connecting to database...");
    let db = DbPool::connect(&config.database).await.map_err(|e| {
        error!("Failed to connect to database: {}", e);
        e
    })?;
    db.migrate().await.map_err(|e| {
        error!("Failed to run database migrations: {}", e);
        e
    })?;
    info!(backend = db.backend(), "Database connection established");

    let bind_address = config.bind_address.clone();

    let envelope_state = Arc::new(EnvelopeState::new(
        EnvelopeSettings::from_config(&config),
        Arc::new(ApiLogRepository::new(db.clone())),
    ));

    let state = Arc::new(AppState {
        db,
        email_sender: Arc::new(TracingEmailSender::new(&config.email)),
        config,
    });

    let app = routes::build_routes(state, envelope_state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("API server shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("API_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (API_DRAIN_SECONDS=0)");
    }
}
