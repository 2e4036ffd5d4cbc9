//! Test server harness for E2E testing
//!
//! Provides `TestApiServer` for spawning real API server instances in tests.
//! Each instance gets its own in-memory SQLite database, an in-memory audit
//! sink and a mock email sender, so tests can inspect side effects.

use api_server::audit::{AuditRecord, MemoryApiLogSink};
use api_server::auth::Claims;
use api_server::config::Config;
use api_server::middleware::{EnvelopeSettings, EnvelopeState};
use api_server::observability::metrics::init_metrics_recorder;
use api_server::repositories::DbPool;
use api_server::routes::{self, AppState};
use api_server::services::{EmailMessage, MockEmailSender};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// HS256 secret every test server is configured with.
pub const TEST_JWT_SECRET: &str = "api-test-utils-jwt-secret";

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> =
    OnceLock::new();

fn get_test_metrics_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// Test harness for spawning the API server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_not_found_is_enveloped() -> Result<(), anyhow::Error> {
///     let server = TestApiServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/api/nope", server.url())).await?;
///
///     assert_eq!(response.status(), 404);
///     Ok(())
/// }
/// ```
pub struct TestApiServer {
    addr: SocketAddr,
    db: DbPool,
    config: Config,
    audit_sink: Arc<MemoryApiLogSink>,
    email_sender: Arc<MockEmailSender>,
    _handle: JoinHandle<()>,
}

impl TestApiServer {
    /// Spawn a server with the default test configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(&[]).await
    }

    /// Spawn a server, overriding configuration variables.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use a fresh in-memory SQLite database
    /// - Record audit entries in memory
    /// - Capture emails instead of sending them
    pub async fn spawn_with(overrides: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        Self::spawn_with_senders(overrides, MockEmailSender::new()).await
    }

    /// Spawn a server whose email sender fails every send.
    pub async fn spawn_with_failing_email() -> Result<Self, anyhow::Error> {
        Self::spawn_with_senders(&[], MockEmailSender::failing()).await
    }

    async fn spawn_with_senders(
        overrides: &[(&str, &str)],
        email_sender: MockEmailSender,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("APP_ENVIRONMENT".to_string(), "production".to_string()),
            ("JWT_SECRET".to_string(), TEST_JWT_SECRET.to_string()),
            ("EMAIL_FROM_NAME".to_string(), "API Tests".to_string()),
            (
                "EMAIL_FROM_ADDRESS".to_string(),
                "noreply@example.com".to_string(),
            ),
        ]);
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let db = DbPool::in_memory()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create test database: {}", e))?;

        let audit_sink = Arc::new(MemoryApiLogSink::new());
        let email_sender = Arc::new(email_sender);

        let envelope_state = Arc::new(EnvelopeState::new(
            EnvelopeSettings::from_config(&config),
            audit_sink.clone(),
        ));

        let state = Arc::new(AppState {
            db: db.clone(),
            config: config.clone(),
            email_sender: email_sender.clone(),
        });

        // Build routes using api-server's real route builder
        let app = routes::build_routes(state, envelope_state, get_test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            // ConnectInfo is needed for the audit remote address
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            db,
            config,
            audit_sink,
            email_sender,
            _handle: handle,
        })
    }

    /// Mint a valid bearer token for `subject`.
    pub fn token_for(subject: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        Self::token_with_claims(&Claims {
            sub: subject.to_string(),
            exp: now + 3600,
            iat: now,
            scope: "email:send profile:read".to_string(),
        })
    }

    /// Sign arbitrary claims with the test secret.
    pub fn token_with_claims(claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        )
        .expect("HS256 encoding with a static secret cannot fail")
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the database pool.
    pub fn db(&self) -> &DbPool {
        &self.db
    }

    /// Audit records written so far.
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit_sink.records()
    }

    /// Emails handed to the sender so far.
    pub fn sent_emails(&self) -> Vec<EmailMessage> {
        self.email_sender.sent()
    }
}

impl Drop for TestApiServer {
    fn drop(&mut self) {
        // Abort the HTTP server task when the test completes
        self._handle.abort();
    }
}
