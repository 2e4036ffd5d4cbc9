//! Repository layer.
//!
//! The backing store is either PostgreSQL or SQLite, picked at startup.
//! [`DbPool`] hides the choice from everything above the repositories.

pub mod api_logs;

pub use api_logs::ApiLogRepository;

use crate::config::DatabaseConfig;
use common::secret::ExposeSecret;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use tracing::instrument;

/// Statement timeout applied to every PostgreSQL connection.
const QUERY_TIMEOUT_SECS: u32 = 5;

/// Connection pool for whichever backend is configured.
#[derive(Clone, Debug)]
pub enum DbPool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    /// Connect to the configured backend.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the pool cannot be established.
    #[instrument(skip_all, name = "api.db.connect")]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        match config {
            DatabaseConfig::Postgres { url } => {
                let url = add_query_timeout(url.expose_secret(), QUERY_TIMEOUT_SECS);
                let pool = PgPoolOptions::new()
                    .max_connections(20)
                    .min_connections(2)
                    .acquire_timeout(Duration::from_secs(5))
                    .idle_timeout(Duration::from_secs(600))
                    .max_lifetime(Duration::from_secs(1800))
                    .connect(&url)
                    .await?;
                Ok(DbPool::Postgres(pool))
            }
            DatabaseConfig::Sqlite { filename } => {
                let options = SqliteConnectOptions::new()
                    .filename(filename)
                    .create_if_missing(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(Duration::from_secs(5))
                    .connect_with(options)
                    .await?;
                Ok(DbPool::Sqlite(pool))
            }
        }
    }

    /// Single-connection in-memory SQLite pool, migrated.
    ///
    /// # Errors
    ///
    /// Returns the driver or migration error.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = DbPool::Sqlite(pool);
        db.migrate().await?;
        Ok(db)
    }

    /// Apply the migrations for this backend.
    ///
    /// # Errors
    ///
    /// Returns the migration error if any migration fails.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        match self {
            DbPool::Postgres(pool) => sqlx::migrate!("./migrations/postgres").run(pool).await,
            DbPool::Sqlite(pool) => sqlx::migrate!("./migrations/sqlite").run(pool).await,
        }
    }

    /// Whether the database answers a trivial query.
    pub async fn ping(&self) -> bool {
        let result = match self {
            DbPool::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            DbPool::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        };

        if let Err(e) = &result {
            tracing::warn!(target: "api.db", error = %e, "Database ping failed");
        }
        result.is_ok()
    }

    pub fn backend(&self) -> &'static str {
        match self {
            DbPool::Postgres(_) => "postgres",
            DbPool::Sqlite(_) => "sqlite",
        }
    }
}

/// Adds statement_timeout to the database URL.
fn add_query_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}options=-c%20statement_timeout%3D{timeout_secs}s")
}
