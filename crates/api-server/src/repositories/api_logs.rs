//! API log repository.
//!
//! Database-backed [`ApiLogSink`]. Records are append-only; the read path
//! exists for operators and tests.
//!
//! # Security
//!
//! - All queries use parameterized statements
//! - Write failures are reported to the caller, which logs and drops them

use crate::audit::{ApiLogSink, AuditRecord};
use crate::errors::ApiError;
use crate::observability::metrics;
use crate::repositories::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

const INSERT_PG: &str = r#"
    INSERT INTO api_logs (request_time, duration_millis, status_code, method, path,
                          query_string, request_body, response_body, remote_address, user_id)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
"#;

const INSERT_SQLITE: &str = r#"
    INSERT INTO api_logs (request_time, duration_millis, status_code, method, path,
                          query_string, request_body, response_body, remote_address, user_id)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const RECENT_PG: &str = r#"
    SELECT request_time, duration_millis, status_code, method, path,
           query_string, request_body, response_body, remote_address, user_id
    FROM api_logs
    ORDER BY id DESC
    LIMIT $1
"#;

const RECENT_SQLITE: &str = r#"
    SELECT request_time, duration_millis, status_code, method, path,
           query_string, request_body, response_body, remote_address, user_id
    FROM api_logs
    ORDER BY id DESC
    LIMIT ?
"#;

#[derive(Debug, sqlx::FromRow)]
struct ApiLogRow {
    request_time: DateTime<Utc>,
    duration_millis: i64,
    status_code: i32,
    method: String,
    path: String,
    query_string: String,
    request_body: String,
    response_body: String,
    remote_address: String,
    user_id: Uuid,
}

impl From<ApiLogRow> for AuditRecord {
    fn from(row: ApiLogRow) -> Self {
        AuditRecord {
            request_time: row.request_time,
            duration_millis: row.duration_millis,
            status_code: u16::try_from(row.status_code).unwrap_or_default(),
            method: row.method,
            path: row.path,
            query_string: row.query_string,
            request_body: row.request_body,
            response_body: row.response_body,
            remote_address: row.remote_address,
            user_id: row.user_id,
        }
    }
}

/// Writes audit records to the `api_logs` table.
#[derive(Debug, Clone)]
pub struct ApiLogRepository {
    pool: DbPool,
}

impl ApiLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert one record.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Database` if the insert fails.
    #[instrument(skip_all, name = "api.repo.insert_api_log")]
    pub async fn insert(&self, record: &AuditRecord) -> Result<(), ApiError> {
        let start = Instant::now();

        let result = match &self.pool {
            DbPool::Postgres(pool) => sqlx::query(INSERT_PG)
                .bind(record.request_time)
                .bind(record.duration_millis)
                .bind(i32::from(record.status_code))
                .bind(&record.method)
                .bind(&record.path)
                .bind(&record.query_string)
                .bind(&record.request_body)
                .bind(&record.response_body)
                .bind(&record.remote_address)
                .bind(record.user_id)
                .execute(pool)
                .await
                .map(|_| ()),
            DbPool::Sqlite(pool) => sqlx::query(INSERT_SQLITE)
                .bind(record.request_time)
                .bind(record.duration_millis)
                .bind(i32::from(record.status_code))
                .bind(&record.method)
                .bind(&record.path)
                .bind(&record.query_string)
                .bind(&record.request_body)
                .bind(&record.response_body)
                .bind(&record.remote_address)
                .bind(record.user_id)
                .execute(pool)
                .await
                .map(|_| ()),
        };

        let duration = start.elapsed();
        match result {
            Ok(()) => {
                metrics::record_db_query("insert_api_log", "success", duration);
                Ok(())
            }
            Err(e) => {
                metrics::record_db_query("insert_api_log", "error", duration);
                Err(ApiError::from(e))
            }
        }
    }

    /// Most recent records, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Database` if the query fails.
    #[instrument(skip_all, name = "api.repo.recent_api_logs")]
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditRecord>, ApiError> {
        let start = Instant::now();

        let rows: Result<Vec<ApiLogRow>, sqlx::Error> = match &self.pool {
            DbPool::Postgres(pool) => {
                sqlx::query_as(RECENT_PG).bind(limit).fetch_all(pool).await
            }
            DbPool::Sqlite(pool) => {
                sqlx::query_as(RECENT_SQLITE)
                    .bind(limit)
                    .fetch_all(pool)
                    .await
            }
        };

        let duration = start.elapsed();
        let status = if rows.is_ok() { "success" } else { "error" };
        metrics::record_db_query("recent_api_logs", status, duration);

        Ok(rows?.into_iter().map(AuditRecord::from).collect())
    }
}

#[async_trait]
impl ApiLogSink for ApiLogRepository {
    async fn log(&self, record: AuditRecord) -> Result<(), ApiError> {
        self.insert(&record).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(path: &str, user_id: Uuid) -> AuditRecord {
        AuditRecord {
            request_time: Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap(),
            duration_millis: 42,
            status_code: 404,
            method: "GET".to_string(),
            path: path.to_string(),
            query_string: "?page=2".to_string(),
            request_body: String::new(),
            response_body: r#"{"message":"Failure"}"#.to_string(),
            remote_address: "127.0.0.1".to_string(),
            user_id,
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let repo = ApiLogRepository::new(DbPool::in_memory().await.unwrap());
        let user = Uuid::new_v4();
        let written = record("/api/todos/7", user);

        repo.log(written.clone()).await.unwrap();

        let stored = repo.recent(10).await.unwrap();
        assert_eq!(stored, vec![written]);
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_and_limited() {
        let repo = ApiLogRepository::new(DbPool::in_memory().await.unwrap());

        for path in ["/api/a", "/api/b", "/api/c"] {
            repo.insert(&record(path, Uuid::nil())).await.unwrap();
        }

        let paths: Vec<String> = repo
            .recent(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(paths, vec!["/api/c", "/api/b"]);
    }

    #[tokio::test]
    async fn test_insert_without_table_is_database_error() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repo = ApiLogRepository::new(DbPool::Sqlite(pool));

        let result = repo.insert(&record("/api/a", Uuid::nil())).await;
        assert!(matches!(result, Err(ApiError::Database(_))));
    }
}
