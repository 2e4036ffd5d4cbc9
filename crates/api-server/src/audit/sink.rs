//! Audit sink seam.
//!
//! The envelope middleware hands finished records to an [`ApiLogSink`].
//! Production uses the database-backed
//! [`ApiLogRepository`](crate::repositories::ApiLogRepository); tests use
//! [`MemoryApiLogSink`].

use crate::audit::record::AuditRecord;
use crate::errors::ApiError;
use async_trait::async_trait;
use std::sync::Mutex;

/// Destination for audit records.
#[async_trait]
pub trait ApiLogSink: Send + Sync {
    /// Persist one record.
    ///
    /// # Errors
    ///
    /// Any error is logged by the caller and never reaches the client.
    async fn log(&self, record: AuditRecord) -> Result<(), ApiError>;
}

/// In-memory sink that keeps every record, optionally failing every write.
#[derive(Debug, Default)]
pub struct MemoryApiLogSink {
    records: Mutex<Vec<AuditRecord>>,
    fail_writes: bool,
}

impl MemoryApiLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every write fails.
    pub fn failing() -> Self {
        Self {
            records: Mutex::default(),
            fail_writes: true,
        }
    }

    /// Snapshot of the records written so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ApiLogSink for MemoryApiLogSink {
    async fn log(&self, record: AuditRecord) -> Result<(), ApiError> {
        if self.fail_writes {
            return Err(ApiError::Database("audit store unavailable".to_string()));
        }

        self.records
            .lock()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("audit sink lock poisoned")))?
            .push(record);
        Ok(())
    }
}
