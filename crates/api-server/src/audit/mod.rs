//! API audit logging.
//!
//! # Components
//!
//! - `record` - Audit record construction and storage rules
//! - `sink` - Destination seam for finished records

pub mod record;
pub mod sink;

pub use record::{is_audit_excluded, ApiExchange, AuditRecord};
pub use sink::{ApiLogSink, MemoryApiLogSink};
