//! Job Queue module
//!
//! Provides a durable, multi-tenant work queue with leased claims, retry
//! accounting, and an audit trail. Workers poll for jobs by tag and report
//! outcomes back; nothing in here pushes work at them.

mod audit_logger;
mod error;
mod manager;
mod models;
mod schema;
mod store;

pub use audit_logger::AuditLogger;
pub use error::QueueError;
pub use manager::QueueManager;
pub use models::*;
pub use schema::JOB_QUEUE_VERSIONED_SCHEMAS;
pub use store::{JobStore, SqliteJobStore};
