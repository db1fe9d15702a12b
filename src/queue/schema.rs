//! Database schema for jobs.db.
//!
//! Defines versioned schema migrations for the job queue database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

// =============================================================================
// Jobs Table - Version 1
// =============================================================================

/// Main job table. The primary key is AUTOINCREMENT so id order is insertion
/// order, which the claim query uses as the FIFO tie-break within a priority.
const JOBS_TABLE_V1: Table = Table {
    name: "jobs",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            auto_increment = true
        ),
        sqlite_column!("tag", &SqlType::Text, non_null = true),
        sqlite_column!(
            "status",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'queued'")
        ),
        sqlite_column!(
            "priority",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("3")
        ),
        sqlite_column!(
            "timeout",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("600")
        ),
        sqlite_column!(
            "attempts",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "max_attempts",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
        sqlite_column!("worker_id", &SqlType::Text),
        sqlite_column!("result", &SqlType::Text),
        sqlite_column!("fail_reason", &SqlType::Text),
        sqlite_column!("fail_message", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("locked_at", &SqlType::Integer),
        sqlite_column!("started_at", &SqlType::Integer),
        sqlite_column!("completed_at", &SqlType::Integer),
        sqlite_column!("failed_at", &SqlType::Integer),
    ],
    indices: &[
        ("idx_jobs_tag_status_priority", "tag, status, priority"),
        ("idx_jobs_status", "status"),
    ],
};

/// Audit trail of queue events. `job_id` goes NULL if an external archival
/// process ever deletes the job row; the trail itself is kept.
const JOB_AUDIT_LOG_TABLE_V1: Table = Table {
    name: "job_audit_log",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            auto_increment = true
        ),
        sqlite_column!("event_type", &SqlType::Text, non_null = true),
        sqlite_column!(
            "job_id",
            &SqlType::Integer,
            foreign_key = Some(&ForeignKey {
                foreign_table: "jobs",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::SetNull,
            })
        ),
        sqlite_column!("worker_id", &SqlType::Text),
        sqlite_column!("details", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_job_audit_created", "created_at"),
        ("idx_job_audit_job", "job_id"),
        ("idx_job_audit_event_type", "event_type"),
    ],
};

pub const JOB_QUEUE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[JOBS_TABLE_V1, JOB_AUDIT_LOG_TABLE_V1],
    migration: None,
}];
