//! Job queue storage and persistence.
//!
//! Provides SQLite-backed storage for job rows and the audit trail, including
//! the atomic claim operation every worker coordination guarantee rests on.

use super::error::QueueError;
use super::models::*;
use super::schema::JOB_QUEUE_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Trait for job queue storage operations.
///
/// Inputs are validated by the caller; every method here maps directly onto
/// one transactional unit against the store. Mutating operations either
/// commit fully or leave no trace.
pub trait JobStore: Send + Sync {
    // === Job Management ===

    /// Insert a new job in `queued` state and return the stored row.
    fn enqueue(&self, new_job: NewJob) -> Result<Job, QueueError>;

    /// Get a job by id.
    fn get_job(&self, id: i64) -> Result<Option<Job>, QueueError>;

    /// List jobs matching the filter, newest first. Returns (jobs, total_count).
    fn list_jobs(&self, filter: &JobFilter) -> Result<(Vec<Job>, usize), QueueError>;

    // === Claim Engine ===

    /// Atomically claim up to `limit` eligible jobs of the given tags for a
    /// worker. Eligible rows are handed out in priority order (ties by
    /// insertion order); rows another claimant wins in the meantime are
    /// skipped, never waited on. Returns the claimed rows post-mutation.
    fn claim(&self, tags: &[String], worker_id: &str, limit: usize) -> Result<Vec<Job>, QueueError>;

    // === Lifecycle Transitions ===

    /// Return a leased job to `queued`, clearing the lease and the worker.
    fn release(&self, job_id: i64, worker_id: &str) -> Result<Job, QueueError>;

    /// Mark a leased job `completed`, storing the optional result payload.
    fn complete(
        &self,
        job_id: i64,
        worker_id: &str,
        result: Option<serde_json::Value>,
    ) -> Result<Job, QueueError>;

    /// Record a failure on a leased job. The job becomes `failed` once its
    /// attempts reach `max_attempts`, otherwise `failed_retrying`.
    fn fail(
        &self,
        job_id: i64,
        worker_id: &str,
        reason: &str,
        message: &str,
    ) -> Result<Job, QueueError>;

    // === Statistics ===

    /// Per-status job counts.
    fn queue_stats(&self) -> Result<QueueStats, QueueError>;

    // === Audit Logging ===

    /// Record a queue event.
    fn log_audit_event(&self, entry: AuditLogEntry) -> Result<(), QueueError>;

    /// Get audit entries with filtering, newest first. Returns (entries, total_count).
    fn get_audit_log(&self, filter: &AuditLogFilter)
        -> Result<(Vec<AuditLogEntry>, usize), QueueError>;

    /// Get all audit entries for one job, oldest first.
    fn get_job_audit_log(&self, job_id: i64) -> Result<Vec<AuditLogEntry>, QueueError>;

    /// Delete audit entries recorded before `cutoff`. Returns the number deleted.
    fn prune_audit_log(&self, cutoff: i64) -> Result<usize, QueueError>;
}

/// SQLite-backed job store.
///
/// All writers go through one connection behind a mutex, so claim calls are
/// serialized in-process; the conditional updates inside `claim` keep the
/// operation correct across processes sharing the database file as well.
pub struct SqliteJobStore {
    conn: Arc<Mutex<Connection>>,
}

/// Claim eligibility, shared between the candidate query and the per-row
/// conditional update. `now_param` is the placeholder holding the current
/// timestamp, which differs between the two statements.
fn eligibility_sql(now_param: &str) -> String {
    format!(
        "(status = 'queued' \
         OR (status = 'in_progress' AND {now} > locked_at + timeout) \
         OR (status = 'failed_retrying' AND attempts < max_attempts))",
        now = now_param
    )
}

impl SqliteJobStore {
    /// Create a new SqliteJobStore.
    ///
    /// Opens an existing database or creates a new one with the current schema.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = if db_path.as_ref().exists() {
            Connection::open_with_flags(
                &db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        } else {
            let conn = Connection::open(&db_path)?;
            conn.execute("PRAGMA foreign_keys = ON;", [])?;
            JOB_QUEUE_VERSIONED_SCHEMAS
                .last()
                .context("No schemas defined")?
                .create(&conn)?;
            info!("Created new job queue database at {:?}", db_path.as_ref());
            conn
        };

        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        // Read the database version
        let db_version = conn
            .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
            .context("Failed to read database version")?
            - BASE_DB_VERSION as i64;

        if db_version < 0 {
            bail!(
                "Job queue database version {} is too old, does not contain base db version {}",
                db_version,
                BASE_DB_VERSION
            );
        }
        let version = db_version as usize;

        let schema_count = JOB_QUEUE_VERSIONED_SCHEMAS.len();
        if version >= schema_count {
            bail!(
                "Job queue database version {} is too new (max supported: {})",
                version,
                schema_count - 1
            );
        }

        // Validate schema matches expected structure
        JOB_QUEUE_VERSIONED_SCHEMAS
            .get(version)
            .context("Failed to get schema")?
            .validate(&conn)?;

        // Run migrations if needed
        Self::migrate_if_needed(&conn, version)?;

        Ok(SqliteJobStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store for testing.
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        JOB_QUEUE_VERSIONED_SCHEMAS
            .last()
            .context("No schemas defined")?
            .create(&conn)?;

        Ok(SqliteJobStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run any pending migrations.
    fn migrate_if_needed(conn: &Connection, current_version: usize) -> Result<()> {
        let target_version = JOB_QUEUE_VERSIONED_SCHEMAS.len() - 1;

        if current_version >= target_version {
            return Ok(());
        }

        info!(
            "Migrating job queue database from version {} to {}",
            current_version, target_version
        );

        for schema in JOB_QUEUE_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!("Running job queue migration to version {}", schema.version);
                migration_fn(conn)?;
            }
        }

        // Update version
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + target_version),
            [],
        )?;

        Ok(())
    }

    /// Helper to convert a database row to a Job.
    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        Ok(Job {
            id: row.get("id")?,
            tag: row.get("tag")?,
            status: JobStatus::from_str(&row.get::<_, String>("status")?)
                .unwrap_or(JobStatus::Queued),
            priority: JobPriority::from_i32(row.get("priority")?).unwrap_or(DEFAULT_PRIORITY),
            timeout: row.get("timeout")?,
            attempts: row.get("attempts")?,
            max_attempts: row.get("max_attempts")?,
            worker_id: row.get("worker_id")?,
            result: row
                .get::<_, Option<String>>("result")?
                .and_then(|s| serde_json::from_str(&s).ok()),
            fail_reason: row.get("fail_reason")?,
            fail_message: row.get("fail_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            locked_at: row.get("locked_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            failed_at: row.get("failed_at")?,
        })
    }

    /// Helper to convert a database row to an AuditLogEntry.
    fn row_to_audit_entry(row: &rusqlite::Row) -> rusqlite::Result<AuditLogEntry> {
        Ok(AuditLogEntry {
            id: row.get("id")?,
            event_type: AuditEventType::from_str(&row.get::<_, String>("event_type")?)
                .unwrap_or(AuditEventType::JobEnqueued),
            job_id: row.get("job_id")?,
            worker_id: row.get("worker_id")?,
            details: row
                .get::<_, Option<String>>("details")?
                .and_then(|s| serde_json::from_str(&s).ok()),
            created_at: row.get("created_at")?,
        })
    }

    /// Fetch a job that must exist (post-mutation reads).
    fn fetch_job(conn: &Connection, id: i64) -> Result<Job, QueueError> {
        conn.query_row("SELECT * FROM jobs WHERE id = ?1", [id], Self::row_to_job)
            .optional()?
            .ok_or(QueueError::NotFound(id))
    }

    /// Explain why a transition's conditional update matched nothing.
    fn classify_transition_conflict(
        conn: &Connection,
        job_id: i64,
        worker_id: &str,
        op: &str,
    ) -> QueueError {
        let current = conn
            .query_row(
                "SELECT status, worker_id FROM jobs WHERE id = ?1",
                [job_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                    ))
                },
            )
            .optional();

        match current {
            Err(e) => e.into(),
            Ok(None) => QueueError::NotFound(job_id),
            Ok(Some((status, holder))) => {
                if status != JobStatus::InProgress.as_str() {
                    QueueError::conflict(format!("job {} is {}, cannot {}", job_id, status, op))
                } else if holder.as_deref() != Some(worker_id) {
                    QueueError::conflict(format!(
                        "job {} is not leased by worker '{}', cannot {}",
                        job_id, worker_id, op
                    ))
                } else {
                    QueueError::conflict(format!("job {} cannot {}", job_id, op))
                }
            }
        }
    }

    /// Get current timestamp in seconds.
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }
}

impl JobStore for SqliteJobStore {
    // === Job Management ===

    fn enqueue(&self, new_job: NewJob) -> Result<Job, QueueError> {
        let conn = self.conn.lock().unwrap();
        let now = Self::now();
        conn.execute(
            r#"INSERT INTO jobs (
                tag, status, priority, timeout, attempts, max_attempts, created_at, updated_at
            ) VALUES (?1, 'queued', ?2, ?3, 0, ?4, ?5, ?5)"#,
            params![
                new_job.tag,
                new_job.priority.as_i32(),
                new_job.timeout,
                new_job.max_attempts,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        Self::fetch_job(&conn, id)
    }

    fn get_job(&self, id: i64) -> Result<Option<Job>, QueueError> {
        let conn = self.conn.lock().unwrap();
        let job = conn
            .query_row("SELECT * FROM jobs WHERE id = ?1", [id], Self::row_to_job)
            .optional()?;
        Ok(job)
    }

    fn list_jobs(&self, filter: &JobFilter) -> Result<(Vec<Job>, usize), QueueError> {
        let conn = self.conn.lock().unwrap();

        let mut clauses: Vec<String> = Vec::new();
        let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(status) = filter.status {
            query_params.push(Box::new(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", query_params.len()));
        }
        if let Some(tag) = &filter.tag {
            query_params.push(Box::new(tag.clone()));
            clauses.push(format!("tag = ?{}", query_params.len()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM jobs{}", where_sql),
            params_refs.as_slice(),
            |row| row.get(0),
        )?;

        query_params.push(Box::new(filter.limit as i64));
        query_params.push(Box::new(filter.offset as i64));
        let sql = format!(
            "SELECT * FROM jobs{} ORDER BY id DESC LIMIT ?{} OFFSET ?{}",
            where_sql,
            query_params.len() - 1,
            query_params.len()
        );

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();
        let jobs = stmt
            .query_map(params_refs.as_slice(), Self::row_to_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((jobs, total as usize))
    }

    // === Claim Engine ===

    fn claim(&self, tags: &[String], worker_id: &str, limit: usize) -> Result<Vec<Job>, QueueError> {
        let mut conn = self.conn.lock().unwrap();
        let now = Self::now();
        let tx = conn.transaction()?;

        // Candidate rows in scheduling order. Tags are an IN list, so the
        // statement is built with positional placeholders: tags first, then
        // the timestamp, then the limit.
        let tag_placeholders = (1..=tags.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let select_sql = format!(
            "SELECT id FROM jobs WHERE tag IN ({tags}) AND {eligible} \
             ORDER BY priority ASC, id ASC LIMIT ?{limit_param}",
            tags = tag_placeholders,
            eligible = eligibility_sql(&format!("?{}", tags.len() + 1)),
            limit_param = tags.len() + 2,
        );

        let mut select_params: Vec<Box<dyn rusqlite::ToSql>> = tags
            .iter()
            .map(|tag| Box::new(tag.clone()) as Box<dyn rusqlite::ToSql>)
            .collect();
        select_params.push(Box::new(now));
        select_params.push(Box::new(limit as i64));

        let candidate_ids: Vec<i64> = {
            let mut stmt = tx.prepare(&select_sql)?;
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                select_params.iter().map(|p| p.as_ref()).collect();
            let ids = stmt
                .query_map(params_refs.as_slice(), |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };

        // Claim each candidate with a conditional update that re-checks
        // eligibility. A row that matches nothing was taken by another
        // claimant (or changed state) between select and update; skip it.
        // Column references on the right-hand side of SET read the old row,
        // so a reclaim of an expired lease keeps its attempt count and the
        // original started_at. A claim that starts a new attempt also wipes
        // the previous attempt's failure fields; the audit trail retains
        // that history.
        let mut claimed = Vec::with_capacity(candidate_ids.len());
        {
            let update_sql = format!(
                "UPDATE jobs SET \
                   status = 'in_progress', \
                   worker_id = ?1, \
                   locked_at = ?2, \
                   started_at = COALESCE(started_at, ?2), \
                   attempts = CASE WHEN status = 'in_progress' THEN attempts ELSE attempts + 1 END, \
                   failed_at = CASE WHEN status = 'in_progress' THEN failed_at ELSE NULL END, \
                   fail_reason = CASE WHEN status = 'in_progress' THEN fail_reason ELSE NULL END, \
                   fail_message = CASE WHEN status = 'in_progress' THEN fail_message ELSE NULL END, \
                   updated_at = ?2 \
                 WHERE id = ?3 AND {eligible}",
                eligible = eligibility_sql("?2"),
            );
            let mut update_stmt = tx.prepare(&update_sql)?;
            let mut fetch_stmt = tx.prepare("SELECT * FROM jobs WHERE id = ?1")?;

            for id in candidate_ids {
                let changed = update_stmt.execute(params![worker_id, now, id])?;
                if changed == 1 {
                    let job = fetch_stmt.query_row([id], Self::row_to_job)?;
                    claimed.push(job);
                }
            }
        }

        tx.commit()?;
        Ok(claimed)
    }

    // === Lifecycle Transitions ===

    fn release(&self, job_id: i64, worker_id: &str) -> Result<Job, QueueError> {
        let mut conn = self.conn.lock().unwrap();
        let now = Self::now();
        let tx = conn.transaction()?;

        let changed = tx.execute(
            r#"UPDATE jobs SET status = 'queued', worker_id = NULL, locked_at = NULL, updated_at = ?1
               WHERE id = ?2 AND status = 'in_progress' AND worker_id = ?3"#,
            params![now, job_id, worker_id],
        )?;
        if changed == 0 {
            return Err(Self::classify_transition_conflict(
                &tx, job_id, worker_id, "release",
            ));
        }

        let job = Self::fetch_job(&tx, job_id)?;
        tx.commit()?;
        Ok(job)
    }

    fn complete(
        &self,
        job_id: i64,
        worker_id: &str,
        result: Option<serde_json::Value>,
    ) -> Result<Job, QueueError> {
        let mut conn = self.conn.lock().unwrap();
        let now = Self::now();
        let tx = conn.transaction()?;

        // The failed_at check keeps completed_at and failed_at mutually
        // exclusive. It cannot match in practice: claiming a previously
        // failed job starts a new attempt, which clears failed_at.
        let changed = tx.execute(
            r#"UPDATE jobs SET status = 'completed', completed_at = ?1, result = ?2,
                               locked_at = NULL, updated_at = ?1
               WHERE id = ?3 AND status = 'in_progress' AND worker_id = ?4
                 AND failed_at IS NULL"#,
            params![
                now,
                result.as_ref().map(|r| r.to_string()),
                job_id,
                worker_id
            ],
        )?;
        if changed == 0 {
            return Err(Self::classify_transition_conflict(
                &tx, job_id, worker_id, "complete",
            ));
        }

        let job = Self::fetch_job(&tx, job_id)?;
        tx.commit()?;
        Ok(job)
    }

    fn fail(
        &self,
        job_id: i64,
        worker_id: &str,
        reason: &str,
        message: &str,
    ) -> Result<Job, QueueError> {
        let mut conn = self.conn.lock().unwrap();
        let now = Self::now();
        let tx = conn.transaction()?;

        // The resulting status depends on the attempt count, so read it
        // first; the connection mutex keeps the read-then-update atomic.
        let counts = tx
            .query_row(
                "SELECT attempts, max_attempts FROM jobs \
                 WHERE id = ?1 AND status = 'in_progress' AND worker_id = ?2",
                params![job_id, worker_id],
                |row| Ok((row.get::<_, i32>(0)?, row.get::<_, i32>(1)?)),
            )
            .optional()?;

        let (attempts, max_attempts) = match counts {
            Some(counts) => counts,
            None => {
                return Err(Self::classify_transition_conflict(
                    &tx, job_id, worker_id, "fail",
                ))
            }
        };

        let new_status = if attempts >= max_attempts {
            JobStatus::Failed
        } else {
            JobStatus::FailedRetrying
        };

        tx.execute(
            r#"UPDATE jobs SET status = ?1, failed_at = ?2, fail_reason = ?3, fail_message = ?4,
                               locked_at = NULL, updated_at = ?2
               WHERE id = ?5"#,
            params![new_status.as_str(), now, reason, message, job_id],
        )?;

        let job = Self::fetch_job(&tx, job_id)?;
        tx.commit()?;
        Ok(job)
    }

    // === Statistics ===

    fn queue_stats(&self) -> Result<QueueStats, QueueError> {
        let conn = self.conn.lock().unwrap();

        let mut stats = QueueStats::default();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            stats.total_jobs += count;
            match JobStatus::from_str(&status) {
                Some(JobStatus::Queued) => stats.queued = count,
                Some(JobStatus::InProgress) => stats.in_progress = count,
                Some(JobStatus::FailedRetrying) => stats.failed_retrying = count,
                Some(JobStatus::Dequeued) => stats.dequeued = count,
                Some(JobStatus::Failed) => stats.failed = count,
                Some(JobStatus::Completed) => stats.completed = count,
                None => {}
            }
        }

        Ok(stats)
    }

    // === Audit Logging ===

    fn log_audit_event(&self, entry: AuditLogEntry) -> Result<(), QueueError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"INSERT INTO job_audit_log (event_type, job_id, worker_id, details, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                entry.event_type.as_str(),
                entry.job_id,
                entry.worker_id,
                entry.details.as_ref().map(|d| d.to_string()),
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    fn get_audit_log(
        &self,
        filter: &AuditLogFilter,
    ) -> Result<(Vec<AuditLogEntry>, usize), QueueError> {
        let conn = self.conn.lock().unwrap();

        let mut clauses: Vec<String> = Vec::new();
        let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(job_id) = filter.job_id {
            query_params.push(Box::new(job_id));
            clauses.push(format!("job_id = ?{}", query_params.len()));
        }
        if let Some(event_type) = filter.event_type {
            query_params.push(Box::new(event_type.as_str().to_string()));
            clauses.push(format!("event_type = ?{}", query_params.len()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM job_audit_log{}", where_sql),
            params_refs.as_slice(),
            |row| row.get(0),
        )?;

        query_params.push(Box::new(filter.limit as i64));
        query_params.push(Box::new(filter.offset as i64));
        let sql = format!(
            "SELECT * FROM job_audit_log{} ORDER BY id DESC LIMIT ?{} OFFSET ?{}",
            where_sql,
            query_params.len() - 1,
            query_params.len()
        );

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();
        let entries = stmt
            .query_map(params_refs.as_slice(), Self::row_to_audit_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((entries, total as usize))
    }

    fn get_job_audit_log(&self, job_id: i64) -> Result<Vec<AuditLogEntry>, QueueError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM job_audit_log WHERE job_id = ?1 ORDER BY id ASC")?;
        let entries = stmt
            .query_map([job_id], Self::row_to_audit_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn prune_audit_log(&self, cutoff: i64) -> Result<usize, QueueError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM job_audit_log WHERE created_at < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }
}
