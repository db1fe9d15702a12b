//! Main queue orchestration.
//!
//! Validates operation inputs, delegates state changes to the job store, and
//! records audit events and metrics along the way. Both the HTTP surface and
//! the admin CLI go through this layer.

use std::sync::Arc;

use tracing::{info, warn};

use crate::server::metrics;

use super::audit_logger::AuditLogger;
use super::error::QueueError;
use super::models::*;
use super::store::JobStore;

/// Orchestrates all queue operations against the job store.
///
/// The store enforces the state machine; this layer enforces input shape, so
/// malformed requests are rejected before they reach a transaction. Audit
/// writes happen after the store call succeeds and never fail the operation.
pub struct QueueManager {
    /// Job store holding queue state.
    store: Arc<dyn JobStore>,
    /// Audit logger for tracking operations.
    audit_logger: AuditLogger,
}

impl QueueManager {
    /// Create a new QueueManager.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        let audit_logger = AuditLogger::new(store.clone());

        Self {
            store,
            audit_logger,
        }
    }

    // =========================================================================
    // Producer Methods
    // =========================================================================

    /// Enqueue a new job.
    ///
    /// `priority`, `timeout`, and `max_attempts` fall back to the queue
    /// defaults when not given. These parameters are fixed for the lifetime
    /// of the job.
    pub fn enqueue_job(
        &self,
        tag: &str,
        priority: Option<i32>,
        timeout: Option<i64>,
        max_attempts: Option<i32>,
    ) -> Result<Job, QueueError> {
        if !is_valid_tag(tag) {
            return Err(QueueError::validation(format!(
                "tag must be 1-{} characters of lowercase letters, digits, dashes, and underscores",
                MAX_TAG_LENGTH
            )));
        }

        let priority = match priority {
            Some(value) => JobPriority::from_i32(value).ok_or_else(|| {
                QueueError::validation(format!("priority must be between 1 and 4, got {}", value))
            })?,
            None => DEFAULT_PRIORITY,
        };

        if let Some(timeout) = timeout {
            if !(1..=MAX_TIMEOUT_SECS).contains(&timeout) {
                return Err(QueueError::validation(format!(
                    "timeout must be between 1 and {} seconds",
                    MAX_TIMEOUT_SECS
                )));
            }
        }

        if let Some(max_attempts) = max_attempts {
            if max_attempts < 1 {
                return Err(QueueError::validation("max_attempts must be at least 1"));
            }
        }

        let new_job = NewJob {
            tag: tag.to_string(),
            priority,
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
            max_attempts: max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        };

        let job = self.store.enqueue(new_job)?;

        if let Err(e) = self.audit_logger.log_job_enqueued(&job) {
            warn!("Failed to write audit entry for enqueued job {}: {}", job.id, e);
        }
        metrics::record_job_enqueued(&job.tag);

        info!(
            "Enqueued job {} (tag: {}, priority: {})",
            job.id,
            job.tag,
            job.priority.as_i32()
        );

        Ok(job)
    }

    // =========================================================================
    // Worker Methods
    // =========================================================================

    /// Claim up to `limit` jobs of the given tags for a worker.
    ///
    /// Returns the claimed jobs in scheduling order; an empty vec means
    /// nothing is currently eligible.
    pub fn claim_jobs(
        &self,
        tags: &[String],
        worker_id: &str,
        limit: usize,
    ) -> Result<Vec<Job>, QueueError> {
        Self::validate_worker_id(worker_id)?;

        if tags.is_empty() {
            return Err(QueueError::validation("at least one tag is required"));
        }
        for tag in tags {
            if !is_valid_tag(tag) {
                return Err(QueueError::validation(format!("invalid tag: '{}'", tag)));
            }
        }

        if limit < 1 || limit > MAX_CLAIM_LIMIT {
            return Err(QueueError::validation(format!(
                "limit must be between 1 and {}",
                MAX_CLAIM_LIMIT
            )));
        }

        let jobs = self.store.claim(tags, worker_id, limit)?;

        for job in &jobs {
            if let Err(e) = self.audit_logger.log_job_claimed(job) {
                warn!("Failed to write audit entry for claimed job {}: {}", job.id, e);
            }
            metrics::record_job_claimed(&job.tag);
        }

        if jobs.is_empty() {
            metrics::record_empty_claim();
        } else {
            metrics::record_claim_batch_size(jobs.len());
            info!(
                "Worker {} claimed {} job(s): {:?}",
                worker_id,
                jobs.len(),
                jobs.iter().map(|j| j.id).collect::<Vec<_>>()
            );
        }

        Ok(jobs)
    }

    /// Hand a leased job back to the queue without finishing it.
    pub fn release_job(&self, job_id: i64, worker_id: &str) -> Result<Job, QueueError> {
        Self::validate_worker_id(worker_id)?;

        let job = self.store.release(job_id, worker_id)?;

        if let Err(e) = self.audit_logger.log_job_released(&job, worker_id) {
            warn!("Failed to write audit entry for released job {}: {}", job.id, e);
        }
        metrics::record_job_released(&job.tag);

        info!("Worker {} released job {}", worker_id, job_id);

        Ok(job)
    }

    /// Mark a leased job as successfully completed.
    pub fn complete_job(
        &self,
        job_id: i64,
        worker_id: &str,
        result: Option<serde_json::Value>,
    ) -> Result<Job, QueueError> {
        Self::validate_worker_id(worker_id)?;

        let job = self.store.complete(job_id, worker_id, result)?;

        if let Err(e) = self.audit_logger.log_job_completed(&job, worker_id) {
            warn!("Failed to write audit entry for completed job {}: {}", job.id, e);
        }
        metrics::record_job_completed(&job.tag);

        info!(
            "Worker {} completed job {} after {} attempt(s)",
            worker_id, job_id, job.attempts
        );

        Ok(job)
    }

    /// Record a failure on a leased job.
    ///
    /// The job stays retryable until its attempts reach `max_attempts`, at
    /// which point the failure is terminal.
    pub fn fail_job(
        &self,
        job_id: i64,
        worker_id: &str,
        reason: &str,
        message: &str,
    ) -> Result<Job, QueueError> {
        Self::validate_worker_id(worker_id)?;

        if reason.is_empty() || reason.chars().count() > MAX_FAIL_REASON_LENGTH {
            return Err(QueueError::validation(format!(
                "reason must be 1-{} characters",
                MAX_FAIL_REASON_LENGTH
            )));
        }
        if message.chars().count() > MAX_FAIL_MESSAGE_LENGTH {
            return Err(QueueError::validation(format!(
                "message must be at most {} characters",
                MAX_FAIL_MESSAGE_LENGTH
            )));
        }

        let job = self.store.fail(job_id, worker_id, reason, message)?;

        if let Err(e) = self.audit_logger.log_job_failed(&job, worker_id) {
            warn!("Failed to write audit entry for failed job {}: {}", job.id, e);
        }
        metrics::record_job_failed(&job.tag, job.is_terminal());

        if job.is_terminal() {
            warn!(
                "Job {} failed permanently after {} attempt(s): {}",
                job_id, job.attempts, reason
            );
        } else {
            info!(
                "Job {} failed (attempt {}/{}), eligible for retry: {}",
                job_id, job.attempts, job.max_attempts, reason
            );
        }

        Ok(job)
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Get a job by id.
    pub fn get_job(&self, job_id: i64) -> Result<Job, QueueError> {
        self.store
            .get_job(job_id)?
            .ok_or(QueueError::NotFound(job_id))
    }

    /// List jobs matching the filter. Returns (jobs, total_count).
    pub fn list_jobs(&self, filter: &JobFilter) -> Result<(Vec<Job>, usize), QueueError> {
        self.store.list_jobs(filter)
    }

    /// Get overall queue statistics.
    pub fn queue_stats(&self) -> Result<QueueStats, QueueError> {
        self.store.queue_stats()
    }

    // =========================================================================
    // Audit Methods
    // =========================================================================

    /// Get audit entries with filtering. Returns (entries, total_count).
    pub fn get_audit_log(
        &self,
        filter: &AuditLogFilter,
    ) -> Result<(Vec<AuditLogEntry>, usize), QueueError> {
        self.store.get_audit_log(filter)
    }

    /// Get the full audit trail for one job, oldest first.
    pub fn get_job_audit_log(&self, job_id: i64) -> Result<Vec<AuditLogEntry>, QueueError> {
        if self.store.get_job(job_id)?.is_none() {
            return Err(QueueError::NotFound(job_id));
        }
        self.store.get_job_audit_log(job_id)
    }

    /// Delete audit entries recorded before `cutoff`. Returns the number deleted.
    pub fn prune_audit_log(&self, cutoff: i64) -> Result<usize, QueueError> {
        self.store.prune_audit_log(cutoff)
    }

    fn validate_worker_id(worker_id: &str) -> Result<(), QueueError> {
        if worker_id.is_empty() || worker_id.chars().count() > MAX_WORKER_ID_LENGTH {
            return Err(QueueError::validation(format!(
                "worker_id must be 1-{} characters",
                MAX_WORKER_ID_LENGTH
            )));
        }
        Ok(())
    }
}
