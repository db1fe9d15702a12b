//! Audit logging for queue operations.
//!
//! Provides a higher-level interface for logging job lifecycle events,
//! building on the job store's raw audit log functionality.

use std::sync::Arc;

use super::error::QueueError;
use super::models::{AuditEventType, AuditLogEntry, Job};
use super::store::JobStore;

/// Helper for logging audit events during queue operations.
///
/// Provides convenient methods that automatically populate audit entries
/// from job rows and transition context.
pub struct AuditLogger {
    store: Arc<dyn JobStore>,
}

impl AuditLogger {
    /// Create a new AuditLogger with the given job store.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Log a job being enqueued.
    ///
    /// Records the scheduling parameters the job was created with.
    pub fn log_job_enqueued(&self, job: &Job) -> Result<(), QueueError> {
        let entry = AuditLogEntry::new(AuditEventType::JobEnqueued)
            .with_job(job.id)
            .with_details(serde_json::json!({
                "tag": job.tag,
                "priority": job.priority.as_i32(),
                "timeout": job.timeout,
                "max_attempts": job.max_attempts,
            }));

        self.store.log_audit_event(entry)
    }

    /// Log a job being claimed by a worker.
    ///
    /// Covers both fresh claims and reclaims of expired leases; the attempt
    /// count in the details tells the two apart when read next to earlier
    /// entries for the same job.
    pub fn log_job_claimed(&self, job: &Job) -> Result<(), QueueError> {
        let entry = AuditLogEntry::new(AuditEventType::JobClaimed)
            .with_job(job.id)
            .with_details(serde_json::json!({
                "tag": job.tag,
                "attempts": job.attempts,
                "lease_expires_at": job.lease_expires_at(),
            }));

        let entry = if let Some(worker_id) = &job.worker_id {
            entry.with_worker(worker_id)
        } else {
            entry
        };

        self.store.log_audit_event(entry)
    }

    /// Log a worker handing a job back without finishing it.
    pub fn log_job_released(&self, job: &Job, worker_id: &str) -> Result<(), QueueError> {
        let entry = AuditLogEntry::new(AuditEventType::JobReleased)
            .with_job(job.id)
            .with_worker(worker_id)
            .with_details(serde_json::json!({
                "tag": job.tag,
                "attempts": job.attempts,
            }));

        self.store.log_audit_event(entry)
    }

    /// Log a job completing successfully.
    pub fn log_job_completed(&self, job: &Job, worker_id: &str) -> Result<(), QueueError> {
        let entry = AuditLogEntry::new(AuditEventType::JobCompleted)
            .with_job(job.id)
            .with_worker(worker_id)
            .with_details(serde_json::json!({
                "tag": job.tag,
                "attempts": job.attempts,
                "has_result": job.result.is_some(),
            }));

        self.store.log_audit_event(entry)
    }

    /// Log a failure report, terminal or retryable.
    pub fn log_job_failed(&self, job: &Job, worker_id: &str) -> Result<(), QueueError> {
        let entry = AuditLogEntry::new(AuditEventType::JobFailed)
            .with_job(job.id)
            .with_worker(worker_id)
            .with_details(serde_json::json!({
                "tag": job.tag,
                "attempts": job.attempts,
                "max_attempts": job.max_attempts,
                "fail_reason": job.fail_reason,
                "fail_message": job.fail_message,
                "terminal": job.is_terminal(),
            }));

        self.store.log_audit_event(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{JobPriority, NewJob, SqliteJobStore};
    use std::sync::Arc;

    fn create_test_store() -> Arc<SqliteJobStore> {
        Arc::new(SqliteJobStore::in_memory().unwrap())
    }

    fn enqueue_job(store: &Arc<SqliteJobStore>) -> Job {
        store
            .enqueue(
                NewJob::new("report-export".to_string())
                    .with_priority(JobPriority::High)
                    .with_max_attempts(3),
            )
            .unwrap()
    }

    fn claim_job(store: &Arc<SqliteJobStore>, worker_id: &str) -> Job {
        store
            .claim(&["report-export".to_string()], worker_id, 1)
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_log_job_enqueued() {
        let store = create_test_store();
        let logger = AuditLogger::new(store.clone());
        let job = enqueue_job(&store);

        logger.log_job_enqueued(&job).unwrap();

        let entries = store.get_job_audit_log(job.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, AuditEventType::JobEnqueued);
        assert_eq!(entries[0].job_id, Some(job.id));
        assert!(entries[0].worker_id.is_none());

        let details = entries[0].details.as_ref().unwrap();
        assert_eq!(details["tag"], "report-export");
        assert_eq!(details["priority"], 2);
        assert_eq!(details["timeout"], 600);
        assert_eq!(details["max_attempts"], 3);
    }

    #[test]
    fn test_log_job_claimed() {
        let store = create_test_store();
        let logger = AuditLogger::new(store.clone());
        enqueue_job(&store);
        let job = claim_job(&store, "worker-1");

        logger.log_job_claimed(&job).unwrap();

        let entries = store.get_job_audit_log(job.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, AuditEventType::JobClaimed);
        assert_eq!(entries[0].worker_id, Some("worker-1".to_string()));

        let details = entries[0].details.as_ref().unwrap();
        assert_eq!(details["attempts"], 1);
        assert_eq!(
            details["lease_expires_at"],
            serde_json::json!(job.locked_at.unwrap() + job.timeout)
        );
    }

    #[test]
    fn test_log_job_released() {
        let store = create_test_store();
        let logger = AuditLogger::new(store.clone());
        let enqueued = enqueue_job(&store);
        claim_job(&store, "worker-1");
        let released = store.release(enqueued.id, "worker-1").unwrap();

        logger.log_job_released(&released, "worker-1").unwrap();

        let entries = store.get_job_audit_log(released.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, AuditEventType::JobReleased);
        // The released row no longer names the worker, the entry still does
        assert_eq!(entries[0].worker_id, Some("worker-1".to_string()));
    }

    #[test]
    fn test_log_job_completed() {
        let store = create_test_store();
        let logger = AuditLogger::new(store.clone());
        let enqueued = enqueue_job(&store);
        claim_job(&store, "worker-1");
        let completed = store
            .complete(
                enqueued.id,
                "worker-1",
                Some(serde_json::json!({"matches": 3})),
            )
            .unwrap();

        logger.log_job_completed(&completed, "worker-1").unwrap();

        let entries = store.get_job_audit_log(completed.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, AuditEventType::JobCompleted);

        let details = entries[0].details.as_ref().unwrap();
        assert_eq!(details["attempts"], 1);
        assert_eq!(details["has_result"], true);
    }

    #[test]
    fn test_log_job_failed_retryable() {
        let store = create_test_store();
        let logger = AuditLogger::new(store.clone());
        let enqueued = enqueue_job(&store);
        claim_job(&store, "worker-1");
        let failed = store
            .fail(enqueued.id, "worker-1", "timeout", "model did not respond")
            .unwrap();

        logger.log_job_failed(&failed, "worker-1").unwrap();

        let entries = store.get_job_audit_log(failed.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, AuditEventType::JobFailed);

        let details = entries[0].details.as_ref().unwrap();
        assert_eq!(details["fail_reason"], "timeout");
        assert_eq!(details["fail_message"], "model did not respond");
        assert_eq!(details["terminal"], false);
    }

    #[test]
    fn test_log_job_failed_terminal() {
        let store = create_test_store();
        let logger = AuditLogger::new(store.clone());
        let job = store
            .enqueue(NewJob::new("report-export".to_string()))
            .unwrap();
        claim_job(&store, "worker-1");
        let failed = store
            .fail(job.id, "worker-1", "bad_input", "empty query")
            .unwrap();

        logger.log_job_failed(&failed, "worker-1").unwrap();

        let entries = store.get_job_audit_log(failed.id).unwrap();
        let details = entries[0].details.as_ref().unwrap();
        assert_eq!(details["terminal"], true);
        assert_eq!(details["max_attempts"], 1);
    }

    #[test]
    fn test_multiple_events_for_same_job() {
        let store = create_test_store();
        let logger = AuditLogger::new(store.clone());
        let enqueued = enqueue_job(&store);

        logger.log_job_enqueued(&enqueued).unwrap();
        let claimed = claim_job(&store, "worker-1");
        logger.log_job_claimed(&claimed).unwrap();
        let completed = store.complete(enqueued.id, "worker-1", None).unwrap();
        logger.log_job_completed(&completed, "worker-1").unwrap();

        let entries = store.get_job_audit_log(enqueued.id).unwrap();
        assert_eq!(entries.len(), 3);

        // Verify event order (oldest first - ASC order)
        assert_eq!(entries[0].event_type, AuditEventType::JobEnqueued);
        assert_eq!(entries[1].event_type, AuditEventType::JobClaimed);
        assert_eq!(entries[2].event_type, AuditEventType::JobCompleted);
    }
}
