//! Data models for the job queue.
//!
//! Defines jobs, statuses, priorities, audit log entries, and related types.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default scheduling priority for new jobs.
pub const DEFAULT_PRIORITY: JobPriority = JobPriority::Normal;
/// Default lease duration in seconds for new jobs.
pub const DEFAULT_TIMEOUT_SECS: i64 = 600;
/// Upper bound on a job's lease duration in seconds; keeps lease-expiry
/// arithmetic on epoch timestamps inside i64.
pub const MAX_TIMEOUT_SECS: i64 = i32::MAX as i64;
/// Default attempt ceiling for new jobs.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 1;

/// Default number of jobs handed out per claim call.
pub const DEFAULT_CLAIM_LIMIT: usize = 1;
/// Upper bound on jobs handed out per claim call, so a single worker
/// cannot starve the rest of the pool.
pub const MAX_CLAIM_LIMIT: usize = 10;

pub const MAX_TAG_LENGTH: usize = 255;
pub const MAX_WORKER_ID_LENGTH: usize = 255;
pub const MAX_FAIL_REASON_LENGTH: usize = 255;
pub const MAX_FAIL_MESSAGE_LENGTH: usize = 1000;

lazy_static! {
    static ref TAG_PATTERN: Regex = Regex::new(r"^[a-z0-9\-_]+$").unwrap();
}

/// Returns true if `tag` is a well-formed job tag: lowercase alphanumeric
/// characters, dashes, and underscores, at most [`MAX_TAG_LENGTH`] long.
pub fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty() && tag.len() <= MAX_TAG_LENGTH && TAG_PATTERN.is_match(tag)
}

/// Status of a job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    FailedRetrying,
    /// Present in the status taxonomy but produced by no transition.
    Dequeued,
    Failed,    // terminal
    Completed, // terminal
}

impl JobStatus {
    /// Returns true if this is a terminal state (Failed or Completed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::FailedRetrying => "failed_retrying",
            JobStatus::Dequeued => "dequeued",
            JobStatus::Failed => "failed",
            JobStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "in_progress" => Some(JobStatus::InProgress),
            "failed_retrying" => Some(JobStatus::FailedRetrying),
            "dequeued" => Some(JobStatus::Dequeued),
            "failed" => Some(JobStatus::Failed),
            "completed" => Some(JobStatus::Completed),
            _ => None,
        }
    }
}

/// Scheduling priority for jobs.
/// Lower values = higher priority; serialized as the numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum JobPriority {
    Critical = 1,
    High = 2,
    Normal = 3,
    Low = 4,
}

impl JobPriority {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(JobPriority::Critical),
            2 => Some(JobPriority::High),
            3 => Some(JobPriority::Normal),
            4 => Some(JobPriority::Low),
            _ => None,
        }
    }
}

impl From<JobPriority> for i32 {
    fn from(priority: JobPriority) -> i32 {
        priority.as_i32()
    }
}

impl TryFrom<i32> for JobPriority {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        JobPriority::from_i32(value).ok_or_else(|| format!("invalid priority: {}", value))
    }
}

/// A job row: one unit of schedulable work.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    /// Unique identifier, assigned by the store in insertion order
    pub id: i64,
    /// Job-type tag workers poll by; multiple logical queues share one table
    pub tag: String,
    /// Current status in the state machine
    pub status: JobStatus,
    /// Scheduling priority (lower value = higher priority)
    pub priority: JobPriority,
    /// Lease duration in seconds; an expired lease makes the job reclaimable
    pub timeout: i64,
    /// Number of claims that started a new attempt (lease reclaims excluded)
    pub attempts: i32,
    /// Attempt ceiling; failing at or beyond it terminalizes the job
    pub max_attempts: i32,
    /// Current or last claimant; set on claim, cleared on release
    pub worker_id: Option<String>,
    /// Worker-reported result payload, stored on completion
    pub result: Option<serde_json::Value>,
    /// Short failure diagnostic; cleared when a new attempt starts
    pub fail_reason: Option<String>,
    /// Long failure diagnostic
    pub fail_message: Option<String>,
    /// When the job was enqueued (Unix timestamp)
    pub created_at: i64,
    /// Last engine mutation (Unix timestamp)
    pub updated_at: i64,
    /// When the current lease was acquired; non-null exactly while in progress
    pub locked_at: Option<i64>,
    /// When the first claim happened; never overwritten by later claims
    pub started_at: Option<i64>,
    /// When the job completed
    pub completed_at: Option<i64>,
    /// When the job last failed; never set together with completed_at
    pub failed_at: Option<i64>,
}

impl Job {
    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// When the current lease stops being honored, if one is held.
    pub fn lease_expires_at(&self) -> Option<i64> {
        self.locked_at.map(|locked_at| locked_at + self.timeout)
    }
}

/// Parameters for enqueueing a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub tag: String,
    pub priority: JobPriority,
    pub timeout: i64,
    pub max_attempts: i32,
}

impl NewJob {
    /// Create enqueue parameters with default priority, timeout, and attempts.
    pub fn new(tag: String) -> Self {
        Self {
            tag,
            priority: DEFAULT_PRIORITY,
            timeout: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: i64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Filter for listing jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub tag: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Per-status job counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub total_jobs: i64,
    pub queued: i64,
    pub in_progress: i64,
    pub failed_retrying: i64,
    pub dequeued: i64,
    pub failed: i64,
    pub completed: i64,
}

/// Kind of event recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    JobEnqueued,
    JobClaimed,
    JobReleased,
    JobCompleted,
    JobFailed,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::JobEnqueued => "job_enqueued",
            AuditEventType::JobClaimed => "job_claimed",
            AuditEventType::JobReleased => "job_released",
            AuditEventType::JobCompleted => "job_completed",
            AuditEventType::JobFailed => "job_failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "job_enqueued" => Some(AuditEventType::JobEnqueued),
            "job_claimed" => Some(AuditEventType::JobClaimed),
            "job_released" => Some(AuditEventType::JobReleased),
            "job_completed" => Some(AuditEventType::JobCompleted),
            "job_failed" => Some(AuditEventType::JobFailed),
            _ => None,
        }
    }
}

/// One recorded queue event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
    /// Unique identifier, assigned by the store
    pub id: i64,
    /// What happened
    pub event_type: AuditEventType,
    /// The job the event concerns
    pub job_id: Option<i64>,
    /// The worker involved, when one was
    pub worker_id: Option<String>,
    /// Event-specific details
    pub details: Option<serde_json::Value>,
    /// When the event was recorded (Unix timestamp)
    pub created_at: i64,
}

impl AuditLogEntry {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            id: 0,
            event_type,
            job_id: None,
            worker_id: None,
            details: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_job(mut self, job_id: i64) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_worker(mut self, worker_id: &str) -> Self {
        self.worker_id = Some(worker_id.to_string());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Filter for querying the audit trail.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub job_id: Option<i64>,
    pub event_type: Option<AuditEventType>,
    pub limit: usize,
    pub offset: usize,
}
