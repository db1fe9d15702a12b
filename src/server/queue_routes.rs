//! Job queue HTTP routes.
//!
//! Provides endpoints for:
//! - Producers enqueueing jobs
//! - Workers claiming jobs and reporting outcomes
//! - Operators inspecting jobs, statistics, and the audit trail

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::Query as MultiQuery;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::queue::{
    AuditEventType, AuditLogEntry, AuditLogFilter, Job, JobFilter, JobStatus, QueueError,
    DEFAULT_CLAIM_LIMIT,
};
use crate::server::state::{GuardedQueueManager, ServerState};

/// Cap for list endpoints, so one request cannot page the whole table.
const MAX_LIST_LIMIT: usize = 500;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct EnqueueJobBody {
    pub tag: String,
    pub priority: Option<i32>,
    pub timeout: Option<i64>,
    pub max_attempts: Option<i32>,
}

/// Query for the claim endpoint. `tag` repeats: `?tag=resize&tag=ocr`.
#[derive(Debug, Deserialize)]
pub struct ClaimQuery {
    #[serde(default)]
    pub tag: Vec<String>,
    pub worker_id: Option<String>,
    #[serde(default = "default_claim_limit")]
    pub limit: usize,
}

fn default_claim_limit() -> usize {
    DEFAULT_CLAIM_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct ReleaseJobBody {
    pub worker_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteJobBody {
    pub worker_id: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct FailJobBody {
    pub worker_id: Option<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    pub status: Option<String>,
    pub tag: Option<String>,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    pub job_id: Option<i64>,
    pub event_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub entries: Vec<AuditLogEntry>,
    pub total_count: usize,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Map a queue error onto an HTTP status with a plain-text body.
fn queue_error_response(err: QueueError) -> axum::response::Response {
    match &err {
        QueueError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        QueueError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()).into_response(),
        QueueError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()).into_response(),
        QueueError::Storage(_) => {
            warn!("Queue storage error: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Queue storage unavailable".to_string(),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Job Routes
// =============================================================================

/// POST / - Enqueue a new job
async fn enqueue_job(
    State(manager): State<GuardedQueueManager>,
    Json(body): Json<EnqueueJobBody>,
) -> impl IntoResponse {
    debug!("Enqueue request for tag '{}'", body.tag);

    match manager.enqueue_job(&body.tag, body.priority, body.timeout, body.max_attempts) {
        Ok(job) => (StatusCode::CREATED, Json(job)).into_response(),
        Err(e) => {
            debug!("Enqueue request failed: {}", e);
            queue_error_response(e)
        }
    }
}

/// GET / - List jobs with optional status/tag filters
async fn list_jobs(
    State(manager): State<GuardedQueueManager>,
    Query(query): Query<ListJobsQuery>,
) -> impl IntoResponse {
    let status = match &query.status {
        Some(s) => match JobStatus::from_str(s) {
            Some(status) => Some(status),
            None => {
                return (StatusCode::BAD_REQUEST, format!("unknown status: '{}'", s))
                    .into_response()
            }
        },
        None => None,
    };

    let filter = JobFilter {
        status,
        tag: query.tag,
        limit: query.limit.min(MAX_LIST_LIMIT),
        offset: query.offset,
    };

    match manager.list_jobs(&filter) {
        Ok((jobs, total)) => Json(JobListResponse {
            jobs,
            total_count: total,
        })
        .into_response(),
        Err(e) => queue_error_response(e),
    }
}

/// GET /queue - Claim jobs for a worker
async fn claim_jobs(
    State(manager): State<GuardedQueueManager>,
    MultiQuery(query): MultiQuery<ClaimQuery>,
) -> impl IntoResponse {
    let worker_id = query.worker_id.as_deref().unwrap_or("");

    match manager.claim_jobs(&query.tag, worker_id, query.limit) {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => {
            debug!("Claim request failed: {}", e);
            queue_error_response(e)
        }
    }
}

/// GET /{id} - Get a single job
async fn get_job(
    State(manager): State<GuardedQueueManager>,
    Path(job_id): Path<i64>,
) -> impl IntoResponse {
    match manager.get_job(job_id) {
        Ok(job) => Json(job).into_response(),
        Err(e) => queue_error_response(e),
    }
}

/// POST /{id}/release - Hand a leased job back to the queue
async fn release_job(
    State(manager): State<GuardedQueueManager>,
    Path(job_id): Path<i64>,
    Json(body): Json<ReleaseJobBody>,
) -> impl IntoResponse {
    let worker_id = body.worker_id.as_deref().unwrap_or("");

    match manager.release_job(job_id, worker_id) {
        Ok(job) => Json(job).into_response(),
        Err(e) => {
            debug!("Release of job {} failed: {}", job_id, e);
            queue_error_response(e)
        }
    }
}

/// POST /{id}/complete - Mark a leased job as completed
async fn complete_job(
    State(manager): State<GuardedQueueManager>,
    Path(job_id): Path<i64>,
    Json(body): Json<CompleteJobBody>,
) -> impl IntoResponse {
    let worker_id = body.worker_id.as_deref().unwrap_or("");

    match manager.complete_job(job_id, worker_id, body.result) {
        Ok(job) => Json(job).into_response(),
        Err(e) => {
            debug!("Completion of job {} failed: {}", job_id, e);
            queue_error_response(e)
        }
    }
}

/// POST /{id}/fail - Record a failure on a leased job
async fn fail_job(
    State(manager): State<GuardedQueueManager>,
    Path(job_id): Path<i64>,
    Json(body): Json<FailJobBody>,
) -> impl IntoResponse {
    let worker_id = body.worker_id.as_deref().unwrap_or("");
    let reason = body.reason.as_deref().unwrap_or("");
    let message = body.message.as_deref().unwrap_or("");

    match manager.fail_job(job_id, worker_id, reason, message) {
        Ok(job) => Json(job).into_response(),
        Err(e) => {
            debug!("Failure report for job {} rejected: {}", job_id, e);
            queue_error_response(e)
        }
    }
}

// =============================================================================
// Admin Routes
// =============================================================================

/// GET /admin/stats - Get queue statistics
async fn get_admin_stats(State(manager): State<GuardedQueueManager>) -> impl IntoResponse {
    match manager.queue_stats() {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => queue_error_response(e),
    }
}

/// GET /admin/audit - Query the audit trail
async fn get_audit_log(
    State(manager): State<GuardedQueueManager>,
    Query(query): Query<AuditLogQuery>,
) -> impl IntoResponse {
    let event_type = match &query.event_type {
        Some(s) => match AuditEventType::from_str(s) {
            Some(event_type) => Some(event_type),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    format!("unknown event_type: '{}'", s),
                )
                    .into_response()
            }
        },
        None => None,
    };

    let filter = AuditLogFilter {
        job_id: query.job_id,
        event_type,
        limit: query.limit.min(MAX_LIST_LIMIT),
        offset: query.offset,
    };

    match manager.get_audit_log(&filter) {
        Ok((entries, total)) => Json(AuditLogResponse {
            entries,
            total_count: total,
        })
        .into_response(),
        Err(e) => queue_error_response(e),
    }
}

/// GET /admin/audit/{id} - Get the audit trail for one job
async fn get_job_audit_log(
    State(manager): State<GuardedQueueManager>,
    Path(job_id): Path<i64>,
) -> impl IntoResponse {
    match manager.get_job_audit_log(job_id) {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => queue_error_response(e),
    }
}

// =============================================================================
// Router Construction
// =============================================================================

/// Build the job queue routes.
///
/// Job routes:
/// - POST /
/// - GET /
/// - GET /queue
/// - GET /{id}
/// - POST /{id}/release
/// - POST /{id}/complete
/// - POST /{id}/fail
///
/// Admin routes:
/// - GET /admin/stats
/// - GET /admin/audit
/// - GET /admin/audit/{id}
pub fn queue_routes() -> Router<ServerState> {
    let job_routes = Router::new()
        .route("/", post(enqueue_job).get(list_jobs))
        .route("/queue", get(claim_jobs))
        .route("/{id}", get(get_job))
        .route("/{id}/release", post(release_job))
        .route("/{id}/complete", post(complete_job))
        .route("/{id}/fail", post(fail_job));

    let admin_routes = Router::new()
        .route("/stats", get(get_admin_stats))
        .route("/audit", get(get_audit_log))
        .route("/audit/{id}", get(get_job_audit_log));

    job_routes.nest("/admin", admin_routes)
}
