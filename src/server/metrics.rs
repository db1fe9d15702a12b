use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};
use std::time::Duration;

use crate::queue::QueueStats;

/// Metric name prefix for all job queue metrics
const PREFIX: &str = "jobq";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Job Lifecycle Metrics
    pub static ref JOBS_ENQUEUED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_jobs_enqueued_total"), "Total jobs enqueued"),
        &["tag"]
    ).expect("Failed to create jobs_enqueued_total metric");

    pub static ref JOBS_CLAIMED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_jobs_claimed_total"), "Total job claims handed out"),
        &["tag"]
    ).expect("Failed to create jobs_claimed_total metric");

    pub static ref JOBS_RELEASED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_jobs_released_total"), "Total jobs released back to the queue"),
        &["tag"]
    ).expect("Failed to create jobs_released_total metric");

    pub static ref JOBS_COMPLETED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_jobs_completed_total"), "Total jobs completed"),
        &["tag"]
    ).expect("Failed to create jobs_completed_total metric");

    pub static ref JOBS_FAILED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_jobs_failed_total"), "Total job failures by terminality"),
        &["tag", "terminal"]
    ).expect("Failed to create jobs_failed_total metric");

    // Claim Behavior Metrics
    pub static ref CLAIM_BATCH_SIZE: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_claim_batch_size"),
            "Number of jobs handed out per non-empty claim"
        )
        .buckets(vec![1.0, 2.0, 3.0, 5.0, 10.0])
    ).expect("Failed to create claim_batch_size metric");

    pub static ref EMPTY_CLAIMS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_empty_claims_total"),
        "Claim calls that found nothing eligible"
    ).expect("Failed to create empty_claims_total metric");

    // Queue Depth Metrics
    pub static ref QUEUE_DEPTH: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_queue_depth"), "Jobs currently in each status"),
        &["status"]
    ).expect("Failed to create queue_depth metric");

    // Audit Trail Metrics
    pub static ref AUDIT_ENTRIES_PRUNED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_audit_entries_pruned_total"),
        "Audit entries deleted by retention pruning"
    ).expect("Failed to create audit_entries_pruned_total metric");

    // Process Metrics
    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(JOBS_ENQUEUED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOBS_CLAIMED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOBS_RELEASED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOBS_COMPLETED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOBS_FAILED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CLAIM_BATCH_SIZE.clone()));
    let _ = REGISTRY.register(Box::new(EMPTY_CLAIMS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(QUEUE_DEPTH.clone()));
    let _ = REGISTRY.register(Box::new(AUDIT_ENTRIES_PRUNED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Collapse numeric path segments so each route is one label value.
pub fn categorize_endpoint(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.parse::<i64>().is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Record a job being enqueued
pub fn record_job_enqueued(tag: &str) {
    JOBS_ENQUEUED_TOTAL.with_label_values(&[tag]).inc();
}

/// Record a claim being handed out
pub fn record_job_claimed(tag: &str) {
    JOBS_CLAIMED_TOTAL.with_label_values(&[tag]).inc();
}

/// Record a job being released back to the queue
pub fn record_job_released(tag: &str) {
    JOBS_RELEASED_TOTAL.with_label_values(&[tag]).inc();
}

/// Record a job completing
pub fn record_job_completed(tag: &str) {
    JOBS_COMPLETED_TOTAL.with_label_values(&[tag]).inc();
}

/// Record a job failure
pub fn record_job_failed(tag: &str, terminal: bool) {
    JOBS_FAILED_TOTAL
        .with_label_values(&[tag, if terminal { "true" } else { "false" }])
        .inc();
}

/// Record the size of a non-empty claim batch
pub fn record_claim_batch_size(count: usize) {
    CLAIM_BATCH_SIZE.observe(count as f64);
}

/// Record a claim call that found nothing
pub fn record_empty_claim() {
    EMPTY_CLAIMS_TOTAL.inc();
}

/// Update per-status queue depth gauges from a stats snapshot
pub fn set_queue_depth(stats: &QueueStats) {
    QUEUE_DEPTH
        .with_label_values(&["queued"])
        .set(stats.queued as f64);
    QUEUE_DEPTH
        .with_label_values(&["in_progress"])
        .set(stats.in_progress as f64);
    QUEUE_DEPTH
        .with_label_values(&["failed_retrying"])
        .set(stats.failed_retrying as f64);
    QUEUE_DEPTH
        .with_label_values(&["failed"])
        .set(stats.failed as f64);
    QUEUE_DEPTH
        .with_label_values(&["completed"])
        .set(stats.completed as f64);
}

/// Record audit entries removed by retention pruning
pub fn record_audit_entries_pruned(count: usize) {
    AUDIT_ENTRIES_PRUNED_TOTAL.inc_by(count as f64);
}

/// Update process memory usage
pub fn update_memory_usage() {
    // Get current process memory usage
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // Parse the RSS (Resident Set Size) in kB
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<f64>() {
                            // Convert kB to bytes
                            PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                            return;
                        }
                    }
                }
            }
        }
    }

    // Fallback for non-Linux systems or if reading fails
    // We'll just not update the metric
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    // Update memory usage before returning metrics
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
