//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When test data changes (worker names, job tags, etc.),
//! update only this file.

// ============================================================================
// Test Worker Identities
// ============================================================================

/// First test worker
pub const WORKER_1: &str = "worker-alpha";

/// Second test worker, for contention and lease handoff scenarios
pub const WORKER_2: &str = "worker-beta";

// ============================================================================
// Test Job Tags
// ============================================================================

/// Tag for image resize jobs
pub const TAG_RESIZE: &str = "image-resize";

/// Tag for video transcode jobs
pub const TAG_TRANSCODE: &str = "video-transcode";

/// Tag for report export jobs
pub const TAG_REPORT: &str = "report-export";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
