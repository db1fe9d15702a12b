//! End-to-end tests for failure reporting and retries
//!
//! Covers the fail transition, the attempt ceiling, and the
//! failed_retrying re-claim path.

mod common;

use common::{TestClient, TestServer, TAG_TRANSCODE, WORKER_1, WORKER_2};
use reqwest::StatusCode;
use serde_json::json;

// ============================================================================
// Terminal Failure Tests
// ============================================================================

#[tokio::test]
async fn test_single_attempt_failure_is_terminal() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let enqueued = client.enqueue_job(TAG_TRANSCODE).await;
    let job_id = enqueued["id"].as_i64().unwrap();
    client.claim_jobs(&[TAG_TRANSCODE], WORKER_1, 1).await;

    let response = client.fail(job_id, WORKER_1, "codec-unsupported").await;
    assert_eq!(response.status(), StatusCode::OK);

    let failed: serde_json::Value = response.json().await.unwrap();
    assert_eq!(failed["status"], "failed");
    assert_eq!(failed["attempts"], 1);
    assert_eq!(failed["fail_reason"], "codec-unsupported");
    assert!(failed["failed_at"].as_i64().unwrap() > 0);
    assert!(failed["locked_at"].is_null());

    // Terminal, so no worker can pick it up again
    let claimed = client.claim_jobs(&[TAG_TRANSCODE], WORKER_2, 10).await;
    assert!(claimed.is_empty());
}

// ============================================================================
// Retry Tests
// ============================================================================

#[tokio::test]
async fn test_failure_with_attempts_left_is_retryable() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let enqueued = client
        .enqueue_job_with(json!({ "tag": TAG_TRANSCODE, "max_attempts": 2 }))
        .await;
    let job_id = enqueued["id"].as_i64().unwrap();
    client.claim_jobs(&[TAG_TRANSCODE], WORKER_1, 1).await;

    let response = client.fail(job_id, WORKER_1, "worker-crash").await;
    assert_eq!(response.status(), StatusCode::OK);

    let failed: serde_json::Value = response.json().await.unwrap();
    assert_eq!(failed["status"], "failed_retrying");
    assert_eq!(failed["attempts"], 1);

    // Retry starts a fresh attempt
    let reclaimed = client.claim_jobs(&[TAG_TRANSCODE], WORKER_2, 1).await;
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0]["status"], "in_progress");
    assert_eq!(reclaimed[0]["attempts"], 2);
    assert_eq!(reclaimed[0]["worker_id"], WORKER_2);
}

#[tokio::test]
async fn test_attempt_ladder_exhausts_at_max_attempts() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let enqueued = client
        .enqueue_job_with(json!({ "tag": TAG_TRANSCODE, "max_attempts": 3 }))
        .await;
    let job_id = enqueued["id"].as_i64().unwrap();

    for expected_attempts in 1..=3 {
        let claimed = client.claim_jobs(&[TAG_TRANSCODE], WORKER_1, 1).await;
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0]["attempts"], expected_attempts);

        let response = client.fail(job_id, WORKER_1, "flaky-upstream").await;
        assert_eq!(response.status(), StatusCode::OK);

        let failed: serde_json::Value = response.json().await.unwrap();
        let expected_status = if expected_attempts < 3 {
            "failed_retrying"
        } else {
            "failed"
        };
        assert_eq!(failed["status"], expected_status);
        assert_eq!(failed["attempts"], expected_attempts);
    }

    // The ladder is exhausted
    let claimed = client.claim_jobs(&[TAG_TRANSCODE], WORKER_1, 10).await;
    assert!(claimed.is_empty());
}

#[tokio::test]
async fn test_retry_can_still_succeed() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let enqueued = client
        .enqueue_job_with(json!({ "tag": TAG_TRANSCODE, "max_attempts": 2 }))
        .await;
    let job_id = enqueued["id"].as_i64().unwrap();

    client.claim_jobs(&[TAG_TRANSCODE], WORKER_1, 1).await;
    let response = client.fail(job_id, WORKER_1, "worker-crash").await;
    assert_eq!(response.status(), StatusCode::OK);

    client.claim_jobs(&[TAG_TRANSCODE], WORKER_2, 1).await;
    let response = client.complete(job_id, WORKER_2).await;
    assert_eq!(response.status(), StatusCode::OK);

    let completed: serde_json::Value = response.json().await.unwrap();
    assert_eq!(completed["status"], "completed");
    assert_eq!(completed["attempts"], 2);
    // The new attempt wiped the first attempt's diagnostics
    assert!(completed["fail_reason"].is_null());
    assert!(completed["failed_at"].is_null());
}

#[tokio::test]
async fn test_unleased_retrying_job_cannot_be_completed() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let enqueued = client
        .enqueue_job_with(json!({ "tag": TAG_TRANSCODE, "max_attempts": 2 }))
        .await;
    let job_id = enqueued["id"].as_i64().unwrap();

    client.claim_jobs(&[TAG_TRANSCODE], WORKER_1, 1).await;
    client.fail(job_id, WORKER_1, "worker-crash").await;

    // The failure dropped the lease, completion requires claiming again
    let response = client.complete(job_id, WORKER_1).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ============================================================================
// Diagnostics Tests
// ============================================================================

#[tokio::test]
async fn test_fail_stores_reason_and_message() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let enqueued = client
        .enqueue_job_with(json!({ "tag": TAG_TRANSCODE, "max_attempts": 2 }))
        .await;
    let job_id = enqueued["id"].as_i64().unwrap();
    client.claim_jobs(&[TAG_TRANSCODE], WORKER_1, 1).await;

    let response = client
        .fail_with_message(
            job_id,
            WORKER_1,
            "oom",
            "transcoder exceeded 4GiB while demuxing segment 17",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let failed: serde_json::Value = response.json().await.unwrap();
    assert_eq!(failed["fail_reason"], "oom");
    assert_eq!(
        failed["fail_message"],
        "transcoder exceeded 4GiB while demuxing segment 17"
    );

    // Re-claiming starts a fresh attempt and drops the old diagnostics
    let reclaimed = client.claim_jobs(&[TAG_TRANSCODE], WORKER_2, 1).await;
    assert!(reclaimed[0]["fail_reason"].is_null());
}

// ============================================================================
// Validation Tests
// ============================================================================

#[tokio::test]
async fn test_fail_requires_a_reason() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let enqueued = client.enqueue_job(TAG_TRANSCODE).await;
    let job_id = enqueued["id"].as_i64().unwrap();
    client.claim_jobs(&[TAG_TRANSCODE], WORKER_1, 1).await;

    let response = client.fail(job_id, WORKER_1, "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_fail_bounds_reason_length() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let enqueued = client.enqueue_job(TAG_TRANSCODE).await;
    let job_id = enqueued["id"].as_i64().unwrap();
    client.claim_jobs(&[TAG_TRANSCODE], WORKER_1, 1).await;

    let too_long = "r".repeat(256);
    let response = client.fail(job_id, WORKER_1, &too_long).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let at_limit = "r".repeat(255);
    let response = client.fail(job_id, WORKER_1, &at_limit).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_fail_bounds_message_length() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let enqueued = client.enqueue_job(TAG_TRANSCODE).await;
    let job_id = enqueued["id"].as_i64().unwrap();
    client.claim_jobs(&[TAG_TRANSCODE], WORKER_1, 1).await;

    let too_long = "m".repeat(1001);
    let response = client
        .fail_with_message(job_id, WORKER_1, "oom", &too_long)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_fail_by_non_holder_is_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let enqueued = client.enqueue_job(TAG_TRANSCODE).await;
    let job_id = enqueued["id"].as_i64().unwrap();
    client.claim_jobs(&[TAG_TRANSCODE], WORKER_1, 1).await;

    let response = client.fail(job_id, WORKER_2, "not-mine").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let job = client.get_job_json(job_id).await;
    assert_eq!(job["status"], "in_progress");
    assert_eq!(job["worker_id"], WORKER_1);
}
