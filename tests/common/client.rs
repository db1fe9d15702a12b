//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all job queue endpoints.
//!
//! When API routes or request formats change, update only this file.

#![allow(dead_code)] // Not every test binary uses every helper

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// HTTP test client for the job queue API
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Home Endpoint
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Producer Endpoints
    // ========================================================================

    /// POST /v1/jobs with only a tag, everything else defaulted
    pub async fn enqueue(&self, tag: &str) -> Response {
        self.enqueue_with(json!({ "tag": tag })).await
    }

    /// POST /v1/jobs with a caller-built body
    pub async fn enqueue_with(&self, body: serde_json::Value) -> Response {
        self.client
            .post(format!("{}/v1/jobs", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Enqueue request failed")
    }

    /// Enqueues a job and asserts success, returning the created job.
    pub async fn enqueue_job(&self, tag: &str) -> serde_json::Value {
        self.enqueue_job_with(json!({ "tag": tag })).await
    }

    /// Enqueues a job from a caller-built body and asserts success.
    pub async fn enqueue_job_with(&self, body: serde_json::Value) -> serde_json::Value {
        let response = self.enqueue_with(body).await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        response.json().await.expect("Enqueue response was not JSON")
    }

    // ========================================================================
    // Worker Endpoints
    // ========================================================================

    /// GET /v1/jobs/queue with repeated tag parameters
    pub async fn claim(&self, tags: &[&str], worker_id: &str, limit: usize) -> Response {
        let mut query: Vec<(String, String)> = tags
            .iter()
            .map(|tag| ("tag".to_string(), tag.to_string()))
            .collect();
        query.push(("worker_id".to_string(), worker_id.to_string()));
        query.push(("limit".to_string(), limit.to_string()));

        self.client
            .get(format!("{}/v1/jobs/queue", self.base_url))
            .query(&query)
            .send()
            .await
            .expect("Claim request failed")
    }

    /// Claims jobs and asserts success, returning the claimed batch.
    pub async fn claim_jobs(
        &self,
        tags: &[&str],
        worker_id: &str,
        limit: usize,
    ) -> Vec<serde_json::Value> {
        let response = self.claim(tags, worker_id, limit).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Claim response was not JSON")
    }

    /// POST /v1/jobs/{id}/release
    pub async fn release(&self, job_id: i64, worker_id: &str) -> Response {
        self.client
            .post(format!("{}/v1/jobs/{}/release", self.base_url, job_id))
            .json(&json!({ "worker_id": worker_id }))
            .send()
            .await
            .expect("Release request failed")
    }

    /// POST /v1/jobs/{id}/complete
    pub async fn complete(&self, job_id: i64, worker_id: &str) -> Response {
        self.client
            .post(format!("{}/v1/jobs/{}/complete", self.base_url, job_id))
            .json(&json!({ "worker_id": worker_id }))
            .send()
            .await
            .expect("Complete request failed")
    }

    /// POST /v1/jobs/{id}/complete with a result payload
    pub async fn complete_with_result(
        &self,
        job_id: i64,
        worker_id: &str,
        result: serde_json::Value,
    ) -> Response {
        self.client
            .post(format!("{}/v1/jobs/{}/complete", self.base_url, job_id))
            .json(&json!({ "worker_id": worker_id, "result": result }))
            .send()
            .await
            .expect("Complete request failed")
    }

    /// POST /v1/jobs/{id}/fail
    pub async fn fail(&self, job_id: i64, worker_id: &str, reason: &str) -> Response {
        self.client
            .post(format!("{}/v1/jobs/{}/fail", self.base_url, job_id))
            .json(&json!({ "worker_id": worker_id, "reason": reason }))
            .send()
            .await
            .expect("Fail request failed")
    }

    /// POST /v1/jobs/{id}/fail with a long-form message
    pub async fn fail_with_message(
        &self,
        job_id: i64,
        worker_id: &str,
        reason: &str,
        message: &str,
    ) -> Response {
        self.client
            .post(format!("{}/v1/jobs/{}/fail", self.base_url, job_id))
            .json(&json!({ "worker_id": worker_id, "reason": reason, "message": message }))
            .send()
            .await
            .expect("Fail request failed")
    }

    // ========================================================================
    // Query Endpoints
    // ========================================================================

    /// GET /v1/jobs/{id}
    pub async fn get_job(&self, job_id: i64) -> Response {
        self.client
            .get(format!("{}/v1/jobs/{}", self.base_url, job_id))
            .send()
            .await
            .expect("Get job request failed")
    }

    /// Fetches a job and asserts success, returning its JSON representation.
    pub async fn get_job_json(&self, job_id: i64) -> serde_json::Value {
        let response = self.get_job(job_id).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Job response was not JSON")
    }

    /// GET /v1/jobs with query parameters
    pub async fn list_jobs(&self, query: &[(&str, &str)]) -> Response {
        self.client
            .get(format!("{}/v1/jobs", self.base_url))
            .query(query)
            .send()
            .await
            .expect("List jobs request failed")
    }

    // ========================================================================
    // Admin Endpoints
    // ========================================================================

    /// GET /v1/jobs/admin/stats
    pub async fn admin_stats(&self) -> Response {
        self.client
            .get(format!("{}/v1/jobs/admin/stats", self.base_url))
            .send()
            .await
            .expect("Stats request failed")
    }

    /// GET /v1/jobs/admin/audit
    pub async fn admin_audit(&self) -> Response {
        self.admin_audit_query(&[]).await
    }

    /// GET /v1/jobs/admin/audit with query parameters
    pub async fn admin_audit_query(&self, query: &[(&str, &str)]) -> Response {
        self.client
            .get(format!("{}/v1/jobs/admin/audit", self.base_url))
            .query(query)
            .send()
            .await
            .expect("Audit request failed")
    }

    /// GET /v1/jobs/admin/audit/{job_id}
    pub async fn admin_job_audit(&self, job_id: i64) -> Response {
        self.client
            .get(format!("{}/v1/jobs/admin/audit/{}", self.base_url, job_id))
            .send()
            .await
            .expect("Job audit request failed")
    }
}
