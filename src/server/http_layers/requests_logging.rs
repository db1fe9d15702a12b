//! Request logging middleware
#![allow(dead_code)] // Used as middleware

use super::super::state::ServerState;
use crate::server::metrics::{categorize_endpoint, record_http_request};
use axum::extract::State;
use axum::{
    body::Body,
    http::{header::HeaderMap, Request, Response},
    middleware::Next,
    response::IntoResponse,
};
use std::time::Instant;
use tracing::{error, info};

#[derive(PartialEq, PartialOrd, Clone, Debug, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    Path,
    Headers,
    Body,
}

impl Default for RequestsLoggingLevel {
    fn default() -> Self {
        Self::Path
    }
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;

fn content_length(headers: &HeaderMap) -> Result<usize, &'static str> {
    headers
        .get("content-length")
        .ok_or("Content-length not set.")?
        .to_str()
        .map_err(|_| "Content-length is not valid text.")?
        .parse()
        .map_err(|_| "Content-length is not a number.")
}

enum BodyLog {
    Text(String),
    Skipped(String),
}

/// Buffers a body small enough to log, handing back the text and a rebuilt
/// body to put in the buffered bytes' place. Oversized or unreadable bodies
/// pass through untouched.
async fn buffer_body(headers: &HeaderMap, body: Body) -> Result<(Body, BodyLog), axum::Error> {
    let size = match content_length(headers) {
        Ok(size) if size < MAX_LOGGABLE_BODY_LENGTH => size,
        Ok(size) => {
            let reason = format!("Too big to log ({:#})", byte_unit::Byte::from(size));
            return Ok((body, BodyLog::Skipped(reason)));
        }
        Err(reason) => return Ok((body, BodyLog::Skipped(reason.to_string()))),
    };

    let bytes = axum::body::to_bytes(body, size).await?;
    let text = String::from_utf8_lossy(&bytes).to_string();
    Ok((Body::from(bytes), BodyLog::Text(text)))
}

fn log_headers(label: &str, headers: &HeaderMap) {
    info!("  {} Headers:", label);
    for (name, value) in headers.iter() {
        info!("    {:?}: {:?}", name, value);
    }
}

fn log_body(label: &str, body_log: &BodyLog) {
    match body_log {
        BodyLog::Text(text) => info!("  {} Body:\n{}", label, text),
        BodyLog::Skipped(reason) => info!("  {} Body: {}", label, reason),
    }
}

fn internal_error() -> Response<Body> {
    Response::builder()
        .status(500)
        .body(Body::from("Internal Server Error"))
        .unwrap()
}

pub async fn log_requests(
    State(state): State<ServerState>,
    mut request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let level = state.config.requests_logging_level.clone();

    let start = Instant::now();

    let method = request.method().to_string();
    let uri = request.uri().to_string();
    let path = request.uri().path().to_string();

    if level > RequestsLoggingLevel::None {
        info!(">>> {} {}", method, uri);
    }

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Req", request.headers());
    }

    if level >= RequestsLoggingLevel::Body {
        let (parts, body) = request.into_parts();
        match buffer_body(&parts.headers, body).await {
            Ok((body, body_log)) => {
                log_body("Req", &body_log);
                request = Request::from_parts(parts, body);
            }
            Err(err) => {
                error!("Failed to read request body: {:?}", err);
                return internal_error();
            }
        }
    }

    let mut response = next.run(request).await;

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Resp", response.headers());
    }

    if level >= RequestsLoggingLevel::Body {
        let (parts, body) = response.into_parts();
        match buffer_body(&parts.headers, body).await {
            Ok((body, body_log)) => {
                log_body("Resp", &body_log);
                response = Response::from_parts(parts, body);
            }
            Err(err) => {
                error!("Failed to read response body: {:?}", err);
                return internal_error();
            }
        }
    }

    let status = response.status().as_u16();
    let duration = start.elapsed();

    if level > RequestsLoggingLevel::None {
        info!("<<< {} ({}ms)", status, duration.as_millis());
    }

    // Numeric path segments are collapsed so job ids do not blow up the
    // metric label cardinality
    let endpoint_category = categorize_endpoint(&path);
    record_http_request(&method, &endpoint_category, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_level_ordering() {
        assert!(RequestsLoggingLevel::None < RequestsLoggingLevel::Path);
        assert!(RequestsLoggingLevel::Path < RequestsLoggingLevel::Headers);
        assert!(RequestsLoggingLevel::Headers < RequestsLoggingLevel::Body);
    }

    #[test]
    fn test_content_length_parsing() {
        let mut headers = HeaderMap::new();
        assert!(content_length(&headers).is_err());

        headers.insert("content-length", HeaderValue::from_static("512"));
        assert_eq!(content_length(&headers), Ok(512));

        headers.insert("content-length", HeaderValue::from_static("not-a-number"));
        assert!(content_length(&headers).is_err());
    }
}
