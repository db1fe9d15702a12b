use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{error, info};

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::queue::QueueManager;

use super::metrics::metrics_handler;
use super::queue_routes::queue_routes;
use super::{log_requests, state::ServerState, RequestsLoggingLevel, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
        hash: state.hash.clone(),
    };
    Json(stats)
}

impl ServerState {
    fn new(config: ServerConfig, queue_manager: Arc<QueueManager>) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            queue_manager,
            hash: option_env!("GIT_HASH").unwrap_or("unknown").to_owned(),
        }
    }
}

/// Assemble the HTTP application.
pub fn make_app(config: ServerConfig, queue_manager: Arc<QueueManager>) -> Result<Router> {
    let state = ServerState::new(config, queue_manager);

    let job_routes: Router = queue_routes().with_state(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    let mut app: Router = home_router.nest("/v1/jobs", job_routes);

    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

/// Run the queue server until it exits.
///
/// The Prometheus scrape endpoint is served from a second listener on
/// `metrics_port` so it never shares exposure with the queue API.
pub async fn run_server(
    queue_manager: Arc<QueueManager>,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    metrics_port: u16,
) -> Result<()> {
    let config = ServerConfig {
        port,
        metrics_port,
        requests_logging_level,
    };
    let app = make_app(config, queue_manager)?;

    let metrics_app: Router = Router::new().route("/metrics", get(metrics_handler));
    let metrics_listener =
        tokio::net::TcpListener::bind(format!("127.0.0.1:{}", metrics_port)).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
            error!("Metrics server exited: {}", e);
        }
    });
    info!("Metrics endpoint listening on port {}", metrics_port);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Job queue server listening on port {}", port);

    Ok(axum::serve(listener, app).await?)
}
