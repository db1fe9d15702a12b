use axum::extract::FromRef;

use crate::queue::QueueManager;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedQueueManager = Arc<QueueManager>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub queue_manager: GuardedQueueManager,
    pub hash: String,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedQueueManager {
    fn from_ref(input: &ServerState) -> Self {
        input.queue_manager.clone()
    }
}
