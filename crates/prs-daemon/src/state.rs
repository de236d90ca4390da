use std::sync::Arc;
use std::time::Instant;

use prs_core::services::{ConfigStore, RestartOrchestrator};

use crate::logging::LogLevel;

/// Shared state handed to every handler.
pub struct ApiState {
    pub config: Arc<ConfigStore>,
    pub orchestrator: Arc<RestartOrchestrator>,
    /// Present when a reloadable subscriber is installed.
    pub log_level: Option<LogLevel>,
    pub start_time: Instant,
}

impl ApiState {
    pub fn new(config: Arc<ConfigStore>, orchestrator: Arc<RestartOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
            log_level: None,
            start_time: Instant::now(),
        }
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = Some(log_level);
        self
    }
}
