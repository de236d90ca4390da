use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Step of the restart workflow a failure is attributed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RestartStage {
    Locking,
    ChoosingPort,
    UpdatingFiles,
    Stopping,
    Starting,
}

impl RestartStage {
    pub fn label(self) -> &'static str {
        match self {
            RestartStage::Locking => "lock",
            RestartStage::ChoosingPort => "port selection",
            RestartStage::UpdatingFiles => "file update",
            RestartStage::Stopping => "stop",
            RestartStage::Starting => "start",
        }
    }
}

impl fmt::Display for RestartStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a single restart attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestartResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<RestartStage>,
    pub completed_at: DateTime<Utc>,
}

impl RestartResult {
    pub fn succeeded(port: u16) -> Self {
        Self {
            success: true,
            message: format!("Pangolin restarted successfully with port {port}"),
            chosen_port: Some(port),
            failed_stage: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(stage: RestartStage, chosen_port: Option<u16>, reason: impl fmt::Display) -> Self {
        Self {
            success: false,
            message: format!("{stage} stage failed: {reason}"),
            chosen_port,
            failed_stage: Some(stage),
            completed_at: Utc::now(),
        }
    }

    pub fn busy() -> Self {
        Self::failed(
            RestartStage::Locking,
            None,
            crate::error::RestartError::LockBusy,
        )
    }

    /// The workflow ended without reaching a stage boundary (e.g. a panic).
    pub fn aborted(reason: impl fmt::Display) -> Self {
        Self {
            success: false,
            message: format!("restart aborted: {reason}"),
            chosen_port: None,
            failed_stage: None,
            completed_at: Utc::now(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.failed_stage == Some(RestartStage::Locking)
    }
}
