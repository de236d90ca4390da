use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum RestartError {
    #[error("invalid config document: {0}")]
    ConfigParse(String),

    #[error("invalid config: {0}")]
    ConfigValidation(String),

    #[error("failed to persist config: {0}")]
    ConfigWrite(String),

    #[error("file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("failed to parse {path}: {message}")]
    FileParse { path: PathBuf, message: String },

    #[error("service '{0}' not found in compose file")]
    ServiceBlockNotFound(String),

    #[error("service '{0}' has no udp port mapping")]
    PortMappingNotFound(String),

    #[error("service '{service}' already publishes udp port {port}")]
    PortConflict { service: String, port: u16 },

    #[error("'{command}' timed out after {}s", timeout.as_secs())]
    ProcessTimeout { command: String, timeout: Duration },

    #[error("'{command}' failed (exit {code}): {stderr}")]
    ProcessNonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to start '{command}': {message}")]
    ProcessSpawn { command: String, message: String },

    #[error("'{0}' requires elevated execution, which this daemon was not started with")]
    ElevationUnavailable(String),

    #[error("a restart is already in progress")]
    LockBusy,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl RestartError {
    pub(crate) fn file_parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::FileParse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RestartError>;
