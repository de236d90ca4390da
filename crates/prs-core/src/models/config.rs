use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RestartError, Result};

const LOG_LEVELS: &[&str] = &["TRACE", "DEBUG", "INFO", "WARN", "WARNING", "ERROR"];

/// The daemon's configuration document. Every section and field has a
/// default, so a partial (or empty) document is always loadable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service: ListenerSettings,
    pub pangolin: PangolinSettings,
    pub port_range: PortRange,
    pub docker: DockerSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerSettings {
    pub listen_host: String,
    pub listen_port: u16,
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: String,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".into(),
            listen_port: 8080,
            log_level: "INFO".into(),
            log_to_file: true,
            log_file: "pangolin_restart_service.log".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PangolinSettings {
    pub directory: PathBuf,
    pub docker_compose_file: PathBuf,
    pub config_file: PathBuf,
    /// Compose service whose udp mapping follows the chosen port.
    pub compose_service: String,
    /// Dotted key in the settings file that receives the chosen port.
    pub settings_key: String,
}

impl Default for PangolinSettings {
    fn default() -> Self {
        Self {
            directory: "./pangolin".into(),
            docker_compose_file: "docker-compose.yml".into(),
            config_file: "config/config.yml".into(),
            compose_service: "gerbil".into(),
            settings_key: "gerbil.start_port".into(),
        }
    }
}

/// Inclusive range the restart port is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortRange {
    pub min: u16,
    pub max: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            min: 50000,
            max: 60000,
        }
    }
}

impl PortRange {
    pub fn contains(&self, port: u16) -> bool {
        (self.min..=self.max).contains(&port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerSettings {
    pub use_sudo: bool,
    /// Per-command timeout in seconds.
    pub timeout: u64,
    pub compose_command: Vec<String>,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            use_sudo: true,
            timeout: 120,
            compose_command: vec!["docker".into(), "compose".into()],
        }
    }
}

impl ServiceConfig {
    pub fn pangolin_directory(&self) -> &Path {
        &self.pangolin.directory
    }

    pub fn compose_file_path(&self) -> PathBuf {
        self.pangolin.directory.join(&self.pangolin.docker_compose_file)
    }

    pub fn settings_file_path(&self) -> PathBuf {
        self.pangolin.directory.join(&self.pangolin.config_file)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.docker.timeout)
    }

    /// `tracing` filter directive equivalent to `service.log_level`.
    pub fn log_directive(&self) -> &'static str {
        match self.service.log_level.to_ascii_uppercase().as_str() {
            "TRACE" => "trace",
            "DEBUG" => "debug",
            "WARN" | "WARNING" => "warn",
            "ERROR" => "error",
            _ => "info",
        }
    }

    /// Every invariant violation, in document order.
    pub fn violations(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.service.listen_port == 0 {
            problems.push("service.listen_port must be between 1 and 65535".to_string());
        }
        let level = self.service.log_level.to_ascii_uppercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            problems.push(format!(
                "service.log_level '{}' must be one of {}",
                self.service.log_level,
                LOG_LEVELS.join(", ")
            ));
        }
        if self.pangolin.compose_service.trim().is_empty() {
            problems.push("pangolin.compose_service must not be empty".to_string());
        }
        if self.pangolin.settings_key.split('.').any(|k| k.trim().is_empty()) {
            problems.push(format!(
                "pangolin.settings_key '{}' is not a valid dotted key",
                self.pangolin.settings_key
            ));
        }
        if self.port_range.min == 0 {
            problems.push("port_range.min must be at least 1".to_string());
        }
        if self.port_range.min >= self.port_range.max {
            problems.push(format!(
                "port_range.min ({}) must be less than port_range.max ({})",
                self.port_range.min, self.port_range.max
            ));
        }
        if self.docker.timeout == 0 {
            problems.push("docker.timeout must be a positive number of seconds".to_string());
        }
        if self.docker.compose_command.is_empty() {
            problems.push("docker.compose_command must name a program".to_string());
        }
        problems
    }

    pub fn validate(&self) -> Result<()> {
        let problems = self.violations();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(RestartError::ConfigValidation(problems.join("; ")))
        }
    }
}
