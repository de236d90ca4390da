use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RestartError, Result};
use crate::models::{CommandSpec, ServiceConfig};
use crate::services::process::ProcessRunner;

/// The compose lifecycle commands for the managed workload.
#[derive(Debug, Clone)]
pub struct Workload {
    compose: Vec<String>,
    directory: PathBuf,
    elevated: bool,
    timeout: Duration,
}

impl Workload {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            compose: config.docker.compose_command.clone(),
            directory: config.pangolin.directory.clone(),
            elevated: config.docker.use_sudo,
            timeout: config.exec_timeout(),
        }
    }

    pub fn stop_command(&self) -> CommandSpec {
        self.compose_with(&["down"])
    }

    pub fn start_command(&self) -> CommandSpec {
        self.compose_with(&["up", "-d"])
    }

    /// Bring the workload down.
    pub async fn stop(&self, runner: &dyn ProcessRunner) -> Result<()> {
        tracing::info!("stopping workload");
        self.run_checked(runner, self.stop_command()).await
    }

    /// Bring the workload up, detached.
    pub async fn start(&self, runner: &dyn ProcessRunner) -> Result<()> {
        tracing::info!("starting workload");
        self.run_checked(runner, self.start_command()).await
    }

    fn compose_with(&self, verb: &[&str]) -> CommandSpec {
        let (program, base_args) = match self.compose.split_first() {
            Some((program, rest)) => (program.as_str(), rest),
            None => ("docker", &[][..]),
        };
        CommandSpec::new(program)
            .args(base_args.iter().map(String::as_str))
            .args(verb.iter().copied())
            .current_dir(&self.directory)
            .elevated(self.elevated)
    }

    async fn run_checked(&self, runner: &dyn ProcessRunner, command: CommandSpec) -> Result<()> {
        let output = runner.run(&command, self.timeout).await?;
        if output.success() {
            return Ok(());
        }
        Err(RestartError::ProcessNonZeroExit {
            command: command.to_string(),
            code: output.exit_code.unwrap_or(-1),
            stderr: output.stderr,
        })
    }
}
