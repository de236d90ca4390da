use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{RestartError, Result};
use crate::models::{CommandOutput, CommandSpec};

/// Executes external commands on behalf of the orchestrator.
///
/// Implementations return `Ok` for any command that ran to completion,
/// whatever its exit code; classification is up to the caller.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> Result<CommandOutput>;
}

/// Privilege the runner is allowed to acquire for elevated commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    None,
    /// Non-interactive `sudo -n`.
    Sudo,
}

/// Runs commands as local child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    elevation: Elevation,
}

impl SystemRunner {
    pub fn new(elevation: Elevation) -> Self {
        Self { elevation }
    }

    fn build(&self, spec: &CommandSpec) -> Result<Command> {
        let mut cmd = if spec.elevated {
            match self.elevation {
                Elevation::Sudo => {
                    let mut cmd = Command::new("sudo");
                    cmd.arg("-n").arg(&spec.program);
                    cmd
                }
                Elevation::None => {
                    return Err(RestartError::ElevationUnavailable(spec.to_string()));
                }
            }
        } else {
            Command::new(&spec.program)
        };
        cmd.args(&spec.args);
        if let Some(dir) = &spec.working_directory {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(Elevation::None)
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput> {
        let mut cmd = self.build(spec)?;
        tracing::info!(command = %spec, "executing");

        // Dropping the pending future on timeout kills the child (kill_on_drop).
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(RestartError::ProcessSpawn {
                    command: spec.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                tracing::error!(command = %spec, timeout_secs = timeout.as_secs(), "command timed out");
                return Err(RestartError::ProcessTimeout {
                    command: spec.to_string(),
                    timeout,
                });
            }
        };

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        if result.success() {
            tracing::info!(command = %spec, "command succeeded");
            if !result.stdout.is_empty() {
                tracing::debug!(stdout = %result.stdout, "command output");
            }
        } else {
            tracing::error!(
                command = %spec,
                exit = result.exit_code.unwrap_or(-1),
                stderr = %result.stderr,
                "command failed"
            );
        }
        Ok(result)
    }
}
