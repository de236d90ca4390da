//! Scripted stand-ins for external processes, shared with the daemon's tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{RestartError, Result};
use crate::models::{CommandOutput, CommandSpec};
use crate::services::process::ProcessRunner;

/// What a scripted command does when it is run.
#[derive(Debug, Clone)]
pub enum Step {
    Exit(i32),
    Timeout,
    SpawnFailure,
    /// Block until the gate is notified, then exit 0.
    Gate(Arc<Notify>),
    Panic,
}

/// A [`ProcessRunner`] that records every command and plays back a fixed
/// outcome for `down` (stop) and `up` (start). Anything else exits 0.
#[derive(Debug)]
pub struct ScriptedRunner {
    stop: Step,
    start: Step,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            stop: Step::Exit(0),
            start: Step::Exit(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_stop(mut self, step: Step) -> Self {
        self.stop = step;
        self
    }

    pub fn on_start(mut self, step: Step) -> Self {
        self.start = step;
        self
    }

    /// Rendered commands, in the order they were run.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn step_for(&self, command: &CommandSpec) -> Step {
        let verb = |v: &str| command.args.iter().any(|a| a == v);
        if verb("down") {
            self.stop.clone()
        } else if verb("up") {
            self.start.clone()
        } else {
            Step::Exit(0)
        }
    }
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(command.to_string());

        let exit_code = match self.step_for(command) {
            Step::Exit(code) => code,
            Step::Timeout => {
                return Err(RestartError::ProcessTimeout {
                    command: command.to_string(),
                    timeout,
                })
            }
            Step::SpawnFailure => {
                return Err(RestartError::ProcessSpawn {
                    command: command.to_string(),
                    message: "No such file or directory (os error 2)".into(),
                })
            }
            Step::Gate(gate) => {
                gate.notified().await;
                0
            }
            Step::Panic => panic!("scripted panic while running '{command}'"),
        };
        Ok(CommandOutput {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                format!("scripted failure ({exit_code})")
            },
        })
    }
}

/// A compose file with a `gerbil` udp mapping next to unrelated services.
pub const SAMPLE_COMPOSE: &str = "\
services:
  pangolin:
    image: fosrl/pangolin:latest
    ports:
      - 3001:3001
  gerbil:
    image: fosrl/gerbil:latest
    ports:
      - 51820:51820/udp
      - 443:443
";

/// A settings file holding `gerbil.start_port`.
pub const SAMPLE_SETTINGS: &str = "\
app:
  dashboard_url: https://pangolin.example.com
gerbil:
  start_port: 51820
  base_endpoint: pangolin.example.com
";

/// Lay out a pangolin directory with the sample files under `root`.
pub fn write_pangolin_dir(root: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(root.join("config"))?;
    std::fs::write(root.join("docker-compose.yml"), SAMPLE_COMPOSE)?;
    std::fs::write(root.join("config").join("config.yml"), SAMPLE_SETTINGS)?;
    Ok(())
}
