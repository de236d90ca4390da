use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::RestartError;
use crate::models::{RestartResult, RestartStage, ServiceConfig};
use crate::services::compose::update_compose_file;
use crate::services::config_store::ConfigStore;
use crate::services::ports::PortPicker;
use crate::services::process::ProcessRunner;
use crate::services::settings::{read_settings_port, update_settings_file};
use crate::services::workload::Workload;

/// Runs the restart workflow: pick a port, rewrite both files, stop the
/// workload, start it again.
///
/// At most one workflow runs at a time. A second caller gets a busy result
/// immediately instead of queueing.
pub struct RestartOrchestrator {
    config: Arc<ConfigStore>,
    runner: Arc<dyn ProcessRunner>,
    ports: PortPicker,
    lock: Mutex<()>,
    in_progress: AtomicBool,
    last_result: RwLock<Option<RestartResult>>,
}

/// Clears the in-progress flag however the workflow ends.
struct InProgress<'a>(&'a AtomicBool);

impl<'a> InProgress<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RestartOrchestrator {
    pub fn new(config: Arc<ConfigStore>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            config,
            runner,
            ports: PortPicker::new(),
            lock: Mutex::new(()),
            in_progress: AtomicBool::new(false),
            last_result: RwLock::new(None),
        }
    }

    pub fn with_port_picker(mut self, ports: PortPicker) -> Self {
        self.ports = ports;
        self
    }

    pub fn is_restart_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Result of the most recent workflow that got past the lock.
    pub async fn last_result(&self) -> Option<RestartResult> {
        self.last_result.read().await.clone()
    }

    /// Run one restart. Never returns an error: failures are reported in the
    /// result, attributed to the stage that failed.
    pub async fn restart(&self) -> RestartResult {
        let Ok(_guard) = self.lock.try_lock() else {
            tracing::warn!("restart rejected: already in progress");
            return RestartResult::busy();
        };
        let result = {
            let _flag = InProgress::enter(&self.in_progress);
            self.run_workflow().await
        };
        *self.last_result.write().await = Some(result.clone());
        result
    }

    /// Run [`restart`](Self::restart) on its own task, so dropping the caller
    /// cannot interrupt the workflow between stop and start.
    pub async fn spawn_restart(self: Arc<Self>) -> RestartResult {
        let worker = Arc::clone(&self);
        match tokio::spawn(async move { worker.restart().await }).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "restart task aborted");
                let result = RestartResult::aborted(e);
                *self.last_result.write().await = Some(result.clone());
                result
            }
        }
    }

    async fn run_workflow(&self) -> RestartResult {
        let config = self.config.get().await;
        tracing::info!(
            min = config.port_range.min,
            max = config.port_range.max,
            "restart_started"
        );

        let port = match self.ports.pick(&config.port_range) {
            Ok(port) => port,
            Err(e) => return failure(RestartStage::ChoosingPort, None, e),
        };
        tracing::info!(port, "port_chosen");

        if let Err(e) = update_files(&config, port).await {
            return failure(RestartStage::UpdatingFiles, Some(port), e);
        }

        let workload = Workload::from_config(&config);
        if let Err(e) = workload.stop(self.runner.as_ref()).await {
            return failure(RestartStage::Stopping, Some(port), e);
        }
        if let Err(e) = workload.start(self.runner.as_ref()).await {
            return failure(RestartStage::Starting, Some(port), e);
        }

        tracing::info!(port, "restart_completed");
        RestartResult::succeeded(port)
    }
}

async fn update_files(config: &ServiceConfig, port: u16) -> crate::Result<()> {
    let settings_path = config.settings_file_path();
    let current = read_settings_port(&settings_path, &config.pangolin.settings_key).await?;
    update_compose_file(
        &config.compose_file_path(),
        &config.pangolin.compose_service,
        port,
        current,
    )
    .await?;
    update_settings_file(&settings_path, &config.pangolin.settings_key, port).await
}

fn failure(stage: RestartStage, port: Option<u16>, error: RestartError) -> RestartResult {
    tracing::error!(stage = %stage, port, error = %error, "restart_failed");
    RestartResult::failed(stage, port, error)
}
