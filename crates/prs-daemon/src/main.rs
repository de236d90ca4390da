use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};

use prs_core::services::config_check::inspect;
use prs_core::services::{ConfigStore, Elevation, RestartOrchestrator, SystemRunner};
use prs_daemon::http::server;
use prs_daemon::logging;
use prs_daemon::state::ApiState;

/// Restarts a Pangolin deployment on a fresh random udp port on request.
#[derive(Debug, Parser)]
#[command(name = "prs-daemon", version, about)]
struct Cli {
    /// Configuration document; created with defaults if missing.
    #[arg(long, default_value = "service_config.json")]
    config: PathBuf,

    /// Force debug-level logging.
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Run the HTTP service (default).
    Serve,
    /// Check the configuration document and exit.
    Validate,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_service(&cli.config, cli.debug).await,
        Command::Validate => validate(&cli.config).await,
    }
}

async fn validate(path: &Path) -> color_eyre::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let report = inspect(&raw);
    print!("{report}");
    if !report.is_valid() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_service(path: &Path, debug: bool) -> color_eyre::Result<()> {
    let store = ConfigStore::open(path)
        .await
        .wrap_err_with(|| format!("failed to load {}", path.display()))?;
    let config = store.get().await;
    let (log_level, _guard) = logging::init(&config, debug)?;

    let directory = config.pangolin_directory();
    if !directory.exists() {
        tracing::error!(directory = %directory.display(), "pangolin directory not found");
        bail!("pangolin directory not found: {}", directory.display());
    }

    tracing::info!(
        config = %path.display(),
        listen = %format!("{}:{}", config.service.listen_host, config.service.listen_port),
        port_range = %format!("{}-{}", config.port_range.min, config.port_range.max),
        pangolin_directory = %directory.display(),
        use_sudo = config.docker.use_sudo,
        "starting pangolin restart service"
    );

    let elevation = if config.docker.use_sudo {
        Elevation::Sudo
    } else {
        Elevation::None
    };
    let store = Arc::new(store);
    let orchestrator = Arc::new(RestartOrchestrator::new(
        Arc::clone(&store),
        Arc::new(SystemRunner::new(elevation)),
    ));
    let state = Arc::new(ApiState::new(store, orchestrator).with_log_level(log_level));

    server::serve(
        state,
        &config.service.listen_host,
        config.service.listen_port,
        shutdown_signal(),
    )
    .await
    .wrap_err("http server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(e) => {
            tracing::error!(error = %e, "cannot listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
