use std::path::Path;

use prs_core::models::ServiceConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

pub type FilterLayer = reload::Layer<EnvFilter, Registry>;

/// Runtime handle on the installed level filter.
#[derive(Clone)]
pub struct LogLevel {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogLevel {
    /// A reloadable filter starting at `directive`. The handle only works
    /// while the returned layer is alive.
    pub fn reloadable(directive: &str) -> (FilterLayer, Self) {
        let (layer, handle) = reload::Layer::new(EnvFilter::new(directive));
        (layer, Self { handle })
    }

    /// Replace the active filter.
    pub fn set(&self, directive: &str) -> Result<(), reload::Error> {
        self.handle.modify(|filter| *filter = EnvFilter::new(directive))?;
        tracing::info!(level = directive, "log level changed");
        Ok(())
    }

    pub fn current(&self) -> Option<String> {
        self.handle.with_current(|filter| filter.to_string()).ok()
    }
}

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(config: &ServiceConfig, debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        config.log_directive()
    }
}

fn initial_directive(config: &ServiceConfig, debug: bool) -> String {
    let fallback = default_directive(config, debug);
    if debug {
        return fallback.to_string();
    }
    std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|v| EnvFilter::try_new(v).is_ok())
        .unwrap_or_else(|| fallback.to_string())
}

/// Install the global subscriber: stdout always, plus a plain-text file
/// when `service.log_to_file` is set.
///
/// The returned guard flushes the file writer and must live as long as the
/// process; the [`LogLevel`] lets the level follow configuration updates.
pub fn init(
    config: &ServiceConfig,
    debug: bool,
) -> color_eyre::Result<(LogLevel, Option<WorkerGuard>)> {
    let (file_layer, guard) = if config.service.log_to_file {
        let appender = file_appender(Path::new(&config.service.log_file))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let (filter, level) = LogLevel::reloadable(&initial_directive(config, debug));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;
    Ok((level, guard))
}

fn file_appender(path: &Path) -> color_eyre::Result<RollingFileAppender> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| color_eyre::eyre::eyre!("log_file '{}' has no file name", path.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)?;
    Ok(appender)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_overrides_configured_level() {
        let mut config = ServiceConfig::default();
        config.service.log_level = "ERROR".into();
        assert_eq!(default_directive(&config, false), "error");
        assert_eq!(default_directive(&config, true), "debug");
        assert_eq!(initial_directive(&config, true), "debug");
    }

    #[test]
    fn level_can_be_changed_while_the_layer_lives() {
        let (layer, level) = LogLevel::reloadable("info");
        assert_eq!(level.current().as_deref(), Some("info"));
        level.set("warn").unwrap();
        assert_eq!(level.current().as_deref(), Some("warn"));

        drop(layer);
        assert!(level.set("debug").is_err());
    }

    #[test]
    fn file_appender_accepts_bare_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.log");
        assert!(file_appender(&path).is_ok());
        assert!(file_appender(Path::new("/")).is_err());
    }
}
