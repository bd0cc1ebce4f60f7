//! Process-wide tracing setup for the binary
//!
//! The library itself never installs a subscriber; it only emits events
//! under the span it is given.

use crate::types::{AppError, Result};
use crate::utils::toml_config::{LogFormat, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber
///
/// Logs go to stderr in the configured format. With `file` set, JSON logs are
/// also written there through a non-blocking writer; keep the returned guard
/// alive until exit so buffered lines are flushed.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<Option<WorkerGuard>> {
    let level = if verbose { "debug" } else { config.level.as_str() };

    let stderr_layer: BoxedLayer = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter(level))
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter(level))
            .boxed(),
    };

    let mut layers = vec![stderr_layer];
    let mut guard = None;

    if let Some(path) = &config.file {
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| std::path::PathBuf::from("."));
        let file_name = path
            .file_name()
            .ok_or_else(|| AppError::Configuration(format!("invalid log file path: {}", path.display())))?;

        std::fs::create_dir_all(&directory).map_err(|e| {
            AppError::Configuration(format!("failed to create log directory {}: {}", directory.display(), e))
        })?;

        let appender = tracing_appender::rolling::never(&directory, file_name);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(filter(level))
                .boxed(),
        );
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| AppError::Configuration(format!("failed to initialise logging: {}", e)))?;

    Ok(guard)
}

/// `RUST_LOG` wins over the configured level
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
