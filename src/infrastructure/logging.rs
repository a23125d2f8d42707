//! Logging system configuration and initialization
//!
//! Sets up a `tracing` registry with:
//! - Console output
//! - A full log file
//! - An error-only log file kept for postmortems
//!
//! The non-blocking writer guards are handed back to the caller, who keeps
//! them alive for the lifetime of the process.

use anyhow::{Result, anyhow};
use chrono::Local;
use std::path::Path;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

/// Keeps the file writers flushing; drop only at shutdown
#[must_use = "dropping the guards stops file logging"]
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Local-time timestamps, `2024-01-31 12:00:00`
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Build the level filter; `RUST_LOG` wins over the configured level
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(level);

        // HTTP internals only show on TRACE
        if !level.to_lowercase().contains("trace") {
            for directive in ["reqwest=info", "hyper=warn", "hyper_util=warn", "h2=warn", "html5ever=warn"] {
                if let Ok(directive) = directive.parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }
        filter
    })
}

/// Initialize logging with the given configuration
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuards> {
    if !config.console_output && !config.file_output {
        return Err(anyhow!("No logging output configured"));
    }

    let mut guards = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.file_output {
        let log_dir: &Path = &config.log_dir;
        std::fs::create_dir_all(log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;

        let (file_writer, file_guard) = non_blocking(rolling::never(log_dir, &config.log_file_name));
        guards.push(file_guard);
        layers.push(
            fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .with_ansi(false)
                .with_filter(build_filter(&config.level))
                .boxed(),
        );

        let (error_writer, error_guard) =
            non_blocking(rolling::never(log_dir, &config.error_log_file_name));
        guards.push(error_guard);
        layers.push(
            fmt::Layer::new()
                .with_writer(error_writer)
                .with_timer(LocalTimeFormatter)
                .with_target(true)
                .with_ansi(false)
                .with_filter(LevelFilter::ERROR)
                .boxed(),
        );
    }

    if config.console_output {
        layers.push(
            fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .with_filter(build_filter(&config.level))
                .boxed(),
        );
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log directory: {:?}", config.log_dir);
    }

    Ok(LogGuards { _guards: guards })
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== Directory Crawler System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);
    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(!config.level.is_empty());
        assert!(config.console_output);
        assert!(config.file_output);
        assert_ne!(config.log_file_name, config.error_log_file_name);
    }

    #[test]
    fn no_output_is_rejected() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging(&config).is_err());
    }
}
