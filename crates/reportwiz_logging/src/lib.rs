//! Shared logging utilities for reportwiz binaries.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEFAULT_LOG_FILTER: &str = "reportwiz=info,reportwiz_filters=info";
const VERBOSE_LOG_FILTER: &str = "reportwiz=debug,reportwiz_filters=debug,reportwiz_tape=debug";
const HOME_ENV: &str = "REPORTWIZ_HOME";

/// Logging configuration shared by reportwiz binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Write a daily rolling log file under [`logs_dir`]
    pub file: bool,
}

/// Keeps the non-blocking file writer alive. Drop it last.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize tracing with an optional daily rolling file and stderr output.
///
/// `RUST_LOG` overrides the default filter. If the log directory cannot be
/// created, logging continues on stderr only.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let mut guard = None;
    let file_layer = if config.file {
        match ensure_logs_dir() {
            Ok(log_dir) => {
                let appender = tracing_appender::rolling::daily(
                    log_dir,
                    format!("{}.log", sanitize_name(config.app_name)),
                );
                let (writer, worker) = tracing_appender::non_blocking(appender);
                guard = Some(worker);
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_filter(file_filter),
                )
            }
            Err(err) => {
                eprintln!("Warning: failed to create logs directory: {:#}", err);
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: guard })
}

/// Get the reportwiz home directory: ~/.reportwiz
pub fn reportwiz_home() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(override_path));
    }
    dirs::home_dir()
        .map(|home| home.join(".reportwiz"))
        .context("Could not determine home directory; set REPORTWIZ_HOME")
}

/// Get the logs directory: ~/.reportwiz/logs
pub fn logs_dir() -> Result<PathBuf> {
    Ok(reportwiz_home()?.join("logs"))
}

/// Get the tapes directory: ~/.reportwiz/tapes
pub fn tapes_dir() -> Result<PathBuf> {
    Ok(reportwiz_home()?.join("tapes"))
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir()?;
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
