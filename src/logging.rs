//! Logging setup for Cabal
//!
//! Logs go to stderr and to daily-rotated files in the platform data
//! directory. Warnings and errors are also copied to a separate `error` log so
//! skipped extracts and broken lookups are easy to find after the fact.
//!
//! ## Usage
//!
//! ```no_run
//! use cabal::logging;
//!
//! logging::init()?;
//! tracing::info!("Ready");
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const APP_DIR: &str = "cabal";
const LOG_PREFIX: &str = "cabal";
const ERROR_LOG_PREFIX: &str = "error";

/// Log directory under the platform data directory
///
/// - Windows: `%APPDATA%/cabal/logs`
/// - macOS: `~/Library/Application Support/cabal/logs`
/// - Linux: `~/.local/share/cabal/logs`
///
/// # Errors
///
/// Fails when there is no data directory or it cannot be created.
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    let log_dir = base_dir.join(APP_DIR).join("logs");

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }

    Ok(log_dir)
}

fn appender(log_dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to create {prefix} log appender"))
}

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`.
///
/// The console layer writes to stderr so command output on stdout stays
/// machine-readable.
///
/// # Errors
///
/// Fails if the log directory or the file appenders cannot be created.
pub fn init() -> Result<()> {
    let log_dir = get_log_dir()?;
    let all_logs_appender = appender(&log_dir, LOG_PREFIX)?;
    let error_logs_appender = appender(&log_dir, ERROR_LOG_PREFIX)?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("A global subscriber is already installed")?;

    tracing::info!("Logging initialized, log directory: {}", log_dir.display());
    Ok(())
}

/// Console-only fallback for when the log directory is unusable.
pub fn init_console() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Ignored: a subscriber may already be installed.
    let _ignored: std::result::Result<(), _> = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Path of today's main log file
///
/// # Errors
///
/// See [`get_log_dir`].
pub fn get_current_log_path() -> Result<PathBuf> {
    let log_dir = get_log_dir()?;
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    Ok(log_dir.join(format!("{LOG_PREFIX}.{today}.log")))
}

/// Path of today's warning and error log file
///
/// # Errors
///
/// See [`get_log_dir`].
pub fn get_current_error_log_path() -> Result<PathBuf> {
    let log_dir = get_log_dir()?;
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    Ok(log_dir.join(format!("{ERROR_LOG_PREFIX}.{today}.log")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_paths_share_directory() -> Result<()> {
        let Ok(log_dir) = get_log_dir() else {
            // No data directory in this environment.
            return Ok(());
        };
        assert!(log_dir.ends_with("cabal/logs") || log_dir.ends_with("cabal\\logs"));

        let main_log = get_current_log_path()?;
        let error_log = get_current_error_log_path()?;
        assert_eq!(main_log.parent(), Some(log_dir.as_path()));
        assert_eq!(error_log.parent(), Some(log_dir.as_path()));
        assert!(
            main_log
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with("cabal."))
        );
        Ok(())
    }
}
