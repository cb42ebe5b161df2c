//! Logging setup
//!
//! The CLI prints its JSON results on stdout, so logs go either to a daily
//! rolling file in the XDG state dir (`wxreader.log`) or to stderr.
//! `RUST_LOG` overrides the configured level.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "wxreader.log";

/// Where log records are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Rolling file under [`Config::state_dir`]
    File,
    /// Standard error, for interactive `-v` runs
    Stderr,
}

/// Keeps the background log writer alive; flushes pending records on drop.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// Installing twice is not an error: the second call leaves the first
/// subscriber in place.
pub fn init(config: &LoggingConfig, target: LogTarget) -> Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match target {
        LogTarget::File => {
            let log_dir = Config::state_dir();
            std::fs::create_dir_all(&log_dir)?;

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .max_log_files(config.max_files.max(1))
                .build(&log_dir)
                .map_err(|e| Error::Config(format!("cannot create log file in {}: {}", log_dir.display(), e)))?;
            let (writer, worker) = tracing_appender::non_blocking(appender);

            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();

            tracing::debug!(log_dir = %log_dir.display(), level = %config.level, "File logging enabled");
            Ok(LoggingGuard {
                _worker: Some(worker),
            })
        }
        LogTarget::Stderr => {
            let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
            let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
            Ok(LoggingGuard { _worker: None })
        }
    }
}

/// Route logs to the test harness's captured output.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Path of the current log file.
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path() {
        let path = log_file_path();
        assert!(path.ends_with("wxreader/wxreader.log"));
    }
}
