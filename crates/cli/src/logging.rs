//! Per-invocation logging.
//!
//! Every run logs to the console and to `dmfo.log` in a private temporary
//! directory. The directory is discarded after a clean run (exit code 0 or
//! 1) and kept for inspection otherwise.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use dmfo_core::config::LogLevel;

/// Overrides the console level with a full `EnvFilter` directive.
pub const LOG_ENV: &str = "DMFO_LOG";

const LOG_FILE_NAME: &str = "dmfo.log";

/// Handle on the log directory; keep it alive for the whole run.
pub struct LogSession {
    dir: Option<TempDir>,
    guard: Option<WorkerGuard>,
}

/// Install the console and file layers for a run of `command`.
pub fn init(command: &str, console: LogLevel, file: LogLevel) -> Result<LogSession> {
    let dir = tempfile::Builder::new()
        .prefix(&format!("dmfo_{command}_"))
        .tempdir()
        .context("failed to create log directory")?;

    let appender = tracing_appender::rolling::never(dir.path(), LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let console_filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(console.as_directive()));
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(EnvFilter::new(file.as_directive()));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(LogSession {
        dir: Some(dir),
        guard: Some(guard),
    })
}

impl LogSession {
    pub fn log_file(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.path().join(LOG_FILE_NAME))
    }

    /// Flush the file log, then remove the directory for clean exits.
    ///
    /// Returns the retained log file for any other exit code.
    pub fn finish(mut self, exit_code: u8) -> Option<PathBuf> {
        drop(self.guard.take());
        let dir = self.dir.take()?;

        if exit_code <= 1 {
            if let Err(e) = dir.close() {
                eprintln!("could not remove log directory: {e}");
            }
            return None;
        }
        let kept: PathBuf = dir.keep();
        Some(kept.join(LOG_FILE_NAME))
    }
}
