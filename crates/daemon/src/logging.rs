// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log file setup shared by the master and its workers.

use pj_core::{LogConfig, LogRotation};
use std::fmt::Display;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;

pub const LOG_FILE_NAME: &str = "pj.log";

/// Startup marker prefix written to the log before anything else.
/// The CLI uses this to find where the current startup attempt begins.
/// Full format: "--- pjd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- pjd: starting (pid: ";

/// The unrotated log file; startup markers and errors always land here.
pub fn log_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE_NAME)
}

/// Append the startup marker, creating the log directory if needed.
pub fn write_startup_marker(dir: &Path, pid: u32) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut file = open_append(&log_path(dir))?;
    writeln!(file, "{STARTUP_MARKER_PREFIX}{pid}) ---")
}

/// Write a startup error synchronously; the non-blocking writer may not
/// flush before the process exits.
pub fn write_startup_error(dir: &Path, error: &dyn Display) {
    let Ok(mut file) = open_append(&log_path(dir)) else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start master: {error}");
}

fn open_append(path: &Path) -> io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}

fn appender(dir: &Path, rotation: LogRotation) -> RollingFileAppender {
    match rotation {
        LogRotation::Never => tracing_appender::rolling::never(dir, LOG_FILE_NAME),
        LogRotation::Daily => tracing_appender::rolling::daily(dir, LOG_FILE_NAME),
        LogRotation::Hourly => tracing_appender::rolling::hourly(dir, LOG_FILE_NAME),
    }
}

/// Install the global subscriber writing to `<dir>/pj.log`.
///
/// `RUST_LOG` overrides the configured level. Keep the guard alive for the
/// life of the process or buffered lines are lost.
pub fn setup_logging(dir: &Path, config: &LogConfig) -> io::Result<WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(appender(dir, config.rotation));

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
