// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon process management utilities.
//!
//! The master has no control socket: the CLI finds it through the pid file,
//! drives it with signals, and reads its progress from the data directory.

use crate::poll::{wait_until, Tick};
use pj_core::MasterStatus;
use pj_daemon::logging::{log_path, STARTUP_MARKER_PREFIX};
use pj_daemon::process::{process_exists, send_signal};
use pj_daemon::{read_pid, DataPaths, MasterTable};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("pjd is already running (pid {0})")]
    AlreadyRunning(u32),

    #[error("failed to launch {}: {source}", .path.display())]
    Launch {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("pjd failed to start: {0}")]
    StartFailed(String),

    #[error("pjd did not come up within {}s", .0.as_secs())]
    StartTimeout(Duration),

    #[error("pjd (pid {pid}) did not exit within {}s", .timeout.as_secs())]
    StopTimeout { pid: u32, timeout: Duration },

    #[error("could not signal pjd (pid {0})")]
    SignalFailed(u32),

    #[error("interrupted")]
    Interrupted,
}

/// Find the pjd binary
pub fn find_pjd_binary() -> PathBuf {
    if let Some(path) = crate::env::daemon_binary() {
        return PathBuf::from(path);
    }

    let current_exe = std::env::current_exe().ok();

    // Only trust CARGO_MANIFEST_DIR from a debug build of the CLI itself
    let is_debug_build = current_exe
        .as_ref()
        .and_then(|p| p.to_str())
        .is_some_and(|s| s.contains("target/debug"));

    if is_debug_build {
        if let Some(manifest_dir) = crate::env::cargo_manifest_dir() {
            let dev_path = PathBuf::from(manifest_dir)
                .parent()
                .and_then(|p| p.parent())
                .map(|p| p.join("target/debug/pjd"));
            if let Some(path) = dev_path {
                if path.exists() {
                    return path;
                }
            }
        }
    }

    if let Some(dir) = current_exe.as_ref().and_then(|exe| exe.parent()) {
        let sibling = dir.join("pjd");
        if sibling.exists() {
            return sibling;
        }
    }

    PathBuf::from("pjd")
}

/// Launch pjd detached: own process group, no inherited stdio.
pub fn launch(config: &Path) -> Result<Child, DaemonError> {
    let path = find_pjd_binary();
    Command::new(&path)
        .arg("-c")
        .arg(config)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(|source| DaemonError::Launch { path, source })
}

/// Run pjd attached to this terminal until it exits.
pub fn run_foreground(config: &Path) -> Result<ExitStatus, DaemonError> {
    let path = find_pjd_binary();
    Command::new(&path)
        .arg("-c")
        .arg(config)
        .status()
        .map_err(|source| DaemonError::Launch { path, source })
}

/// Pid of the live master recorded under `paths`, if any.
pub fn running_master(paths: &DataPaths) -> Option<u32> {
    read_pid(&paths.pid_file).filter(|&pid| process_exists(pid))
}

/// The master owns the pid file and has published a RUNNING record.
pub fn master_ready(paths: &DataPaths, pid: u32) -> bool {
    read_pid(&paths.pid_file) == Some(pid)
        && MasterTable::new(&paths.table_file)
            .read()
            .is_ok_and(|record| record.pid == pid && record.status == MasterStatus::Running)
}

/// The master released the pid file and its process is gone.
pub fn master_gone(paths: &DataPaths, pid: u32) -> bool {
    read_pid(&paths.pid_file) != Some(pid) && !process_exists(pid)
}

/// Begin a graceful drain (SIGUSR1).
pub fn request_stop(pid: u32) -> Result<(), DaemonError> {
    if send_signal(pid, "USR1") {
        Ok(())
    } else {
        Err(DaemonError::SignalFailed(pid))
    }
}

/// Ask the master to rewrite its status file (SIGUSR2).
pub fn request_status(pid: u32) -> bool {
    send_signal(pid, "USR2")
}

/// Wait for a freshly launched master to become ready, surfacing the
/// startup error from its log if it exits first.
pub async fn wait_for_start(
    paths: &DataPaths,
    log_dir: &Path,
    child: &mut Child,
    timeout: Duration,
) -> Result<u32, DaemonError> {
    let pid = child.id();
    let mut exited = None;
    let tick = wait_until(crate::env::poll_interval(), timeout, || {
        if master_ready(paths, pid) {
            return true;
        }
        if let Ok(Some(status)) = child.try_wait() {
            exited = Some(status);
            return true;
        }
        false
    })
    .await;

    if let Some(status) = exited {
        let reason =
            read_startup_error(log_dir).unwrap_or_else(|| format!("pjd exited with {status}"));
        return Err(DaemonError::StartFailed(reason));
    }
    match tick {
        Tick::Ready => Ok(pid),
        Tick::Timeout => Err(DaemonError::StartTimeout(timeout)),
        Tick::Interrupted => Err(DaemonError::Interrupted),
    }
}

/// Wait for the master to drain its workers and exit.
pub async fn wait_for_exit(
    paths: &DataPaths,
    pid: u32,
    timeout: Duration,
) -> Result<(), DaemonError> {
    match wait_until(crate::env::poll_interval(), timeout, || master_gone(paths, pid)).await {
        Tick::Ready => Ok(()),
        Tick::Timeout => Err(DaemonError::StopTimeout { pid, timeout }),
        Tick::Interrupted => Err(DaemonError::Interrupted),
    }
}

/// Read the log from the last startup marker, looking for errors.
pub fn read_startup_error(log_dir: &Path) -> Option<String> {
    let content = std::fs::read_to_string(log_path(log_dir)).ok()?;
    parse_startup_error(&content)
}

const FAILED_TO_START: &str = "Failed to start master: ";

/// Parse startup errors from log content (pure logic, no I/O).
fn parse_startup_error(content: &str) -> Option<String> {
    let start_pos = content.rfind(STARTUP_MARKER_PREFIX)?;

    // The same failure is written synchronously and through tracing
    let mut messages: Vec<&str> = Vec::new();
    for line in content[start_pos..].lines() {
        if let Some((_, message)) = line.split_once(FAILED_TO_START) {
            if !messages.contains(&message) {
                messages.push(message);
            }
        }
    }

    if messages.is_empty() {
        None
    } else {
        Some(messages.join("\n"))
    }
}

#[cfg(test)]
#[path = "daemon_process_tests.rs"]
mod tests;
