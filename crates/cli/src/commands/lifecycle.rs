// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pj start|stop|restart|revive` - master lifecycle

use crate::daemon_process::{
    launch, request_stop, run_foreground, running_master, wait_for_exit, wait_for_start,
    DaemonError,
};
use crate::output::{print_result, OutputFormat};
use anyhow::{anyhow, Result};
use pj_core::Config;
use pj_daemon::lifecycle::check_config;
use pj_daemon::{DataPaths, Registries};
use std::path::Path;

pub async fn start(config_path: &Path, foreground: bool, format: OutputFormat) -> Result<()> {
    let (config, paths) = super::load(config_path)?;
    check_config(&config, &Registries::builtin())?;
    if let Some(pid) = running_master(&paths) {
        return Err(DaemonError::AlreadyRunning(pid).into());
    }

    if foreground {
        let status = run_foreground(config_path)?;
        if !status.success() {
            return Err(anyhow!("pjd exited with status: {status}"));
        }
        return Ok(());
    }

    let pid = launch_and_wait(config_path, &config, &paths).await?;
    report(format, "started", Some(pid))
}

pub async fn stop(config_path: &Path, format: OutputFormat) -> Result<()> {
    let (_, paths) = super::load(config_path)?;
    match stop_master(&paths).await? {
        Some(pid) => report(format, "stopped", Some(pid)),
        None => report(format, "not_running", None),
    }
}

pub async fn restart(config_path: &Path, format: OutputFormat) -> Result<()> {
    let (config, paths) = super::load(config_path)?;
    check_config(&config, &Registries::builtin())?;
    stop_master(&paths).await?;
    let pid = launch_and_wait(config_path, &config, &paths).await?;
    report(format, "restarted", Some(pid))
}

/// Start the master only if it is not already running.
pub async fn revive(config_path: &Path, format: OutputFormat) -> Result<()> {
    let (config, paths) = super::load(config_path)?;
    if let Some(pid) = running_master(&paths) {
        return report(format, "running", Some(pid));
    }
    check_config(&config, &Registries::builtin())?;
    let pid = launch_and_wait(config_path, &config, &paths).await?;
    report(format, "started", Some(pid))
}

/// Signal the master to drain and wait for it to exit. Returns the pid it
/// stopped, or `None` when nothing was running.
async fn stop_master(paths: &DataPaths) -> Result<Option<u32>, DaemonError> {
    let Some(pid) = running_master(paths) else {
        return Ok(None);
    };
    request_stop(pid)?;
    wait_for_exit(paths, pid, crate::env::timeout_exit()).await?;
    Ok(Some(pid))
}

async fn launch_and_wait(
    config_path: &Path,
    config: &Config,
    paths: &DataPaths,
) -> Result<u32, DaemonError> {
    let mut child = launch(config_path)?;
    wait_for_start(paths, &config.log_dir(), &mut child, crate::env::timeout_start()).await
}

fn report(format: OutputFormat, status: &str, pid: Option<u32>) -> Result<()> {
    print_result(
        format,
        || status_line(status, pid),
        || serde_json::json!({ "status": status, "pid": pid }),
    )
}

fn status_line(status: &str, pid: Option<u32>) -> String {
    match (status, pid) {
        ("not_running", _) => "pjd not running".to_string(),
        ("running", Some(pid)) => format!("pjd already running (pid {pid})"),
        (status, Some(pid)) => format!("pjd {status} (pid {pid})"),
        (status, None) => format!("pjd {status}"),
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
