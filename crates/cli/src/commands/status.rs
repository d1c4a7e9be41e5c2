// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pj status` - ask the master for a fresh report and print it

use crate::daemon_process::{request_status, running_master};
use crate::output::{print_result, OutputFormat};
use crate::poll::{wait_until, Tick};
use anyhow::Result;
use pj_core::format_elapsed;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// A report older than this was not written for this request.
pub const FRESH_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The master answered with a new report
    Fresh,
    /// The master is alive but the report did not refresh in time
    Stale,
    NotRunning,
}

impl Freshness {
    fn as_str(self) -> &'static str {
        match self {
            Freshness::Fresh => "running",
            Freshness::Stale => "stale",
            Freshness::NotRunning => "not_running",
        }
    }
}

/// Age of the file's last write; `None` when missing.
pub fn file_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(SystemTime::now().duration_since(modified).unwrap_or_default())
}

fn is_fresh(path: &Path) -> bool {
    file_age(path).is_some_and(|age| age < FRESH_WINDOW)
}

/// Line printed above a report that is not current.
pub fn banner(freshness: Freshness, pid: Option<u32>, age: Option<Duration>) -> Option<String> {
    let age = age.map(|a| format_elapsed(a.as_secs()));
    match (freshness, pid, age) {
        (Freshness::Fresh, _, _) => None,
        (Freshness::Stale, Some(pid), Some(age)) => Some(format!(
            "pjd (pid {pid}) did not refresh its status; showing report from {age} ago"
        )),
        (Freshness::Stale, Some(pid), None) => {
            Some(format!("pjd (pid {pid}) did not write a status report"))
        }
        (_, _, Some(age)) => Some(format!(
            "pjd not running; showing last report from {age} ago"
        )),
        (_, _, None) => Some("pjd not running".to_string()),
    }
}

pub async fn status(config_path: &Path, format: OutputFormat) -> Result<()> {
    let (_, paths) = super::load(config_path)?;

    let pid = running_master(&paths);
    let freshness = match pid {
        Some(pid) if request_status(pid) => {
            let tick = wait_until(
                crate::env::poll_interval(),
                crate::env::timeout_status(),
                || is_fresh(&paths.status_file),
            )
            .await;
            if tick == Tick::Ready {
                Freshness::Fresh
            } else {
                Freshness::Stale
            }
        }
        Some(_) => Freshness::Stale,
        None => Freshness::NotRunning,
    };

    let report = std::fs::read_to_string(&paths.status_file).ok();
    let age = file_age(&paths.status_file);

    print_result(
        format,
        || {
            let mut out = String::new();
            if let Some(line) = banner(freshness, pid, age) {
                out.push_str(&line);
                if report.is_some() {
                    out.push_str("\n\n");
                }
            }
            if let Some(report) = &report {
                out.push_str(report.trim_end());
            }
            out
        },
        || {
            serde_json::json!({
                "status": freshness.as_str(),
                "pid": pid,
                "age_secs": age.map(|a| a.as_secs()),
                "report": report,
            })
        },
    )
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
