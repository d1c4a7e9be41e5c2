// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status report text and the size-capped ghost history.

use crate::paths::write_atomic;
use chrono::{DateTime, Local};
use pj_core::{format_uptime, JobSummary, MasterStatus};
use std::fmt::Write as _;
use std::io;
use std::path::Path;

/// Largest the ghost file may grow to.
pub const GHOST_FILE_CAP: u64 = 10 * 1024 * 1024;

const RULE_WIDTH: usize = 150;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const COLUMNS: [&str; 10] = [
    "Topic",
    "Queue",
    "Workers",
    "HistoryWorker",
    "AvgConsumerTime",
    "Done",
    "Ack",
    "Reject",
    "Repush",
    "Failed",
];
const COLUMN_WIDTHS: [usize; 9] = [25, 10, 10, 15, 20, 12, 12, 12, 12];

pub struct ReportInput<'a> {
    pub process_name: &'a str,
    pub version: &'a str,
    pub started: DateTime<Local>,
    pub now: DateTime<Local>,
    pub load_average: &'a str,
    pub memory: &'a str,
    pub master_pid: u32,
    pub status: MasterStatus,
    /// Workers the master has registered
    pub registered_workers: usize,
    pub jobs: &'a [JobSummary],
}

/// First line of every report; also separates snapshots in the ghost file.
pub fn header_line() -> String {
    format!("{:-^width$}", " Status ", width = RULE_WIDTH)
}

pub fn render(input: &ReportInput<'_>) -> String {
    let mut out = String::new();
    let uptime = (input.now - input.started).num_seconds().max(0) as u64;
    // Workers whose status file could be read
    let reporting: usize = input.jobs.iter().map(|j| j.workers).sum();

    let _ = writeln!(out, "{}", header_line());
    let _ = writeln!(out, "# System");
    let _ = writeln!(out, "Process name: \t\t{}", input.process_name);
    let _ = writeln!(out, "Version: \t\t{}", input.version);
    let _ = writeln!(out);

    let _ = writeln!(out, "# Runtime");
    let _ = writeln!(out, "Start: \t\t\t{}", input.started.format(TIME_FORMAT));
    let _ = writeln!(out, "Now: \t\t\t{}", input.now.format(TIME_FORMAT));
    let _ = writeln!(out, "Duration: \t\t{}", format_uptime(uptime));
    let _ = writeln!(out, "Loadavg: \t\t{}", input.load_average);
    let _ = writeln!(out, "Memory used: \t\t{}", input.memory);
    let _ = writeln!(out);

    let _ = writeln!(out, "# Master");
    let _ = writeln!(out, "Pid: \t\t\t{}", input.master_pid);
    let _ = writeln!(out, "Status: \t\t{}", input.status);
    let _ = writeln!(out, "Register Workers: \t{}", input.registered_workers);
    let _ = writeln!(out, "Real Workers: \t\t{}", reporting);
    let _ = writeln!(out);

    let _ = writeln!(out, "# Jobs");
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    let _ = writeln!(out, "{}", format_row(&COLUMNS.map(String::from)));
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    for job in input.jobs {
        let _ = writeln!(out, "{}", format_row(&job_row(job)));
    }
    out
}

fn job_row(job: &JobSummary) -> [String; 10] {
    let avg = job
        .totals
        .avg_cost_secs()
        .map(|secs| format!("{}s", round4(secs)))
        .unwrap_or_else(|| "-".to_string());
    [
        job.topic.clone(),
        job.backlog
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string()),
        job.workers.to_string(),
        job.history_workers.to_string(),
        avg,
        job.totals.done.to_string(),
        job.totals.ack.to_string(),
        job.totals.reject.to_string(),
        job.totals.repush.to_string(),
        job.totals.failed.to_string(),
    ]
}

/// Pad each cell to its column width, or to its own length plus two when
/// it does not fit. The last column is not padded.
fn format_row(cells: &[String]) -> String {
    let mut row = String::new();
    for (i, cell) in cells.iter().enumerate() {
        let width = match COLUMN_WIDTHS.get(i) {
            Some(&w) if cell.len() <= w => w,
            Some(_) => cell.len() + 2,
            None => cell.len(),
        };
        let _ = write!(row, "{cell:<width$}");
    }
    row
}

/// Shortest decimal form of `value` rounded to four places.
fn round4(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    let text = format!("{rounded:.4}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Append a report to the ghost file, first dropping whole oldest
/// snapshots until the file stays within `cap` bytes.
pub fn append_ghost(path: &Path, report: &str, cap: u64) -> io::Result<()> {
    let entry = format!("\n\n{report}");
    let existing = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e),
    };
    let budget = cap.saturating_sub(entry.len() as u64);
    let kept = trim_to_fit(&existing, budget);

    let mut content = Vec::with_capacity(kept.len() + entry.len());
    content.extend_from_slice(kept);
    content.extend_from_slice(entry.as_bytes());
    write_atomic(path, &content)
}

/// Longest suffix of `existing` that starts at a snapshot boundary and
/// fits in `budget` bytes. Works on raw bytes so a damaged file still
/// trims instead of failing every later append.
fn trim_to_fit(existing: &[u8], budget: u64) -> &[u8] {
    if existing.len() as u64 <= budget {
        return existing;
    }
    let marker = format!("\n\n{}", header_line());
    let marker = marker.as_bytes();
    let mut search_from = 1;
    while let Some(rest) = existing.get(search_from..) {
        let Some(pos) = rest.windows(marker.len()).position(|w| w == marker) else {
            break;
        };
        let start = search_from + pos;
        if (existing.len() - start) as u64 <= budget {
            return &existing[start..];
        }
        search_from = start + 1;
    }
    &[]
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
