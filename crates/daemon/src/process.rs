// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process probes and signals.
//!
//! Signals go through the `kill` utility so the crate stays free of
//! `unsafe` libc calls.

use std::process::{Command, Stdio};

/// Execute kill command with the given signal and PID
fn kill_signal(signal: &str, pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    Command::new("kill")
        .args([signal, &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check if a process with the given PID exists
pub fn process_exists(pid: u32) -> bool {
    kill_signal("-0", pid)
}

/// Send a named signal (`USR1`, `USR2`, `TERM`, ...)
pub fn send_signal(pid: u32, signal: &str) -> bool {
    kill_signal(&format!("-{signal}"), pid)
}

pub fn force_kill(pid: u32) -> bool {
    kill_signal("-9", pid)
}

/// 1/5/15 minute load average, or `-` where unavailable.
pub fn load_average() -> String {
    std::fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|s| parse_loadavg(&s))
        .unwrap_or_else(|| "-".to_string())
}

/// Resident set size of this process, or `-` where unavailable.
pub fn memory_usage() -> String {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|s| parse_vm_rss(&s))
        .unwrap_or_else(|| "-".to_string())
}

fn parse_loadavg(content: &str) -> Option<String> {
    let fields: Vec<&str> = content.split_whitespace().take(3).collect();
    if fields.len() < 3 {
        return None;
    }
    Some(fields.join(", "))
}

fn parse_vm_rss(content: &str) -> Option<String> {
    let line = content.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(format!("{:.2}M", kb as f64 / 1024.0))
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
