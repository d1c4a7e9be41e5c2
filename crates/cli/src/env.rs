// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI crate.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

// --- Daemon binary ---

pub fn daemon_binary() -> Option<String> {
    std::env::var("PJ_DAEMON_BINARY").ok().filter(|s| !s.is_empty())
}

pub fn cargo_manifest_dir() -> Option<String> {
    std::env::var("CARGO_MANIFEST_DIR").ok()
}

// --- Timeouts ---

/// How long `stop` waits for the master to drain and exit.
pub fn timeout_exit() -> Duration {
    parse_duration_ms("PJ_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(30))
}

/// How long `status` waits for a fresh status file.
pub fn timeout_status() -> Duration {
    parse_duration_ms("PJ_TIMEOUT_STATUS_MS").unwrap_or(Duration::from_secs(3))
}

/// How long `start` waits for the master to publish RUNNING. Covers the
/// 3s wait for a previous master plus queue connection retries.
pub fn timeout_start() -> Duration {
    parse_duration_ms("PJ_TIMEOUT_START_MS").unwrap_or(Duration::from_secs(10))
}

pub fn poll_interval() -> Duration {
    parse_duration_ms("PJ_POLL_MS").unwrap_or(Duration::from_millis(50))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
