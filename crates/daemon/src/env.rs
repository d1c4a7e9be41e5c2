// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Config file: PJ_CONFIG > ./pj.toml
pub fn config_path() -> PathBuf {
    std::env::var("PJ_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pj.toml"))
}

/// Elastic scaling check cadence
pub fn scale_interval() -> Duration {
    parse_duration_ms("PJ_SCALE_INTERVAL_MS").unwrap_or(Duration::from_secs(5))
}

/// Shared table heartbeat cadence
pub fn table_refresh_interval() -> Duration {
    parse_duration_ms("PJ_TABLE_REFRESH_MS")
        .unwrap_or(Duration::from_secs(pj_core::REFRESH_TABLE_CYCLE))
}

/// Status report + pid file check cadence
pub fn status_interval() -> Duration {
    parse_duration_ms("PJ_STATUS_INTERVAL_MS").unwrap_or(Duration::from_secs(60))
}

/// Alert scan cadence
pub fn notify_interval() -> Duration {
    parse_duration_ms("PJ_NOTIFY_INTERVAL_MS").unwrap_or(Duration::from_secs(300))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
