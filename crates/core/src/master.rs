// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master state and the record it publishes to workers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seconds between master heartbeats in the shared table.
///
/// Workers treat a RUNNING record older than `REFRESH_TABLE_CYCLE + 3`
/// seconds as suspect and probe the master pid.
pub const REFRESH_TABLE_CYCLE: u64 = 30;

/// Maximum byte length of the process name stored in the table.
pub const MAX_NAME_LEN: usize = 32;

/// Master supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MasterStatus {
    /// Accepting work and spawning workers
    Running,
    /// Draining: no new workers, waiting for live workers to exit
    Wait,
    /// Terminal
    Stopped,
}

impl MasterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasterStatus::Running => "RUNNING",
            MasterStatus::Wait => "WAIT",
            MasterStatus::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for MasterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MasterStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(MasterStatus::Running),
            "WAIT" => Ok(MasterStatus::Wait),
            "STOPPED" => Ok(MasterStatus::Stopped),
            other => Err(format!("unknown master status: {other}")),
        }
    }
}

/// The single record the master keeps in the shared table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterRecord {
    pub pid: u32,
    pub name: String,
    pub status: MasterStatus,
    /// Epoch seconds of the last write
    pub modified: i64,
}

impl MasterRecord {
    /// Build a record, truncating the name to [`MAX_NAME_LEN`] bytes on a
    /// character boundary so the record stays fixed-size.
    pub fn new(pid: u32, name: &str, status: MasterStatus, modified: i64) -> Self {
        Self {
            pid,
            name: truncate_name(name).to_string(),
            status,
            modified,
        }
    }

    /// True when the record claims RUNNING but has not been refreshed
    /// within the heartbeat grace window.
    pub fn is_stale(&self, now_secs: i64) -> bool {
        self.status == MasterStatus::Running
            && now_secs - self.modified > (REFRESH_TABLE_CYCLE + 3) as i64
    }
}

fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

#[cfg(test)]
#[path = "master_tests.rs"]
mod tests;
