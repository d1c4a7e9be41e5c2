// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker kinds, counters, and the per-pid status record.

use crate::stats::WorkerTotals;
use crate::Disposition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a worker's slot in the pool is managed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkerKind {
    /// Fixed pool member, respawned on crash while the master runs
    Static,
    /// Elastic pool member, spawned on backlog and retired when idle
    Dynamic,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerKind::Static => f.write_str("STATIC"),
            WorkerKind::Dynamic => f.write_str("DYNAMIC"),
        }
    }
}

/// Activity state reported in a worker's status file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkerState {
    Running,
    Idle,
}

/// Counters a worker accumulates over its lifetime.
///
/// Cost is kept in whole microseconds so that a persisted record reads
/// back exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounters {
    pub done: u64,
    pub failed: u64,
    pub ack: u64,
    pub reject: u64,
    pub repush: u64,
    /// Total consume time of settled messages
    pub cost_us: u64,
}

impl WorkerCounters {
    /// Count a settled message and its consume time.
    pub fn record(&mut self, disposition: Disposition, cost_us: u64) {
        self.done += 1;
        match disposition {
            Disposition::Ack => self.ack += 1,
            Disposition::Reject => self.reject += 1,
            Disposition::Repush => self.repush += 1,
        }
        self.cost_us = self.cost_us.saturating_add(cost_us);
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }
}

/// Snapshot a worker writes to `workers/{pid}.info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatusRecord {
    pub pid: u32,
    pub topic: String,
    pub kind: WorkerKind,
    pub status: WorkerState,
    pub now: DateTime<Utc>,
    pub begin: DateTime<Utc>,
    /// Last time a message was received
    pub last: DateTime<Utc>,
    pub counters: WorkerCounters,
    /// Wall time since the worker started
    pub duration_ms: u64,
}

impl WorkerStatusRecord {
    pub fn totals(&self) -> WorkerTotals {
        WorkerTotals {
            done: self.counters.done,
            failed: self.counters.failed,
            ack: self.counters.ack,
            reject: self.counters.reject,
            repush: self.counters.repush,
            duration_ms: self.duration_ms,
            cost_us: self.counters.cost_us,
        }
    }
}

/// Convert epoch milliseconds to a UTC timestamp, clamping out-of-range
/// values to the epoch.
pub fn utc_from_epoch_ms(ms: u64) -> DateTime<Utc> {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
