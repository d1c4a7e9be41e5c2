// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-topic statistics: live and retired worker totals, plus alert
//! edge detection.

use serde::{Deserialize, Serialize};

/// Summed counters across one or more workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerTotals {
    pub done: u64,
    pub failed: u64,
    pub ack: u64,
    pub reject: u64,
    pub repush: u64,
    pub duration_ms: u64,
    pub cost_us: u64,
}

impl WorkerTotals {
    pub fn add(&mut self, other: &WorkerTotals) {
        self.done += other.done;
        self.failed += other.failed;
        self.ack += other.ack;
        self.reject += other.reject;
        self.repush += other.repush;
        self.duration_ms = self.duration_ms.saturating_add(other.duration_ms);
        self.cost_us = self.cost_us.saturating_add(other.cost_us);
    }

    /// Average consume time per settled message, in seconds.
    pub fn avg_cost_secs(&self) -> Option<f64> {
        if self.done == 0 {
            return None;
        }
        Some(self.cost_us as f64 / self.done as f64 / 1_000_000.0)
    }
}

/// Counters folded in from workers that have exited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    /// Number of workers retired
    pub workers: u64,
    pub totals: WorkerTotals,
}

impl HistorySummary {
    /// Fold a retired worker in. A worker whose final counters could not
    /// be read still counts as retired.
    pub fn retire(&mut self, totals: Option<&WorkerTotals>) {
        self.workers += 1;
        if let Some(totals) = totals {
            self.totals.add(totals);
        }
    }
}

/// Marker for a live worker whose status could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryError {
    pub pid: u32,
    pub reason: String,
}

/// Point-in-time view of one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub topic: String,
    /// Actionable backlog; `None` if the queue could not be asked
    pub backlog: Option<u64>,
    /// Live workers whose status file was readable
    pub workers: usize,
    pub history_workers: u64,
    /// Live plus historical totals
    pub totals: WorkerTotals,
    pub errors: Vec<SummaryError>,
}

/// Last values that raised an alert, used to fire only on growth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertState {
    pub backlog: u64,
    pub failed: u64,
    pub reject: u64,
    pub repush: u64,
}

impl AlertState {
    /// Compare current readings against the last alerted values and return
    /// one line per condition that fired.
    ///
    /// The backlog threshold is `max(2 * health_size, last backlog)` and the
    /// last backlog is replaced on every check. Counter thresholds move only
    /// when they fire. Backlog is skipped when `health_size` is zero or the
    /// queue could not be read.
    pub fn check(
        &mut self,
        health_size: u64,
        backlog: Option<u64>,
        totals: &WorkerTotals,
    ) -> Vec<String> {
        let mut alerts = Vec::new();

        if health_size > 0 {
            if let Some(backlog) = backlog {
                if backlog > health_size.saturating_mul(2).max(self.backlog) {
                    alerts.push(format!("queue backlog={backlog}"));
                }
                self.backlog = backlog;
            }
        }

        if totals.failed > self.failed {
            alerts.push(format!("failed messages={}", totals.failed));
            self.failed = totals.failed;
        }
        if totals.reject > self.reject {
            alerts.push(format!("rejected messages={}", totals.reject));
            self.reject = totals.reject;
        }
        if totals.repush > self.repush {
            alerts.push(format!("repushed messages={}", totals.repush));
            self.repush = totals.repush;
        }

        alerts
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
