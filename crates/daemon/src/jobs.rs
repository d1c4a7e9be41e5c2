// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-topic worker pool.
//!
//! A [`Jobs`] owns the topic's live worker table, the totals folded in from
//! retired workers, and the alert edge-detection state. It never starts
//! processes itself: the master passes a spawn function that does.

use crate::master::SpawnError;
use crate::paths::DataPaths;
use crate::status_file::read_worker_status;
use pj_adapters::Queue;
use pj_core::{
    AlertState, HistorySummary, JobConfig, JobSummary, PluginConfig, SummaryError, WorkerKind,
    WorkerTotals,
};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Starts one worker for a topic and returns its pid.
pub type SpawnFn<'a> =
    dyn FnMut(&JobConfig, &PluginConfig, WorkerKind) -> Result<u32, SpawnError> + 'a;

/// A live worker as the master knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerHandle {
    pub pid: u32,
    pub kind: WorkerKind,
}

pub struct Jobs {
    config: JobConfig,
    queue_plugin: PluginConfig,
    /// Master-side connection used only for backlog checks
    queue: Box<dyn Queue>,
    workers: HashMap<u32, WorkerHandle>,
    history: HistorySummary,
    alerts: AlertState,
    paths: DataPaths,
}

impl Jobs {
    pub fn new(
        config: JobConfig,
        queue_plugin: PluginConfig,
        queue: Box<dyn Queue>,
        paths: DataPaths,
    ) -> Self {
        Self {
            config,
            queue_plugin,
            queue,
            workers: HashMap::new(),
            history: HistorySummary::default(),
            alerts: AlertState::default(),
            paths,
        }
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn history(&self) -> &HistorySummary {
        &self.history
    }

    pub fn live_workers(&self) -> usize {
        self.workers.len()
    }

    /// Live pids, sorted.
    pub fn live_pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.workers.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn has_worker(&self, pid: u32) -> bool {
        self.workers.contains_key(&pid)
    }

    pub fn worker(&self, pid: u32) -> Option<&WorkerHandle> {
        self.workers.get(&pid)
    }

    /// Start the fixed pool. Stops at the first failure.
    pub fn create_static_workers(&mut self, spawn: &mut SpawnFn<'_>) -> Result<(), SpawnError> {
        for _ in 0..self.config.static_workers {
            self.spawn_worker(WorkerKind::Static, spawn)?;
        }
        Ok(())
    }

    /// Top the pool up to its ceiling when the backlog is above the health
    /// size. Failures are logged, never returned. Returns how many workers
    /// were started.
    pub async fn create_dynamic_workers(&mut self, spawn: &mut SpawnFn<'_>) -> usize {
        let health = self.config.queue_health_size;
        if health == 0 {
            return 0;
        }
        let Some(backlog) = self.backlog().await else {
            return 0;
        };
        if backlog <= health {
            return 0;
        }

        let mut started = 0;
        while self.workers.len() < self.config.ceiling() {
            match self.spawn_worker(WorkerKind::Dynamic, spawn) {
                Ok(_) => started += 1,
                Err(e) => {
                    error!(topic = %self.config.topic, error = %e, "failed to spawn dynamic worker");
                    break;
                }
            }
        }
        if started > 0 {
            info!(topic = %self.config.topic, backlog, started, "scaled up");
        }
        started
    }

    /// Start one worker and register it.
    pub fn spawn_worker(
        &mut self,
        kind: WorkerKind,
        spawn: &mut SpawnFn<'_>,
    ) -> Result<u32, SpawnError> {
        let pid = spawn(&self.config, &self.queue_plugin, kind)?;
        self.mount_worker(WorkerHandle { pid, kind });
        info!(topic = %self.config.topic, pid, %kind, "worker started");
        Ok(pid)
    }

    pub fn mount_worker(&mut self, handle: WorkerHandle) {
        self.workers.insert(handle.pid, handle);
    }

    /// Deregister a worker and fold its final counters into history. The
    /// status file is consumed so the counters are counted exactly once.
    pub fn unmount_worker(&mut self, pid: u32) -> Option<WorkerHandle> {
        let handle = self.workers.remove(&pid)?;
        let path = self.paths.worker_status(pid);

        match read_worker_status(&path) {
            Ok(record) => self.history.retire(Some(&record.totals())),
            Err(e) => {
                warn!(topic = %self.config.topic, pid, error = %e, "final worker status unreadable");
                self.history.retire(None);
            }
        }
        if let Err(e) = std::fs::remove_file(&path) {
            debug!(pid, error = %e, "worker status file not removed");
        }
        Some(handle)
    }

    /// Actionable backlog, or `None` when the queue could not be asked.
    pub async fn backlog(&mut self) -> Option<u64> {
        match self.queue.size().await {
            Ok(size) => Some(size),
            Err(e) => {
                warn!(topic = %self.config.topic, error = %e, "failed to read queue size");
                None
            }
        }
    }

    /// Live plus historical totals. A live worker whose status file cannot
    /// be read is listed in `errors` instead of counting as zero.
    pub async fn worker_summary(&mut self) -> JobSummary {
        let backlog = self.backlog().await;
        let mut totals = WorkerTotals::default();
        let mut errors = Vec::new();
        let mut workers = 0;

        for pid in self.live_pids() {
            match read_worker_status(&self.paths.worker_status(pid)) {
                Ok(record) => {
                    workers += 1;
                    totals.add(&record.totals());
                }
                Err(e) => errors.push(SummaryError {
                    pid,
                    reason: e.to_string(),
                }),
            }
        }
        totals.add(&self.history.totals);

        JobSummary {
            topic: self.config.topic.clone(),
            backlog,
            workers,
            history_workers: self.history.workers,
            totals,
            errors,
        }
    }

    /// Alert lines raised since the last check.
    pub async fn trigger_notification(&mut self) -> Vec<String> {
        let summary = self.worker_summary().await;
        self.alerts
            .check(self.config.queue_health_size, summary.backlog, &summary.totals)
    }

    pub async fn close(&mut self) {
        self.queue.close().await;
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
