// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process runtime.
//!
//! A worker owns one queue connection and one consumer. It polls the
//! shared master table to learn whether it should keep going, consumes one
//! message at a time, and periodically persists its counters to
//! `workers/{pid}.info` for the master to aggregate.

mod spec;

pub use spec::{WorkerSpec, WORKER_SPEC_ENV};

use crate::process::process_exists;
use crate::status_file::write_worker_status;
use crate::table::MasterTable;
use pj_adapters::{Consumer, Queue, QueueError, POP_TIMEOUT};
use pj_core::worker::utc_from_epoch_ms;
use pj_core::{
    Clock, Disposition, MasterStatus, Message, WorkerCounters, WorkerKind, WorkerLimits,
    WorkerState, WorkerStatusRecord,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Cadences of the worker loop.
#[derive(Debug, Clone, Copy)]
pub struct WorkerTiming {
    /// How often the master table is re-read
    pub status_refresh: Duration,
    /// How often counters are persisted
    pub save_interval: Duration,
    /// Idle time after which the worker reports IDLE and naps
    pub idle_threshold: Duration,
    pub idle_nap: Duration,
    pub pop_timeout: Duration,
}

impl Default for WorkerTiming {
    fn default() -> Self {
        Self {
            status_refresh: Duration::from_millis(500),
            save_interval: Duration::from_secs(5),
            idle_threshold: Duration::from_secs(60),
            idle_nap: Duration::from_secs(2),
            pop_timeout: POP_TIMEOUT,
        }
    }
}

/// Liveness probe for the master pid.
pub type AliveProbe = Arc<dyn Fn(u32) -> bool + Send + Sync>;

pub struct WorkerRuntime<C: Clock> {
    pid: u32,
    topic: String,
    kind: WorkerKind,
    limits: WorkerLimits,
    master_pid: u32,
    queue: Box<dyn Queue>,
    consumer: Arc<dyn Consumer>,
    table: MasterTable,
    status_path: PathBuf,
    clock: C,
    timing: WorkerTiming,
    alive: AliveProbe,
    counters: WorkerCounters,
    master_status: MasterStatus,
    started: Instant,
    started_ms: u64,
    last_active: Instant,
    last_active_ms: u64,
    last_refresh: Option<Instant>,
    last_save: Option<Instant>,
}

impl<C: Clock> WorkerRuntime<C> {
    pub fn new(
        pid: u32,
        spec: &WorkerSpec,
        queue: Box<dyn Queue>,
        consumer: Arc<dyn Consumer>,
        clock: C,
    ) -> Self {
        let started = clock.now();
        let started_ms = clock.epoch_ms();
        Self {
            pid,
            topic: spec.topic.clone(),
            kind: spec.kind,
            limits: spec.limits,
            master_pid: spec.master_pid,
            queue,
            consumer,
            table: MasterTable::new(&spec.paths.table_file),
            status_path: spec.paths.worker_status(pid),
            clock,
            timing: WorkerTiming::default(),
            alive: Arc::new(process_exists),
            counters: WorkerCounters::default(),
            master_status: MasterStatus::Stopped,
            started,
            started_ms,
            last_active: started,
            last_active_ms: started_ms,
            last_refresh: None,
            last_save: None,
        }
    }

    pub fn with_timing(mut self, timing: WorkerTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_alive_probe(mut self, alive: AliveProbe) -> Self {
        self.alive = alive;
        self
    }

    pub fn counters(&self) -> &WorkerCounters {
        &self.counters
    }

    pub fn master_status(&self) -> MasterStatus {
        self.master_status
    }

    /// Consume until the exit policy says stop, then persist final counters.
    pub async fn run(&mut self) {
        info!(kind = %self.kind, "worker started");

        loop {
            self.maybe_refresh_master_status();
            let keep_going = self.should_continue();

            if keep_going {
                if let Err(e) = self.run_once().await {
                    error!(error = %e, "queue failed, worker exiting");
                    break;
                }
            }

            if self.due(self.last_save, self.timing.save_interval) {
                self.save_status();
            }

            if !keep_going {
                break;
            }

            if self.idle_time() > self.timing.idle_threshold {
                self.nap().await;
            }
        }

        self.save_status();
        self.queue.close().await;
        info!(
            done = self.counters.done,
            failed = self.counters.failed,
            master = %self.master_status,
            "worker exiting"
        );
    }

    /// Re-read the master record. The master counts as gone when the
    /// record is unreadable, names another pid, or is stale and the pid
    /// no longer answers.
    pub fn refresh_master_status(&mut self) -> MasterStatus {
        let status = match self.table.read() {
            Ok(record) if record.pid != self.master_pid => {
                debug!(table_pid = record.pid, "master table names another master");
                MasterStatus::Stopped
            }
            Ok(record) if record.is_stale(self.clock.epoch_secs()) && !(self.alive)(record.pid) => {
                debug!("master table stale and master not answering");
                MasterStatus::Stopped
            }
            Ok(record) => record.status,
            Err(e) => {
                debug!(error = %e, "master table unreadable");
                MasterStatus::Stopped
            }
        };

        if status != self.master_status {
            info!(from = %self.master_status, to = %status, "master status changed");
        }
        self.master_status = status;
        self.last_refresh = Some(self.clock.now());
        status
    }

    fn maybe_refresh_master_status(&mut self) {
        if self.due(self.last_refresh, self.timing.status_refresh) {
            self.refresh_master_status();
        }
    }

    pub fn should_continue(&self) -> bool {
        if self.master_status != MasterStatus::Running {
            return false;
        }
        let limits = &self.limits;
        if limits.max_execute_time > 0
            && self.elapsed() > Duration::from_secs(limits.max_execute_time)
        {
            return false;
        }
        if limits.max_consumer_count > 0 && self.counters.done > limits.max_consumer_count {
            return false;
        }
        if self.kind == WorkerKind::Dynamic
            && limits.dynamic_idle_time > 0
            && self.idle_time() > Duration::from_secs(limits.dynamic_idle_time)
        {
            return false;
        }
        true
    }

    /// Pop one message and hand it to the consumer.
    ///
    /// Consumer failures are counted, never returned. Only a queue error
    /// that survived the backend's retries ends up in `Err`.
    pub async fn run_once(&mut self) -> Result<(), QueueError> {
        let Some(body) = self.queue.pop(self.timing.pop_timeout).await? else {
            return Ok(());
        };

        let started = self.clock.now();
        self.last_active = started;
        self.last_active_ms = self.clock.epoch_ms();

        // Run in a task so a panicking consumer surfaces as a JoinError
        let consumer = Arc::clone(&self.consumer);
        let outcome = tokio::spawn(async move {
            let mut message = Message::new(body);
            let result = consumer.consume(&mut message).await;
            (message, result)
        })
        .await;

        let cost_us = self.clock.now().duration_since(started).as_micros() as u64;

        match outcome {
            Err(e) => {
                self.counters.record_failure();
                error!(error = %e, "consumer panicked");
            }
            Ok((_, Err(e))) => {
                self.counters.record_failure();
                error!(error = %e, "consume failed");
            }
            Ok((message, Ok(()))) => match message.disposition() {
                None => {
                    self.counters.record_failure();
                    warn!("consumer returned without settling the message");
                }
                Some(disposition) => {
                    self.counters.record(disposition, cost_us);
                    if disposition == Disposition::Repush {
                        let body = message.into_body();
                        match self.queue.repush(&body).await {
                            Ok(true) => {}
                            Ok(false) => warn!("queue refused repush"),
                            Err(e) => warn!(error = %e, "repush failed"),
                        }
                    }
                }
            },
        }
        Ok(())
    }

    pub fn status_record(&self) -> WorkerStatusRecord {
        let state = if self.idle_time() > self.timing.idle_threshold {
            WorkerState::Idle
        } else {
            WorkerState::Running
        };
        WorkerStatusRecord {
            pid: self.pid,
            topic: self.topic.clone(),
            kind: self.kind,
            status: state,
            now: utc_from_epoch_ms(self.clock.epoch_ms()),
            begin: utc_from_epoch_ms(self.started_ms),
            last: utc_from_epoch_ms(self.last_active_ms),
            counters: self.counters,
            duration_ms: self.elapsed().as_millis() as u64,
        }
    }

    pub fn save_status(&mut self) {
        if let Err(e) = write_worker_status(&self.status_path, &self.status_record()) {
            warn!(error = %e, path = %self.status_path.display(), "failed to save worker status");
        }
        self.last_save = Some(self.clock.now());
    }

    /// Sleep off an idle stretch in status-refresh sized steps so a stop
    /// is still noticed promptly.
    async fn nap(&mut self) {
        let step = self.timing.status_refresh.max(Duration::from_millis(1));
        let mut remaining = self.timing.idle_nap;
        while !remaining.is_zero() {
            let slice = remaining.min(step);
            tokio::time::sleep(slice).await;
            remaining -= slice;
            if self.refresh_master_status() != MasterStatus::Running {
                break;
            }
        }
    }

    fn due(&self, last: Option<Instant>, every: Duration) -> bool {
        last.map_or(true, |at| self.clock.now().duration_since(at) >= every)
    }

    fn elapsed(&self) -> Duration {
        self.clock.now().duration_since(self.started)
    }

    fn idle_time(&self) -> Duration {
        self.clock.now().duration_since(self.last_active)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
