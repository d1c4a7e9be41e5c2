// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master supervisor state machine.
//!
//! The master owns one [`Jobs`] pool per topic, publishes its record to the
//! shared table, and reacts to [`MasterEvent`]s: child exits are reaped and
//! static slots refilled, a stop request drains workers through the WAIT
//! state. Timers are driven from outside (see `lifecycle::run_master`) so
//! the whole machine runs in-process under test.

mod events;
mod report;
mod spawner;

pub use events::{spawn_signal_forwarder, MasterEvent};
pub use report::{append_ghost, header_line, render, ReportInput, GHOST_FILE_CAP};
pub use spawner::{ProcessSpawner, SpawnError, Spawner};
#[cfg(any(test, feature = "test-support"))]
pub use spawner::{FakeSpawner, SpawnCall};

use crate::jobs::Jobs;
use crate::paths::{write_atomic, DataPaths};
use crate::pidfile::{PidCheck, PidFile, PidFileError};
use crate::process::{load_average, memory_usage, process_exists};
use crate::status_file::sweep_worker_dir;
use crate::table::{MasterTable, TableError};
use crate::worker::{AliveProbe, WorkerSpec};
use chrono::{DateTime, Local};
use pj_adapters::NotifyAdapter;
use pj_core::worker::utc_from_epoch_ms;
use pj_core::{
    Clock, Config, JobConfig, LogConfig, MasterRecord, MasterStatus, PluginConfig, WorkerKind,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Immediate respawn attempts for an exited static worker.
pub const RESPAWN_ATTEMPTS: usize = 3;

const ALERT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Why the master could not enter service.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("master table error: {0}")]
    Table(#[from] TableError),

    #[error("failed to start static workers for {topic}: {source}")]
    StaticPool {
        topic: String,
        #[source]
        source: SpawnError,
    },
}

pub struct Master<S: Spawner, C: Clock> {
    pid: u32,
    config: Config,
    status: MasterStatus,
    started_ms: u64,
    jobs: Vec<Jobs>,
    paths: DataPaths,
    table: MasterTable,
    pid_file: Option<PidFile>,
    spawner: S,
    clock: C,
    notifier: Option<Arc<dyn NotifyAdapter>>,
    alert_task: Option<JoinHandle<()>>,
    alive: AliveProbe,
    wait_since: Option<Instant>,
    force_killed: bool,
    exited: bool,
}

impl<S: Spawner, C: Clock> Master<S, C> {
    pub fn new(config: Config, pid: u32, jobs: Vec<Jobs>, spawner: S, clock: C) -> Self {
        let paths = DataPaths::new(&config.process.data_dir);
        let started_ms = clock.epoch_ms();
        Self {
            pid,
            table: MasterTable::new(&paths.table_file),
            paths,
            config,
            status: MasterStatus::Stopped,
            started_ms,
            jobs,
            pid_file: None,
            spawner,
            clock,
            notifier: None,
            alert_task: None,
            alive: Arc::new(process_exists),
            wait_since: None,
            force_killed: false,
            exited: false,
        }
    }

    pub fn with_pid_file(mut self, pid_file: PidFile) -> Self {
        self.pid_file = Some(pid_file);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotifyAdapter>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_alive_probe(mut self, alive: AliveProbe) -> Self {
        self.alive = alive;
        self
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn status(&self) -> MasterStatus {
        self.status
    }

    /// True once shutdown has completed.
    pub fn is_exited(&self) -> bool {
        self.exited
    }

    pub fn jobs(&self) -> &[Jobs] {
        &self.jobs
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn live_workers(&self) -> usize {
        self.jobs.iter().map(Jobs::live_workers).sum()
    }

    /// Enter RUNNING and start every topic's static pool.
    ///
    /// A static spawn failure drains whatever was already started and is
    /// returned, so the process can exit with an error.
    pub async fn start(&mut self) -> Result<(), StartError> {
        self.status = MasterStatus::Running;
        self.publish()?;
        info!(pid = self.pid, topics = self.jobs.len(), "master running");

        let Self {
            jobs,
            spawner,
            config,
            paths,
            pid,
            ..
        } = self;
        let mut spawn = |job: &JobConfig, queue: &PluginConfig, kind: WorkerKind| {
            spawner.spawn(&worker_spec(*pid, config, paths, job, queue, kind))
        };

        let mut failure = None;
        for job in jobs.iter_mut() {
            if let Err(source) = job.create_static_workers(&mut spawn) {
                failure = Some(StartError::StaticPool {
                    topic: job.topic().to_string(),
                    source,
                });
                break;
            }
        }

        match failure {
            Some(e) => {
                let msg = e.to_string();
                error!("{msg}");
                self.log_notify(&msg);
                self.safe_exit().await;
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Scale every topic up to its ceiling if its backlog is unhealthy.
    pub async fn check_dynamic(&mut self) {
        if self.status != MasterStatus::Running {
            return;
        }
        let Self {
            jobs,
            spawner,
            config,
            paths,
            pid,
            ..
        } = self;
        let mut spawn = |job: &JobConfig, queue: &PluginConfig, kind: WorkerKind| {
            spawner.spawn(&worker_spec(*pid, config, paths, job, queue, kind))
        };
        for job in jobs.iter_mut() {
            job.create_dynamic_workers(&mut spawn).await;
        }
    }

    /// Heartbeat: rewrite our table record with a fresh timestamp.
    pub fn refresh_table(&mut self) {
        if let Err(e) = self.publish() {
            error!(error = %e, "failed to refresh master table");
        }
    }

    fn publish(&self) -> Result<(), TableError> {
        let record = MasterRecord::new(
            self.pid,
            &self.config.process.name,
            self.status,
            self.clock.epoch_secs(),
        );
        self.table.publish(&record)
    }

    /// Rewrite the status file; with `ghost`, also append it to the history.
    pub async fn save_status(&mut self, ghost: bool) {
        let mut summaries = Vec::with_capacity(self.jobs.len());
        for job in self.jobs.iter_mut() {
            let summary = job.worker_summary().await;
            for e in &summary.errors {
                warn!(topic = %summary.topic, pid = e.pid, reason = %e.reason, "worker status unreadable");
            }
            summaries.push(summary);
        }

        let load = load_average();
        let memory = memory_usage();
        let report = render(&ReportInput {
            process_name: &self.config.process.name,
            version: env!("CARGO_PKG_VERSION"),
            started: local_from_epoch_ms(self.started_ms),
            now: local_from_epoch_ms(self.clock.epoch_ms()),
            load_average: &load,
            memory: &memory,
            master_pid: self.pid,
            status: self.status,
            registered_workers: self.live_workers(),
            jobs: &summaries,
        });

        if let Err(e) = write_atomic(&self.paths.status_file, report.as_bytes()) {
            warn!(error = %e, "failed to write status file");
        }
        if ghost {
            if let Err(e) = append_ghost(&self.paths.ghost_file, &report, GHOST_FILE_CAP) {
                warn!(error = %e, "failed to append ghost status");
            }
        }
    }

    /// Make sure the pid file still names us. A lost file is rewritten; a
    /// file naming another live master drains this one.
    pub async fn check_pid_file(&mut self) {
        let Some(pid_file) = self.pid_file.as_mut() else {
            return;
        };
        let alive = Arc::clone(&self.alive);
        match pid_file.verify(move |pid| alive(pid)) {
            Ok(PidCheck::Ok) => {}
            Ok(PidCheck::Repaired) => warn!(path = %pid_file.path().display(), "pid file repaired"),
            Err(PidFileError::Mismatch(other)) => {
                let msg = format!("pid file names another live master (pid {other})");
                error!("{msg}");
                // Not ours to delete on exit
                self.pid_file = None;
                self.log_notify(&msg);
                self.safe_exit().await;
            }
            Err(e) => warn!(error = %e, "failed to verify pid file"),
        }
    }

    /// Scan every topic for alerts and hand them to the notifier in the
    /// background. Skipped while an earlier dispatch is still in flight.
    pub async fn check_notifications(&mut self) {
        if self.notifier.is_none() || !self.config.jobs_check_enabled() {
            return;
        }
        if self.alert_in_flight() {
            debug!("previous alert dispatch still running");
            return;
        }

        let now = local_from_epoch_ms(self.clock.epoch_ms())
            .format(ALERT_TIME_FORMAT)
            .to_string();
        let mut messages = Vec::new();
        for job in self.jobs.iter_mut() {
            let alerts = job.trigger_notification().await;
            if !alerts.is_empty() {
                messages.push(format!(
                    "[{now}][pname={}][topic={}]job alert: {}",
                    self.config.process.name,
                    job.topic(),
                    alerts.join(", ")
                ));
            }
        }
        self.dispatch(messages);
    }

    /// Forward an error to the notifier when `log_notify` is on.
    pub fn log_notify(&mut self, message: &str) {
        let enabled = self.config.notifier.as_ref().is_some_and(|n| n.log_notify);
        if !enabled {
            return;
        }
        if self.alert_in_flight() {
            debug!("notifier busy, dropping error notification");
            return;
        }
        let line = format!(
            "[{}][pname={}]{message}",
            local_from_epoch_ms(self.clock.epoch_ms()).format(ALERT_TIME_FORMAT),
            self.config.process.name,
        );
        self.dispatch(vec![line]);
    }

    fn alert_in_flight(&self) -> bool {
        self.alert_task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn dispatch(&mut self, messages: Vec<String>) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        if messages.is_empty() {
            return;
        }
        self.alert_task = Some(tokio::spawn(async move {
            for message in messages {
                if let Err(e) = notifier.send(&message).await {
                    warn!(error = %e, "failed to send notification");
                }
            }
        }));
    }

    pub async fn handle_event(&mut self, event: MasterEvent) {
        match event {
            MasterEvent::Stop => self.safe_exit().await,
            MasterEvent::RefreshStatus => self.save_status(false).await,
            MasterEvent::ChildExited { pid, code } => self.reap(pid, code).await,
        }
    }

    /// Unregister an exited worker and refill its slot if it was static.
    pub async fn reap(&mut self, pid: u32, code: Option<i32>) {
        let Some(index) = self.jobs.iter().position(|job| job.has_worker(pid)) else {
            warn!(pid, ?code, "exit of unknown child");
            return;
        };
        let Some(handle) = self.jobs[index].unmount_worker(pid) else {
            return;
        };
        info!(pid, ?code, kind = %handle.kind, topic = %self.jobs[index].topic(), "worker exited");

        if handle.kind == WorkerKind::Static && self.status == MasterStatus::Running {
            if let Err(msg) = self.respawn_static(index) {
                error!("{msg}");
                self.log_notify(&msg);
                self.safe_exit().await;
            }
        }

        if self.status == MasterStatus::Wait && self.live_workers() == 0 {
            self.exit().await;
        }
    }

    fn respawn_static(&mut self, index: usize) -> Result<u32, String> {
        let Self {
            jobs,
            spawner,
            config,
            paths,
            pid,
            ..
        } = self;
        let mut spawn = |job: &JobConfig, queue: &PluginConfig, kind: WorkerKind| {
            spawner.spawn(&worker_spec(*pid, config, paths, job, queue, kind))
        };
        let job = &mut jobs[index];

        let mut last_error = None;
        for attempt in 1..=RESPAWN_ATTEMPTS {
            match job.spawn_worker(WorkerKind::Static, &mut spawn) {
                Ok(worker_pid) => return Ok(worker_pid),
                Err(e) => {
                    warn!(topic = %job.topic(), attempt, error = %e, "respawn failed");
                    last_error = Some(e);
                }
            }
        }
        Err(format!(
            "failed to respawn static worker for {} after {RESPAWN_ATTEMPTS} attempts: {}",
            job.topic(),
            last_error.map(|e| e.to_string()).unwrap_or_default()
        ))
    }

    /// Begin a graceful drain: enter WAIT and tell the workers.
    pub async fn safe_exit(&mut self) {
        if self.status != MasterStatus::Running {
            return;
        }
        self.status = MasterStatus::Wait;
        self.wait_since = Some(self.clock.now());
        if let Err(e) = self.publish() {
            error!(error = %e, "failed to publish WAIT");
        }
        info!(live = self.live_workers(), "master draining");

        if self.live_workers() == 0 {
            self.exit().await;
        }
    }

    /// Kill workers that outlived `process.shutdown_timeout` in WAIT.
    pub fn check_shutdown_timeout(&mut self) {
        let timeout = self.config.process.shutdown_timeout;
        if timeout == 0 || self.force_killed || self.status != MasterStatus::Wait {
            return;
        }
        let Some(since) = self.wait_since else {
            return;
        };
        if self.clock.now().duration_since(since) < Duration::from_secs(timeout) {
            return;
        }

        self.force_killed = true;
        for job in &self.jobs {
            for pid in job.live_pids() {
                warn!(pid, topic = %job.topic(), "worker outlived shutdown timeout, killing");
                self.spawner.terminate(pid);
            }
        }
    }

    /// Finish shutdown: final snapshot, pid file and worker files removed.
    pub async fn exit(&mut self) {
        if self.exited {
            return;
        }
        self.status = MasterStatus::Stopped;
        self.save_status(true).await;
        if let Err(e) = self.publish() {
            warn!(error = %e, "failed to publish STOPPED");
        }
        if let Some(pid_file) = self.pid_file.take() {
            if let Err(e) = pid_file.remove() {
                warn!(error = %e, "failed to remove pid file");
            }
        }
        match sweep_worker_dir(&self.paths.workers_dir) {
            Ok(n) if n > 0 => debug!(removed = n, "swept worker status files"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to sweep worker status files"),
        }
        for job in self.jobs.iter_mut() {
            job.close().await;
        }
        self.exited = true;
        info!(pid = self.pid, "master stopped");
    }
}

/// The spec handed to a new worker process.
pub fn worker_spec(
    master_pid: u32,
    config: &Config,
    paths: &DataPaths,
    job: &JobConfig,
    queue: &PluginConfig,
    kind: WorkerKind,
) -> WorkerSpec {
    WorkerSpec {
        topic: job.topic.clone(),
        kind,
        limits: job.limits(),
        queue: queue.clone(),
        consumer: job.consumer.clone(),
        paths: paths.clone(),
        master_pid,
        process_name: config.process.name.clone(),
        log: LogConfig {
            dir: Some(config.log_dir()),
            ..config.log.clone()
        },
    }
}

fn local_from_epoch_ms(ms: u64) -> DateTime<Local> {
    utc_from_epoch_ms(ms).with_timezone(&Local)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
