// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master startup, the master event loop, and worker mode.

use crate::env;
use crate::jobs::Jobs;
use crate::master::{Master, MasterEvent, Spawner, StartError};
use crate::paths::DataPaths;
use crate::pidfile::{read_pid, PidFile, PidFileError};
use crate::process::process_exists;
use crate::status_file::sweep_worker_dir;
use crate::worker::{WorkerRuntime, WorkerSpec};
use pj_adapters::{
    ConsumerError, ConsumerRegistry, NotifierRegistry, NotifyError, QueueError, QueueRegistry,
};
use pj_core::{Clock, Config, ConfigError, SystemClock};
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

/// How long startup waits for a previous master to go away.
pub const PREVIOUS_MASTER_WAIT: Duration = Duration::from_secs(3);
const PREVIOUS_MASTER_POLL: Duration = Duration::from_millis(100);

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    PidFile(#[from] PidFileError),

    #[error("queue for {topic}: {source}")]
    Queue {
        topic: String,
        #[source]
        source: QueueError,
    },

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Consumer(#[from] ConsumerError),

    #[error(transparent)]
    Start(#[from] StartError),

    #[error("worker spec error: {0}")]
    Spec(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// The plugin registries a process resolves configured kinds against.
#[derive(Clone, Default)]
pub struct Registries {
    pub queues: QueueRegistry,
    pub consumers: ConsumerRegistry,
    pub notifiers: NotifierRegistry,
}

impl Registries {
    pub fn builtin() -> Self {
        Self {
            queues: QueueRegistry::builtin(),
            consumers: ConsumerRegistry::builtin(),
            notifiers: NotifierRegistry::builtin(),
        }
    }
}

/// Structural validation plus plugin kinds known to `registries`.
pub fn check_config(config: &Config, registries: &Registries) -> Result<(), ConfigError> {
    config.validate()?;
    config.check_kinds(
        &registries.queues.kinds(),
        &registries.consumers.kinds(),
        &registries.notifiers.kinds(),
    )
}

/// Wait for a master named in the pid file to exit. Fails if it is still
/// alive after [`PREVIOUS_MASTER_WAIT`].
pub async fn wait_for_previous_master(
    pid_path: &Path,
    own_pid: u32,
    alive: impl Fn(u32) -> bool,
) -> Result<(), PidFileError> {
    let Some(previous) = read_pid(pid_path).filter(|&pid| pid != own_pid) else {
        return Ok(());
    };
    let deadline = Instant::now() + PREVIOUS_MASTER_WAIT;
    while alive(previous) {
        if Instant::now() >= deadline {
            return Err(PidFileError::AlreadyRunning(previous));
        }
        tokio::time::sleep(PREVIOUS_MASTER_POLL).await;
    }
    Ok(())
}

/// Start the master: claim the pid file, clear stale files, connect one
/// backlog queue per topic, then enter RUNNING with the static pools up.
pub async fn startup<S: Spawner>(
    config: &Config,
    pid: u32,
    registries: &Registries,
    spawner: S,
) -> Result<Master<S, SystemClock>, LifecycleError> {
    check_config(config, registries)?;
    let paths = DataPaths::new(&config.process.data_dir);
    paths.create_dirs()?;

    wait_for_previous_master(&paths.pid_file, pid, process_exists).await?;
    let pid_file = PidFile::acquire(&paths.pid_file, pid)?;

    match startup_inner(config, pid, registries, spawner, &paths, pid_file).await {
        Ok(master) => Ok(master),
        Err(e) => {
            cleanup_on_failure(&paths);
            Err(e)
        }
    }
}

/// Everything after the pid file is ours; a failure here removes it again.
async fn startup_inner<S: Spawner>(
    config: &Config,
    pid: u32,
    registries: &Registries,
    spawner: S,
    paths: &DataPaths,
    pid_file: PidFile,
) -> Result<Master<S, SystemClock>, LifecycleError> {
    let stale = sweep_worker_dir(&paths.workers_dir)?;
    if stale > 0 {
        info!(removed = stale, "removed stale worker status files");
    }
    remove_if_exists(&paths.status_file)?;

    let notifier = match &config.notifier {
        Some(notifier) => Some(registries.notifiers.build(&notifier.plugin())?),
        None => None,
    };

    let mut jobs = Vec::with_capacity(config.jobs.len());
    for job in &config.jobs {
        let plugin = config.queue_for(job).cloned().ok_or_else(|| {
            ConfigError::Invalid(format!("no queue configured for topic {}", job.topic))
        })?;
        // Fail now rather than in every worker
        registries.consumers.build(&job.consumer, &job.topic)?;
        let queue = registries
            .queues
            .connect(&plugin, &job.topic)
            .await
            .map_err(|source| LifecycleError::Queue {
                topic: job.topic.clone(),
                source,
            })?;
        jobs.push(Jobs::new(job.clone(), plugin, queue, paths.clone()));
    }

    let mut master =
        Master::new(config.clone(), pid, jobs, spawner, SystemClock).with_pid_file(pid_file);
    if let Some(notifier) = notifier {
        master = master.with_notifier(notifier);
    }
    master.start().await?;
    Ok(master)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn cleanup_on_failure(paths: &DataPaths) {
    let _ = std::fs::remove_file(&paths.pid_file);
    let _ = std::fs::remove_file(&paths.table_file);
}

/// Cadences of the master timers.
#[derive(Debug, Clone, Copy)]
pub struct MasterTimers {
    pub scale: Duration,
    pub table_refresh: Duration,
    pub status: Duration,
    pub notify: Duration,
    pub shutdown_check: Duration,
}

impl MasterTimers {
    pub fn from_env() -> Self {
        Self {
            scale: env::scale_interval(),
            table_refresh: env::table_refresh_interval(),
            status: env::status_interval(),
            notify: env::notify_interval(),
            shutdown_check: Duration::from_secs(1),
        }
    }
}

/// Drive the master until shutdown completes.
pub async fn run_master<S: Spawner, C: Clock>(
    master: &mut Master<S, C>,
    events: &mut mpsc::UnboundedReceiver<MasterEvent>,
    timers: MasterTimers,
) {
    // NOTE: intervals live outside the loop; select! re-creates anything
    // built inside it on every event.
    let mut scale = ticker(timers.scale);
    let mut table = ticker(timers.table_refresh);
    let mut status = ticker(timers.status);
    let mut notify = ticker(timers.notify);
    let mut shutdown = ticker(timers.shutdown_check);

    while !master.is_exited() {
        tokio::select! {
            Some(event) = events.recv() => master.handle_event(event).await,
            _ = scale.tick() => master.check_dynamic().await,
            _ = table.tick() => master.refresh_table(),
            _ = status.tick() => {
                master.save_status(false).await;
                master.check_pid_file().await;
            }
            _ = notify.tick() => master.check_notifications().await,
            _ = shutdown.tick() => master.check_shutdown_timeout(),
        }
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Worker mode: connect, build the consumer, and consume until told to stop.
pub async fn run_worker(
    spec: &WorkerSpec,
    pid: u32,
    registries: &Registries,
) -> Result<(), LifecycleError> {
    let queue = registries
        .queues
        .connect(&spec.queue, &spec.topic)
        .await
        .map_err(|source| LifecycleError::Queue {
            topic: spec.topic.clone(),
            source,
        })?;
    let consumer = registries.consumers.build(&spec.consumer, &spec.topic)?;
    info!(
        process = %spec.process_label(),
        topic = %spec.topic,
        kind = %spec.kind,
        "worker connected"
    );

    WorkerRuntime::new(pid, spec, queue, consumer, SystemClock)
        .run()
        .await;
    Ok(())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
