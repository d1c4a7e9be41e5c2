// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::worker::WorkerRuntime;
use pj_adapters::{Behavior, FakeNotifyAdapter, MemoryBroker, ScriptedConsumer};
use pj_core::{FakeClock, NotifierConfig, ProcessConfig, SystemClock};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const MASTER_PID: u32 = 100;
const TOPIC: &str = "orders";

struct Harness {
    dir: TempDir,
    broker: MemoryBroker,
    spawner: FakeSpawner,
    notifier: FakeNotifyAdapter,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
            broker: MemoryBroker::new(),
            spawner: FakeSpawner::new(),
            notifier: FakeNotifyAdapter::new(),
        }
    }

    fn config(&self, jobs: Vec<JobConfig>) -> Config {
        Config {
            process: ProcessConfig {
                name: "pj".to_string(),
                data_dir: self.dir.path().to_path_buf(),
                shutdown_timeout: 0,
            },
            log: LogConfig::default(),
            queue: Some(PluginConfig::new("memory")),
            notifier: None,
            jobs,
        }
    }

    fn master<C: Clock>(&self, config: Config, clock: C) -> Master<FakeSpawner, C> {
        let paths = DataPaths::new(&config.process.data_dir);
        paths.create_dirs().unwrap();
        let jobs = config
            .jobs
            .iter()
            .map(|job| {
                Jobs::new(
                    job.clone(),
                    PluginConfig::new("memory"),
                    Box::new(self.broker.queue(&job.topic)),
                    paths.clone(),
                )
            })
            .collect();
        Master::new(config, MASTER_PID, jobs, self.spawner.clone(), clock)
    }

    fn paths(&self) -> DataPaths {
        DataPaths::new(self.dir.path())
    }

    fn table_status(&self) -> MasterStatus {
        MasterTable::new(&self.paths().table_file)
            .read()
            .unwrap()
            .status
    }

    fn spawned_pids(&self) -> Vec<u32> {
        self.spawner.spawned().into_iter().map(|c| c.pid).collect()
    }
}

fn job(static_workers: u32) -> JobConfig {
    let mut job = JobConfig::new(TOPIC, PluginConfig::new("log"));
    job.static_workers = static_workers;
    job
}

fn notifier_config(jobs_check_notify: bool, log_notify: bool) -> NotifierConfig {
    NotifierConfig {
        kind: "fake".to_string(),
        params: serde_json::Map::new(),
        jobs_check_notify,
        log_notify,
    }
}

/// Let spawned notification tasks run.
async fn settle(notifier: &FakeNotifyAdapter, expected: usize) {
    for _ in 0..100 {
        if notifier.calls().len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// --- Startup ---

#[tokio::test]
async fn start_publishes_running_and_spawns_static_pool() {
    let h = Harness::new();
    let mut master = h.master(h.config(vec![job(2)]), FakeClock::new());

    master.start().await.unwrap();

    assert_eq!(master.status(), MasterStatus::Running);
    assert_eq!(h.table_status(), MasterStatus::Running);
    assert_eq!(master.live_workers(), 2);
    let spawned = h.spawner.spawned();
    assert!(spawned.iter().all(|c| c.topic == TOPIC && c.kind == WorkerKind::Static));
}

#[tokio::test]
async fn static_spawn_failure_at_start_drains() {
    let h = Harness::new();
    h.spawner.set_fail(true);
    let mut master = h.master(h.config(vec![job(2)]), FakeClock::new());

    let err = master.start().await.unwrap_err();

    assert!(matches!(err, StartError::StaticPool { ref topic, .. } if topic == "orders"));
    assert!(master.is_exited());
    assert_eq!(h.table_status(), MasterStatus::Stopped);
}

#[test]
fn worker_spec_carries_job_settings() {
    let h = Harness::new();
    let mut job = job(1);
    job.max_consumer_count = 50;
    let config = h.config(vec![job.clone()]);
    let paths = h.paths();

    let spec = worker_spec(
        MASTER_PID,
        &config,
        &paths,
        &job,
        &PluginConfig::new("memory"),
        WorkerKind::Dynamic,
    );

    assert_eq!(spec.topic, TOPIC);
    assert_eq!(spec.kind, WorkerKind::Dynamic);
    assert_eq!(spec.limits.max_consumer_count, 50);
    assert_eq!(spec.master_pid, MASTER_PID);
    assert_eq!(spec.queue.kind, "memory");
    assert_eq!(spec.log.dir, Some(h.dir.path().join("logs")));
}

// --- Reaping ---

#[tokio::test]
async fn exited_static_worker_is_respawned() {
    let h = Harness::new();
    let mut master = h.master(h.config(vec![job(2)]), FakeClock::new());
    master.start().await.unwrap();
    let first = h.spawned_pids()[0];

    master.reap(first, Some(1)).await;

    assert_eq!(master.status(), MasterStatus::Running);
    assert_eq!(master.live_workers(), 2);
    assert_eq!(h.spawner.spawned().len(), 3);
    assert!(!master.jobs()[0].has_worker(first));
    assert_eq!(master.jobs()[0].history().workers, 1);
}

#[tokio::test]
async fn respawn_retries_within_budget() {
    let h = Harness::new();
    let mut master = h.master(h.config(vec![job(1)]), FakeClock::new());
    master.start().await.unwrap();
    h.spawner.fail_next(2);

    master.reap(h.spawned_pids()[0], None).await;

    assert_eq!(master.status(), MasterStatus::Running);
    assert_eq!(master.live_workers(), 1);
}

#[tokio::test]
async fn three_failed_respawns_start_shutdown() {
    let h = Harness::new();
    let mut master = h.master(h.config(vec![job(2)]), FakeClock::new());
    master.start().await.unwrap();
    let pids = h.spawned_pids();
    h.spawner.fail_next(3);

    master.reap(pids[0], Some(1)).await;

    assert_eq!(master.status(), MasterStatus::Wait);
    assert_eq!(h.table_status(), MasterStatus::Wait);
    assert!(!master.is_exited());

    master.reap(pids[1], Some(0)).await;

    assert!(master.is_exited());
    assert_eq!(h.table_status(), MasterStatus::Stopped);
}

#[tokio::test]
async fn exited_dynamic_worker_is_not_replaced() {
    let h = Harness::new();
    let mut job = job(1);
    job.dynamic_workers = 2;
    job.queue_health_size = 5;
    let mut master = h.master(h.config(vec![job]), FakeClock::new());
    master.start().await.unwrap();
    for i in 0..11 {
        h.broker.push(TOPIC, format!("m{i}"));
    }

    master.check_dynamic().await;
    assert_eq!(master.live_workers(), 3);
    let dynamic = h
        .spawner
        .spawned()
        .into_iter()
        .find(|c| c.kind == WorkerKind::Dynamic)
        .unwrap();

    master.reap(dynamic.pid, Some(0)).await;

    assert_eq!(master.live_workers(), 2);
    assert_eq!(h.spawner.spawned().len(), 3);
}

#[tokio::test]
async fn no_scaling_outside_running() {
    let h = Harness::new();
    let mut job = job(1);
    job.dynamic_workers = 2;
    job.queue_health_size = 5;
    let mut master = h.master(h.config(vec![job]), FakeClock::new());
    master.start().await.unwrap();
    for i in 0..11 {
        h.broker.push(TOPIC, format!("m{i}"));
    }

    master.handle_event(MasterEvent::Stop).await;
    master.check_dynamic().await;

    assert_eq!(h.spawner.spawned().len(), 1);
}

#[tokio::test]
async fn unknown_child_is_ignored() {
    let h = Harness::new();
    let mut master = h.master(h.config(vec![job(1)]), FakeClock::new());
    master.start().await.unwrap();

    master.reap(9999, Some(0)).await;

    assert_eq!(master.live_workers(), 1);
    assert_eq!(h.spawner.spawned().len(), 1);
    assert_eq!(master.status(), MasterStatus::Running);
}

// --- Shutdown ---

#[tokio::test]
async fn stop_without_workers_exits_immediately() {
    let h = Harness::new();
    let paths = h.paths();
    let mut master = h
        .master(h.config(Vec::new()), FakeClock::new())
        .with_pid_file(PidFile::acquire(&paths.pid_file, MASTER_PID).unwrap());
    master.start().await.unwrap();

    master.handle_event(MasterEvent::Stop).await;

    assert!(master.is_exited());
    assert_eq!(master.status(), MasterStatus::Stopped);
    assert!(!paths.pid_file.exists());
    assert!(paths.status_file.exists());
    assert!(paths.ghost_file.exists());
}

#[tokio::test]
async fn stop_waits_for_live_workers() {
    let h = Harness::new();
    let paths = h.paths();
    let mut master = h
        .master(h.config(vec![job(2)]), FakeClock::new())
        .with_pid_file(PidFile::acquire(&paths.pid_file, MASTER_PID).unwrap());
    master.start().await.unwrap();
    let pids = h.spawned_pids();
    std::fs::write(paths.workers_dir.join("stray.info"), "{}").unwrap();

    master.handle_event(MasterEvent::Stop).await;

    assert_eq!(master.status(), MasterStatus::Wait);
    assert_eq!(h.table_status(), MasterStatus::Wait);
    assert!(paths.pid_file.exists());

    master.reap(pids[0], Some(0)).await;
    assert!(!master.is_exited());
    // Draining workers are not replaced
    assert_eq!(h.spawner.spawned().len(), 2);

    master.reap(pids[1], Some(0)).await;
    assert!(master.is_exited());
    assert!(!paths.pid_file.exists());
    assert_eq!(std::fs::read_dir(&paths.workers_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn second_stop_is_ignored() {
    let h = Harness::new();
    let clock = FakeClock::new();
    let mut config = h.config(vec![job(1)]);
    config.process.shutdown_timeout = 10;
    let mut master = h.master(config, clock.clone());
    master.start().await.unwrap();

    master.handle_event(MasterEvent::Stop).await;
    clock.advance(Duration::from_secs(8));
    master.handle_event(MasterEvent::Stop).await;
    clock.advance(Duration::from_secs(3));
    master.check_shutdown_timeout();

    // The deadline counts from the first stop
    assert_eq!(h.spawner.terminated().len(), 1);
}

#[tokio::test]
async fn shutdown_timeout_kills_stragglers_once() {
    let h = Harness::new();
    let clock = FakeClock::new();
    let mut config = h.config(vec![job(2)]);
    config.process.shutdown_timeout = 10;
    let mut master = h.master(config, clock.clone());
    master.start().await.unwrap();
    master.handle_event(MasterEvent::Stop).await;

    clock.advance(Duration::from_secs(5));
    master.check_shutdown_timeout();
    assert!(h.spawner.terminated().is_empty());

    clock.advance(Duration::from_secs(6));
    master.check_shutdown_timeout();
    master.check_shutdown_timeout();

    let mut killed = h.spawner.terminated();
    killed.sort_unstable();
    assert_eq!(killed, h.spawned_pids());
}

#[tokio::test]
async fn zero_shutdown_timeout_never_kills() {
    let h = Harness::new();
    let clock = FakeClock::new();
    let mut master = h.master(h.config(vec![job(1)]), clock.clone());
    master.start().await.unwrap();
    master.handle_event(MasterEvent::Stop).await;

    clock.advance(Duration::from_secs(86_400));
    master.check_shutdown_timeout();

    assert!(h.spawner.terminated().is_empty());
}

#[tokio::test]
async fn worker_observes_stop_and_master_completes_shutdown() {
    let h = Harness::new();
    let paths = h.paths();
    let config = h.config(vec![job(1)]);
    let job_config = config.jobs[0].clone();
    let mut master = h
        .master(config.clone(), SystemClock)
        .with_pid_file(PidFile::acquire(&paths.pid_file, MASTER_PID).unwrap());
    master.start().await.unwrap();
    let worker_pid = h.spawned_pids()[0];

    let spec = worker_spec(
        MASTER_PID,
        &config,
        &paths,
        &job_config,
        &PluginConfig::new("memory"),
        WorkerKind::Static,
    );
    let mut worker = WorkerRuntime::new(
        worker_pid,
        &spec,
        Box::new(h.broker.queue(TOPIC)),
        Arc::new(ScriptedConsumer::new(Behavior::Ack)),
        SystemClock,
    )
    .with_alive_probe(Arc::new(|_| true));
    let handle = tokio::spawn(async move {
        worker.run().await;
        worker
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());

    let stopped_at = Instant::now();
    master.handle_event(MasterEvent::Stop).await;
    assert_eq!(master.status(), MasterStatus::Wait);

    let worker = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(stopped_at.elapsed() <= Duration::from_secs(1));
    assert_eq!(worker.master_status(), MasterStatus::Wait);

    master.reap(worker_pid, Some(0)).await;

    assert!(master.is_exited());
    assert!(!paths.pid_file.exists());
    assert_eq!(master.jobs()[0].history().workers, 1);
}

// --- Status ---

#[tokio::test]
async fn refresh_status_rewrites_status_file() {
    let h = Harness::new();
    let mut master = h.master(h.config(vec![job(1)]), FakeClock::new());
    master.start().await.unwrap();
    h.broker.push(TOPIC, "a");

    master.handle_event(MasterEvent::RefreshStatus).await;

    let report = std::fs::read_to_string(&h.paths().status_file).unwrap();
    assert!(report.starts_with(&header_line()));
    assert!(report.contains("Status: \t\tRUNNING"));
    assert!(report.contains("Register Workers: \t1"));
    assert!(report.lines().any(|l| l.starts_with(&format!("{TOPIC:<25}{:<10}", "1"))));
    assert!(!h.paths().ghost_file.exists());
}

#[tokio::test]
async fn table_heartbeat_refreshes_timestamp() {
    let h = Harness::new();
    let clock = FakeClock::new();
    let mut master = h.master(h.config(vec![job(1)]), clock.clone());
    master.start().await.unwrap();
    let table = MasterTable::new(&h.paths().table_file);
    let before = table.read().unwrap().modified;

    clock.advance(Duration::from_secs(30));
    master.refresh_table();

    assert_eq!(table.read().unwrap().modified, before + 30);
}

// --- Pid file ---

#[tokio::test]
async fn lost_pid_file_is_repaired() {
    let h = Harness::new();
    let paths = h.paths();
    let mut master = h
        .master(h.config(vec![job(1)]), FakeClock::new())
        .with_pid_file(PidFile::acquire(&paths.pid_file, MASTER_PID).unwrap());
    master.start().await.unwrap();
    std::fs::remove_file(&paths.pid_file).unwrap();

    master.check_pid_file().await;

    assert_eq!(crate::pidfile::read_pid(&paths.pid_file), Some(MASTER_PID));
    assert_eq!(master.status(), MasterStatus::Running);
}

#[tokio::test]
async fn pid_file_naming_another_live_master_drains() {
    let h = Harness::new();
    let paths = h.paths();
    let mut master = h
        .master(h.config(vec![job(1)]), FakeClock::new())
        .with_pid_file(PidFile::acquire(&paths.pid_file, MASTER_PID).unwrap())
        .with_alive_probe(Arc::new(|pid| pid == 4242));
    master.start().await.unwrap();
    std::fs::write(&paths.pid_file, "4242\n").unwrap();

    master.check_pid_file().await;
    assert_eq!(master.status(), MasterStatus::Wait);

    master.reap(h.spawned_pids()[0], Some(0)).await;

    assert!(master.is_exited());
    // The other master's file is left alone
    assert_eq!(crate::pidfile::read_pid(&paths.pid_file), Some(4242));
}

// --- Notifications ---

#[tokio::test]
async fn alerts_are_sent_through_notifier() {
    let h = Harness::new();
    let mut job = job(1);
    job.queue_health_size = 2;
    let mut config = h.config(vec![job]);
    config.notifier = Some(notifier_config(true, false));
    let mut master = h
        .master(config, FakeClock::new())
        .with_notifier(Arc::new(h.notifier.clone()));
    master.start().await.unwrap();
    for i in 0..5 {
        h.broker.push(TOPIC, format!("m{i}"));
    }

    master.check_notifications().await;
    settle(&h.notifier, 1).await;

    let calls = h.notifier.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].message.contains("[pname=pj][topic=orders]job alert: queue backlog=5"));
}

#[tokio::test]
async fn alerts_skipped_when_jobs_check_disabled() {
    let h = Harness::new();
    let mut job = job(1);
    job.queue_health_size = 2;
    let mut config = h.config(vec![job]);
    config.notifier = Some(notifier_config(false, false));
    let mut master = h
        .master(config, FakeClock::new())
        .with_notifier(Arc::new(h.notifier.clone()));
    master.start().await.unwrap();
    for i in 0..5 {
        h.broker.push(TOPIC, format!("m{i}"));
    }

    master.check_notifications().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(h.notifier.calls().is_empty());
}

#[tokio::test]
async fn one_alert_dispatch_in_flight_at_a_time() {
    let h = Harness::new();
    h.notifier.set_delay(Some(Duration::from_secs(60)));
    let mut job = job(1);
    job.queue_health_size = 2;
    let mut config = h.config(vec![job]);
    config.notifier = Some(notifier_config(true, false));
    let mut master = h
        .master(config, FakeClock::new())
        .with_notifier(Arc::new(h.notifier.clone()));
    master.start().await.unwrap();
    for i in 0..5 {
        h.broker.push(TOPIC, format!("m{i}"));
    }

    master.check_notifications().await;
    settle(&h.notifier, 1).await;
    for i in 0..20 {
        h.broker.push(TOPIC, format!("n{i}"));
    }
    master.check_notifications().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(h.notifier.calls().len(), 1);
}

#[tokio::test]
async fn notifier_failure_is_not_fatal() {
    let h = Harness::new();
    h.notifier.set_fail(true);
    let mut job = job(1);
    job.queue_health_size = 2;
    let mut config = h.config(vec![job]);
    config.notifier = Some(notifier_config(true, false));
    let mut master = h
        .master(config, FakeClock::new())
        .with_notifier(Arc::new(h.notifier.clone()));
    master.start().await.unwrap();
    for i in 0..5 {
        h.broker.push(TOPIC, format!("m{i}"));
    }

    master.check_notifications().await;
    settle(&h.notifier, 1).await;

    assert_eq!(h.notifier.calls().len(), 1);
    assert_eq!(master.status(), MasterStatus::Running);
}

#[tokio::test]
async fn respawn_failure_is_forwarded_when_log_notify_on() {
    let h = Harness::new();
    let mut config = h.config(vec![job(2)]);
    config.notifier = Some(notifier_config(false, true));
    let mut master = h
        .master(config, FakeClock::new())
        .with_notifier(Arc::new(h.notifier.clone()));
    master.start().await.unwrap();
    h.spawner.fail_next(3);

    master.reap(h.spawned_pids()[0], Some(1)).await;
    settle(&h.notifier, 1).await;

    let calls = h.notifier.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].message.contains("failed to respawn static worker for orders"));
}
