// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pj_core::MasterRecord;
use std::process::Command;
use tempfile::tempdir;

fn dead_pid() -> u32 {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

fn paths_in(dir: &Path) -> DataPaths {
    let paths = DataPaths::new(dir);
    paths.create_dirs().unwrap();
    paths
}

fn publish(paths: &DataPaths, pid: u32, status: MasterStatus) {
    MasterTable::new(&paths.table_file)
        .publish(&MasterRecord::new(pid, "pj", status, 1_700_000_000))
        .unwrap();
}

// -- Startup log parsing ----------------------------------------------------

#[test]
fn startup_error_after_last_marker() {
    let content = "\
--- pjd: starting (pid: 10) ---
ERROR Failed to start master: old failure
--- pjd: starting (pid: 11) ---
2026-10-19T10:00:00Z  INFO master{pid=11}: pjd: starting master
ERROR Failed to start master: queue orders: connection refused
";
    assert_eq!(
        parse_startup_error(content).as_deref(),
        Some("queue orders: connection refused")
    );
}

#[test]
fn startup_error_deduplicates_tracing_copy() {
    let content = "\
--- pjd: starting (pid: 11) ---
2026-10-19T10:00:00Z ERROR master{pid=11}: pjd: Failed to start master: bad kind
ERROR Failed to start master: bad kind
";
    assert_eq!(parse_startup_error(content).as_deref(), Some("bad kind"));
}

#[yare::parameterized(
    no_marker = { "ERROR Failed to start master: boom\n" },
    clean_start = { "--- pjd: starting (pid: 3) ---\n INFO master started\n" },
    empty = { "" },
)]
fn startup_error_absent(content: &str) {
    assert_eq!(parse_startup_error(content), None);
}

#[test]
fn read_startup_error_missing_log() {
    let dir = tempdir().unwrap();
    assert_eq!(read_startup_error(dir.path()), None);
}

// -- Master discovery -------------------------------------------------------

#[test]
fn running_master_requires_live_pid() {
    let dir = tempdir().unwrap();
    let paths = paths_in(dir.path());
    assert_eq!(running_master(&paths), None);

    let own = std::process::id();
    std::fs::write(&paths.pid_file, own.to_string()).unwrap();
    assert_eq!(running_master(&paths), Some(own));

    std::fs::write(&paths.pid_file, dead_pid().to_string()).unwrap();
    assert_eq!(running_master(&paths), None);
}

#[test]
fn master_ready_needs_running_record_for_same_pid() {
    let dir = tempdir().unwrap();
    let paths = paths_in(dir.path());
    let pid = std::process::id();
    std::fs::write(&paths.pid_file, pid.to_string()).unwrap();
    assert!(!master_ready(&paths, pid));

    publish(&paths, pid + 1, MasterStatus::Running);
    assert!(!master_ready(&paths, pid));

    publish(&paths, pid, MasterStatus::Wait);
    assert!(!master_ready(&paths, pid));

    publish(&paths, pid, MasterStatus::Running);
    assert!(master_ready(&paths, pid));
}

#[test]
fn master_gone_waits_for_pid_file_and_process() {
    let dir = tempdir().unwrap();
    let paths = paths_in(dir.path());
    let pid = dead_pid();

    std::fs::write(&paths.pid_file, pid.to_string()).unwrap();
    assert!(!master_gone(&paths, pid));

    std::fs::remove_file(&paths.pid_file).unwrap();
    assert!(master_gone(&paths, pid));
    assert!(!master_gone(&paths, std::process::id()));
}

#[test]
fn request_stop_fails_for_dead_pid() {
    let pid = dead_pid();
    assert!(matches!(request_stop(pid), Err(DaemonError::SignalFailed(p)) if p == pid));
}

// -- Waiting ----------------------------------------------------------------

#[tokio::test]
async fn wait_for_exit_returns_when_master_gone() {
    let dir = tempdir().unwrap();
    let paths = paths_in(dir.path());
    let result = wait_for_exit(&paths, dead_pid(), Duration::from_secs(2)).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn wait_for_exit_times_out_on_live_master() {
    let dir = tempdir().unwrap();
    let paths = paths_in(dir.path());
    let pid = std::process::id();
    std::fs::write(&paths.pid_file, pid.to_string()).unwrap();

    let err = wait_for_exit(&paths, pid, Duration::from_millis(100)).await.unwrap_err();
    assert!(matches!(err, DaemonError::StopTimeout { pid: p, .. } if p == pid));
}

#[tokio::test]
async fn wait_for_start_surfaces_logged_error() {
    let dir = tempdir().unwrap();
    let paths = paths_in(&dir.path().join("data"));
    let log_dir = dir.path().join("logs");
    std::fs::create_dir_all(&log_dir).unwrap();
    std::fs::write(
        log_path(&log_dir),
        "--- pjd: starting (pid: 1) ---\nERROR Failed to start master: jobs must contain at least one job\n",
    )
    .unwrap();

    let mut child = Command::new("sh").args(["-c", "exit 1"]).spawn().unwrap();
    let err = wait_for_start(&paths, &log_dir, &mut child, Duration::from_secs(5))
        .await
        .unwrap_err();
    match err {
        DaemonError::StartFailed(msg) => assert_eq!(msg, "jobs must contain at least one job"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn wait_for_start_reports_exit_status_without_log() {
    let dir = tempdir().unwrap();
    let paths = paths_in(dir.path());

    let mut child = Command::new("sh").args(["-c", "exit 3"]).spawn().unwrap();
    let err = wait_for_start(&paths, &dir.path().join("logs"), &mut child, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("pjd exited with"), "{err}");
}

#[tokio::test]
async fn wait_for_start_ready_when_record_published() {
    let dir = tempdir().unwrap();
    let paths = paths_in(dir.path());

    let mut child = Command::new("sleep").arg("5").spawn().unwrap();
    let pid = child.id();
    std::fs::write(&paths.pid_file, pid.to_string()).unwrap();
    publish(&paths, pid, MasterStatus::Running);

    let result = wait_for_start(&paths, dir.path(), &mut child, Duration::from_secs(5)).await;
    child.kill().unwrap();
    child.wait().unwrap();
    assert_eq!(result.unwrap(), pid);
}
