//! Master lifecycle specs: start / stop / restart / revive
//!
//! No queue server is assumed, so these cover the paths that never reach
//! a running pool: refusals, startup failures, and stopping nothing.

use crate::prelude::*;

#[test]
fn stop_when_not_running() {
    let temp = Project::with_queue_url("redis://127.0.0.1:6379/0");
    temp.pj().args(&["stop"]).passes().stdout_eq("pjd not running\n");
}

#[test]
fn stop_when_not_running_as_json() {
    let temp = Project::with_queue_url("redis://127.0.0.1:6379/0");
    let run = temp.pj().args(&["stop", "-o", "json"]).passes();
    assert_eq!(run.json()["status"], "not_running");
}

#[test]
fn stop_ignores_stale_pid_file() {
    let temp = Project::with_queue_url("redis://127.0.0.1:6379/0");
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let dead = child.id();
    child.wait().unwrap();
    temp.data_file("master.pid", &dead.to_string());

    temp.pj().args(&["stop"]).passes().stdout_eq("pjd not running\n");
}

#[test]
fn start_refuses_when_already_running() {
    let temp = Project::with_queue_url("redis://127.0.0.1:6379/0");
    let master = temp.fake_master();

    temp.pj()
        .args(&["start"])
        .fails()
        .stderr_eq(&format!(
            "Error: pjd is already running (pid {})\n",
            master.pid()
        ));
}

#[test]
fn revive_leaves_running_master_alone() {
    let temp = Project::with_queue_url("redis://127.0.0.1:6379/0");
    let master = temp.fake_master();

    temp.pj()
        .args(&["revive"])
        .passes()
        .stdout_eq(&format!("pjd already running (pid {})\n", master.pid()));
}

#[test]
fn start_rejects_invalid_config_without_launching() {
    let temp = Project::empty();
    temp.config(&format!(
        "[process]\ndata_dir = \"{}\"\n[queue]\nkind = \"redis\"\n",
        temp.data_dir().display()
    ));
    temp.pj()
        .args(&["start"])
        .fails()
        .stderr_has("jobs must contain at least one job");
    assert!(!temp.data_dir().exists());
}

#[test]
fn start_surfaces_startup_error_from_log() {
    let temp = Project::with_queue_url("not-a-url");
    temp.pj()
        .args(&["start"])
        .fails()
        .stderr_has("pjd failed to start: queue for orders: queue config error: invalid redis url not-a-url");

    assert!(!temp.pid_file().exists(), "log:\n{}", temp.master_log());
    assert!(temp.master_log().contains("--- pjd: starting (pid: "));
}
