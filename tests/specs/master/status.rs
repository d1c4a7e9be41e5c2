//! `pj status` specs

use crate::prelude::*;

#[test]
fn status_when_never_started() {
    let temp = Project::with_queue_url("redis://127.0.0.1:6379/0");
    temp.pj().args(&["status"]).passes().stdout_eq("pjd not running\n");
}

#[test]
fn status_shows_last_report_after_exit() {
    let temp = Project::with_queue_url("redis://127.0.0.1:6379/0");
    temp.data_file("status.info", "Status: \t\tSTOPPED\n");

    temp.pj()
        .args(&["status"])
        .passes()
        .stdout_has("pjd not running; showing last report from ")
        .stdout_has("Status: \t\tSTOPPED");
}

#[test]
fn status_as_json() {
    let temp = Project::with_queue_url("redis://127.0.0.1:6379/0");
    temp.data_file("status.info", "Status: \t\tSTOPPED\n");

    let run = temp.pj().args(&["status", "-o", "json"]).passes();
    let json = run.json();
    assert_eq!(json["status"], "not_running");
    assert_eq!(json["pid"], serde_json::Value::Null);
    assert_eq!(json["report"], "Status: \t\tSTOPPED\n");
}

#[test]
fn status_of_unresponsive_master_is_stale() {
    let temp = Project::with_queue_url("redis://127.0.0.1:6379/0");
    let master = temp.fake_master();

    // SIGUSR2 terminates `sleep`, so no report is ever written
    temp.pj()
        .args(&["status"])
        .passes()
        .stdout_eq(&format!(
            "pjd (pid {}) did not write a status report\n",
            master.pid()
        ));
}
