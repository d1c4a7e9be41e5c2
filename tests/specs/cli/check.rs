//! `pj check` specs
//!
//! Validation runs without contacting any queue or touching the data
//! directory.

use crate::prelude::*;

#[test]
fn valid_config_passes() {
    let temp = Project::with_queue_url("redis://127.0.0.1:6379/0");
    temp.pj()
        .args(&["check"])
        .passes()
        .stdout_eq("pj.toml: config ok (1 job(s): orders; 1 static worker(s), up to 1)\n");
    assert!(!temp.data_dir().exists());
}

#[test]
fn valid_config_as_json() {
    let temp = Project::with_queue_url("redis://127.0.0.1:6379/0");
    let run = temp.pj().args(&["check", "-o", "json"]).passes();
    let json = run.json();
    assert_eq!(json["valid"], true);
    assert_eq!(json["name"], "specs");
    assert_eq!(json["topics"], serde_json::json!(["orders"]));
}

#[test]
fn explicit_config_flag() {
    let temp = Project::with_queue_url("redis://127.0.0.1:6379/0");
    let config = temp.config_path();
    cli()
        .args(&["check", "-c", config.to_str().unwrap()])
        .passes()
        .stdout_has("config ok");
}

#[test]
fn unknown_consumer_kind_fails() {
    let temp = Project::empty();
    temp.config(&format!(
        r#"
[process]
data_dir = "{}"

[queue]
kind = "redis"

[[jobs]]
topic = "orders"
consumer = {{ kind = "carrier-pigeon" }}
"#,
        temp.data_dir().display()
    ));
    temp.pj()
        .args(&["check"])
        .fails()
        .stderr_has("jobs[0].consumer.kind \"carrier-pigeon\" is not one of: command, log");
}

#[test]
fn duplicate_topic_fails() {
    let temp = Project::empty();
    temp.config(&format!(
        r#"
[process]
data_dir = "{}"

[queue]
kind = "redis"

[[jobs]]
topic = "orders"
consumer = {{ kind = "log" }}

[[jobs]]
topic = "orders"
consumer = {{ kind = "log" }}
"#,
        temp.data_dir().display()
    ));
    temp.pj()
        .args(&["check"])
        .fails()
        .stderr_has("jobs[1].topic \"orders\" is already defined");
}

#[test]
fn missing_config_fails() {
    let temp = Project::empty();
    temp.pj()
        .args(&["check"])
        .fails()
        .stderr_has("failed to read pj.toml");
}
