// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TOML configuration model.
//!
//! Loaded and validated once at startup, then passed by reference.

use crate::master::MAX_NAME_LEN;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound for both static and dynamic worker counts.
pub const MAX_WORKERS_PER_KIND: u32 = 1024;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(String),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub process: ProcessConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Default queue backend for jobs without their own
    #[serde(default)]
    pub queue: Option<PluginConfig>,
    #[serde(default)]
    pub notifier: Option<NotifierConfig>,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(default = "default_process_name")]
    pub name: String,
    pub data_dir: PathBuf,
    /// Seconds to wait for workers after a stop before killing them (0 = forever)
    #[serde(default)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub rotation: LogRotation,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: None,
            level: default_log_level(),
            rotation: LogRotation::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Daily,
    Hourly,
}

/// A pluggable implementation chosen by `kind`, with free-form parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub kind: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl PluginConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: serde_json::Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(|v| v.as_u64())
    }

    pub fn param_i64(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(|v| v.as_i64())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub kind: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    /// Scan jobs for alert conditions periodically
    #[serde(default)]
    pub jobs_check_notify: bool,
    /// Forward master lifecycle errors
    #[serde(default)]
    pub log_notify: bool,
}

impl NotifierConfig {
    pub fn plugin(&self) -> PluginConfig {
        PluginConfig {
            kind: self.kind.clone(),
            params: self.params.clone(),
        }
    }
}

/// Exit policy a worker enforces on itself. Zero disables a limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerLimits {
    /// Seconds
    pub max_execute_time: u64,
    pub max_consumer_count: u64,
    /// Seconds; dynamic workers only
    pub dynamic_idle_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub topic: String,
    pub consumer: PluginConfig,
    #[serde(default = "default_static_workers")]
    pub static_workers: u32,
    #[serde(default)]
    pub dynamic_workers: u32,
    /// Backlog above which dynamic workers spawn (0 disables scaling)
    #[serde(default)]
    pub queue_health_size: u64,
    #[serde(default)]
    pub max_execute_time: u64,
    #[serde(default)]
    pub max_consumer_count: u64,
    #[serde(default)]
    pub dynamic_idle_time: u64,
    #[serde(default)]
    pub queue: Option<PluginConfig>,
}

impl JobConfig {
    pub fn new(topic: impl Into<String>, consumer: PluginConfig) -> Self {
        Self {
            topic: topic.into(),
            consumer,
            static_workers: default_static_workers(),
            dynamic_workers: 0,
            queue_health_size: 0,
            max_execute_time: 0,
            max_consumer_count: 0,
            dynamic_idle_time: 0,
            queue: None,
        }
    }

    pub fn limits(&self) -> WorkerLimits {
        WorkerLimits {
            max_execute_time: self.max_execute_time,
            max_consumer_count: self.max_consumer_count,
            dynamic_idle_time: self.dynamic_idle_time,
        }
    }

    /// Most workers this topic may have alive at once.
    pub fn ceiling(&self) -> usize {
        self.static_workers as usize + self.dynamic_workers as usize
    }
}

fn default_process_name() -> String {
    "pj".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_static_workers() -> u32 {
    1
}

impl Config {
    /// Read, parse, and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML without validating.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Structural validation. Plugin kinds are checked separately by
    /// [`Config::check_kinds`] against whatever registries the caller has.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.process.name;
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(invalid(format!(
                "process.name must be 1 to {MAX_NAME_LEN} bytes"
            )));
        }
        if self.process.data_dir.as_os_str().is_empty() {
            return Err(invalid("process.data_dir is required"));
        }
        if self.log.level.trim().is_empty() {
            return Err(invalid("log.level must not be empty"));
        }
        if let Some(queue) = &self.queue {
            check_plugin("queue", queue)?;
        }
        if let Some(notifier) = &self.notifier {
            if notifier.kind.trim().is_empty() {
                return Err(invalid("notifier.kind must be a non-empty string"));
            }
        }
        if self.jobs.is_empty() {
            return Err(invalid("jobs must contain at least one job"));
        }

        let mut topics = HashSet::new();
        for (i, job) in self.jobs.iter().enumerate() {
            if job.topic.trim().is_empty() {
                return Err(invalid(format!("jobs[{i}].topic must be a non-empty string")));
            }
            if !topics.insert(job.topic.as_str()) {
                return Err(invalid(format!(
                    "jobs[{i}].topic {:?} is already defined",
                    job.topic
                )));
            }
            if !(1..=MAX_WORKERS_PER_KIND).contains(&job.static_workers) {
                return Err(invalid(format!(
                    "jobs[{i}].static_workers must be between 1 and {MAX_WORKERS_PER_KIND}"
                )));
            }
            if job.dynamic_workers > MAX_WORKERS_PER_KIND {
                return Err(invalid(format!(
                    "jobs[{i}].dynamic_workers must be between 0 and {MAX_WORKERS_PER_KIND}"
                )));
            }
            check_plugin(&format!("jobs[{i}].consumer"), &job.consumer)?;
            match &job.queue {
                Some(queue) => check_plugin(&format!("jobs[{i}].queue"), queue)?,
                None if self.queue.is_none() => {
                    return Err(invalid(format!(
                        "jobs[{i}].queue is required when no default [queue] is configured"
                    )));
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Reject plugin kinds that are not in the given lists.
    pub fn check_kinds(
        &self,
        queues: &[&str],
        consumers: &[&str],
        notifiers: &[&str],
    ) -> Result<(), ConfigError> {
        if let Some(queue) = &self.queue {
            check_kind("queue", &queue.kind, queues)?;
        }
        if let Some(notifier) = &self.notifier {
            check_kind("notifier", &notifier.kind, notifiers)?;
        }
        for (i, job) in self.jobs.iter().enumerate() {
            check_kind(&format!("jobs[{i}].consumer"), &job.consumer.kind, consumers)?;
            if let Some(queue) = &job.queue {
                check_kind(&format!("jobs[{i}].queue"), &queue.kind, queues)?;
            }
        }
        Ok(())
    }

    /// Queue backend for a job: its own override, else the default.
    pub fn queue_for<'a>(&'a self, job: &'a JobConfig) -> Option<&'a PluginConfig> {
        job.queue.as_ref().or(self.queue.as_ref())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log
            .dir
            .clone()
            .unwrap_or_else(|| self.process.data_dir.join("logs"))
    }

    /// Whether the periodic alert scan should run.
    pub fn jobs_check_enabled(&self) -> bool {
        self.notifier.as_ref().is_some_and(|n| n.jobs_check_notify)
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

fn check_plugin(path: &str, plugin: &PluginConfig) -> Result<(), ConfigError> {
    if plugin.kind.trim().is_empty() {
        return Err(invalid(format!("{path}.kind must be a non-empty string")));
    }
    Ok(())
}

fn check_kind(path: &str, kind: &str, known: &[&str]) -> Result<(), ConfigError> {
    if known.contains(&kind) {
        return Ok(());
    }
    Err(invalid(format!(
        "{path}.kind {kind:?} is not one of: {}",
        known.join(", ")
    )))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
