// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Everything a worker process needs, handed over from the master.

use crate::paths::DataPaths;
use pj_core::{LogConfig, PluginConfig, WorkerKind, WorkerLimits};
use serde::{Deserialize, Serialize};

/// Environment variable carrying the serialized [`WorkerSpec`].
pub const WORKER_SPEC_ENV: &str = "PJ_WORKER_SPEC";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub topic: String,
    pub kind: WorkerKind,
    pub limits: WorkerLimits,
    pub queue: PluginConfig,
    pub consumer: PluginConfig,
    pub paths: DataPaths,
    pub master_pid: u32,
    /// Configured `process.name`; workers log as `worker:<name>`
    pub process_name: String,
    /// Log settings with the directory already resolved
    pub log: LogConfig,
}

impl WorkerSpec {
    /// Label that tells this worker's log lines apart from the master's.
    pub fn process_label(&self) -> String {
        format!("worker:{}", self.process_name)
    }

    pub fn to_env(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Read the spec the master put in this process's environment.
    pub fn from_env() -> Result<Self, String> {
        let raw = std::env::var(WORKER_SPEC_ENV)
            .map_err(|_| format!("{WORKER_SPEC_ENV} is not set"))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| format!("invalid {WORKER_SPEC_ENV}: {e}"))
    }
}
