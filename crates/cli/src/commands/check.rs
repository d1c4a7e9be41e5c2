// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pj check` - validate a config file without starting anything

use crate::output::{print_result, OutputFormat};
use anyhow::Result;
use pj_daemon::lifecycle::check_config;
use pj_daemon::Registries;
use std::path::Path;

/// What a valid config would start.
#[derive(Debug, PartialEq)]
pub struct CheckSummary {
    pub name: String,
    pub topics: Vec<String>,
    pub static_workers: u32,
    pub max_workers: usize,
}

/// Runs the same validation `pjd` runs at startup, against the built-in
/// plugin registries.
pub fn validate(config_path: &Path) -> Result<CheckSummary> {
    let (config, _) = super::load(config_path)?;
    check_config(&config, &Registries::builtin())?;
    Ok(CheckSummary {
        name: config.process.name.clone(),
        topics: config.jobs.iter().map(|job| job.topic.clone()).collect(),
        static_workers: config.jobs.iter().map(|job| job.static_workers).sum(),
        max_workers: config.jobs.iter().map(|job| job.ceiling()).sum(),
    })
}

pub fn check(config_path: &Path, format: OutputFormat) -> Result<()> {
    let summary = validate(config_path)?;
    print_result(
        format,
        || {
            format!(
                "{}: config ok ({} job(s): {}; {} static worker(s), up to {})",
                config_path.display(),
                summary.topics.len(),
                summary.topics.join(", "),
                summary.static_workers,
                summary.max_workers,
            )
        },
        || {
            serde_json::json!({
                "valid": true,
                "name": summary.name,
                "topics": summary.topics,
                "static_workers": summary.static_workers,
                "max_workers": summary.max_workers,
            })
        },
    )
}

#[cfg(test)]
#[path = "check_tests.rs"]
mod tests;
