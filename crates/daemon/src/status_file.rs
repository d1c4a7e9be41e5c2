// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker status files under `workers/`.

use crate::paths::write_atomic;
use pj_core::WorkerStatusRecord;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusFileError {
    #[error("status file io error: {0}")]
    Io(#[from] io::Error),

    #[error("status file malformed: {0}")]
    Malformed(String),
}

/// Persist a worker's record. Only the worker itself writes its file.
pub fn write_worker_status(path: &Path, record: &WorkerStatusRecord) -> Result<(), StatusFileError> {
    let json = serde_json::to_vec_pretty(record)
        .map_err(|e| StatusFileError::Malformed(e.to_string()))?;
    write_atomic(path, &json)?;
    Ok(())
}

pub fn read_worker_status(path: &Path) -> Result<WorkerStatusRecord, StatusFileError> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| StatusFileError::Malformed(e.to_string()))
}

/// Remove every file in the workers directory, returning how many went.
pub fn sweep_worker_dir(dir: &Path) -> io::Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
#[path = "status_file_tests.rs"]
mod tests;
