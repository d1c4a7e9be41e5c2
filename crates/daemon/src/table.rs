// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared master table.
//!
//! A single fixed-schema record the master publishes and every worker
//! polls. Writes replace the file atomically, so a reader sees either the
//! previous record or the new one.

use crate::paths::write_atomic;
use pj_core::MasterRecord;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("master table missing")]
    Missing,

    #[error("master table corrupt: {0}")]
    Corrupt(String),

    #[error("master table io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct MasterTable {
    path: PathBuf,
}

impl MasterTable {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the master record. Only the master calls this.
    pub fn publish(&self, record: &MasterRecord) -> Result<(), TableError> {
        let json =
            serde_json::to_vec(record).map_err(|e| TableError::Corrupt(e.to_string()))?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }

    pub fn read(&self) -> Result<MasterRecord, TableError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(TableError::Missing),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| TableError::Corrupt(e.to_string()))
    }

    pub fn remove(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
