// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data directory layout.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Files the master and its workers share under `process.data_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPaths {
    pub data_dir: PathBuf,
    /// Numeric pid of the live master, held under an exclusive lock
    pub pid_file: PathBuf,
    /// Shared master record read by workers
    pub table_file: PathBuf,
    /// Latest status report
    pub status_file: PathBuf,
    /// Size-capped history of reports written at shutdown
    pub ghost_file: PathBuf,
    /// One `{pid}.info` per live worker
    pub workers_dir: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            pid_file: data_dir.join("master.pid"),
            table_file: data_dir.join("master.table"),
            status_file: data_dir.join("status.info"),
            ghost_file: data_dir.join("status-ghost.info"),
            workers_dir: data_dir.join("workers"),
        }
    }

    pub fn worker_status(&self, pid: u32) -> PathBuf {
        self.workers_dir.join(format!("{pid}.info"))
    }

    pub fn create_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.workers_dir)
    }
}

/// Replace `path` with `contents` so readers see the old or the new file,
/// never a partial one (write `<path>.tmp`, fsync, rename).
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
