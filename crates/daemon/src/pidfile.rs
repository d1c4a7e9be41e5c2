// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master pid file.
//!
//! The file holds the master's pid as text and stays under an exclusive
//! advisory lock for the master's lifetime, so a second master on the same
//! data directory fails fast instead of racing the first.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("master already running (pid {0})")]
    AlreadyRunning(u32),

    #[error("pid file names another live master (pid {0})")]
    Mismatch(u32),

    #[error("failed to lock pid file: master already running?")]
    LockFailed(#[source] io::Error),

    #[error("pid file io error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of a periodic pid file check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidCheck {
    Ok,
    /// The file was missing or stale and has been rewritten
    Repaired,
}

/// A locked pid file owned by the running master.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    pid: u32,
    file: File,
}

impl PidFile {
    /// Lock `path` and write `pid` into it.
    pub fn acquire(path: &Path, pid: u32) -> Result<Self, PidFileError> {
        let file = open_locked(path)?;
        let mut pid_file = Self {
            path: path.to_path_buf(),
            pid,
            file,
        };
        pid_file.write_pid()?;
        Ok(pid_file)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Confirm the file still names this master, repairing it when it was
    /// lost or names a dead process. A different live pid is an error.
    pub fn verify(&mut self, alive: impl Fn(u32) -> bool) -> Result<PidCheck, PidFileError> {
        match read_pid(&self.path) {
            Some(pid) if pid == self.pid => Ok(PidCheck::Ok),
            Some(pid) if alive(pid) => Err(PidFileError::Mismatch(pid)),
            _ => {
                if !self.is_same_file() {
                    self.file = open_locked(&self.path)?;
                }
                self.write_pid()?;
                Ok(PidCheck::Repaired)
            }
        }
    }

    /// Delete the file; the lock is released when the handle drops.
    pub fn remove(self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn write_pid(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        writeln!(self.file, "{}", self.pid)?;
        self.file.sync_all()
    }

    /// Whether our handle still refers to the file at `path`.
    fn is_same_file(&self) -> bool {
        match (self.file.metadata(), std::fs::metadata(&self.path)) {
            (Ok(held), Ok(on_disk)) => held.dev() == on_disk.dev() && held.ino() == on_disk.ino(),
            _ => false,
        }
    }
}

/// Open without truncating so a running master's pid survives until we
/// hold the lock.
fn open_locked(path: &Path) -> Result<File, PidFileError> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.try_lock_exclusive().map_err(PidFileError::LockFailed)?;
    Ok(file)
}

/// Read the pid named in `path`, if the file exists and holds a number.
pub fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
}

#[cfg(test)]
#[path = "pidfile_tests.rs"]
mod tests;
