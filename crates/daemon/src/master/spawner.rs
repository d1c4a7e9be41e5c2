// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process spawning and reaping.

use super::MasterEvent;
use crate::process::force_kill;
use crate::worker::{WorkerSpec, WORKER_SPEC_ENV};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn worker: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode worker spec: {0}")]
    Spec(String),

    #[error("spawn refused: {0}")]
    Refused(String),
}

/// Starts worker processes for the master.
pub trait Spawner: Send {
    /// Start a worker and return its pid. Its exit must later arrive as
    /// [`MasterEvent::ChildExited`].
    fn spawn(&mut self, spec: &WorkerSpec) -> Result<u32, SpawnError>;

    /// Forcefully stop a worker that ignored a drain.
    fn terminate(&mut self, pid: u32);
}

/// Re-executes the current binary as `<exe> worker` with the spec in the
/// environment. A reaper task per child reports its exit.
pub struct ProcessSpawner {
    exe: PathBuf,
    events: mpsc::UnboundedSender<MasterEvent>,
}

impl ProcessSpawner {
    pub fn new(events: mpsc::UnboundedSender<MasterEvent>) -> io::Result<Self> {
        Ok(Self::with_exe(std::env::current_exe()?, events))
    }

    pub fn with_exe(exe: PathBuf, events: mpsc::UnboundedSender<MasterEvent>) -> Self {
        Self { exe, events }
    }
}

impl Spawner for ProcessSpawner {
    fn spawn(&mut self, spec: &WorkerSpec) -> Result<u32, SpawnError> {
        let encoded = spec.to_env().map_err(|e| SpawnError::Spec(e.to_string()))?;
        let mut child = tokio::process::Command::new(&self.exe)
            .arg("worker")
            .env(WORKER_SPEC_ENV, encoded)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| SpawnError::Refused("worker exited before reporting a pid".into()))?;

        let events = self.events.clone();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(pid, error = %e, "failed to wait on worker");
                    None
                }
            };
            let _ = events.send(MasterEvent::ChildExited { pid, code });
        });

        Ok(pid)
    }

    fn terminate(&mut self, pid: u32) {
        if !force_kill(pid) {
            warn!(pid, "failed to kill worker");
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSpawner, SpawnCall};

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use pj_core::WorkerKind;
    use std::sync::Arc;

    /// A recorded spawn
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SpawnCall {
        pub pid: u32,
        pub topic: String,
        pub kind: WorkerKind,
    }

    struct FakeSpawnerState {
        next_pid: u32,
        spawned: Vec<SpawnCall>,
        fail_next: usize,
        fail_always: bool,
        terminated: Vec<u32>,
    }

    /// In-process spawner that hands out sequential pids and starts nothing.
    #[derive(Clone)]
    pub struct FakeSpawner {
        inner: Arc<Mutex<FakeSpawnerState>>,
    }

    impl Default for FakeSpawner {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeSpawnerState {
                    next_pid: 1000,
                    spawned: Vec::new(),
                    fail_next: 0,
                    fail_always: false,
                    terminated: Vec::new(),
                })),
            }
        }
    }

    impl FakeSpawner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn spawned(&self) -> Vec<SpawnCall> {
            self.inner.lock().spawned.clone()
        }

        /// Fail the next `n` spawns.
        pub fn fail_next(&self, n: usize) {
            self.inner.lock().fail_next = n;
        }

        pub fn set_fail(&self, fail: bool) {
            self.inner.lock().fail_always = fail;
        }

        pub fn terminated(&self) -> Vec<u32> {
            self.inner.lock().terminated.clone()
        }
    }

    impl Spawner for FakeSpawner {
        fn spawn(&mut self, spec: &WorkerSpec) -> Result<u32, SpawnError> {
            let mut state = self.inner.lock();
            if state.fail_always {
                return Err(SpawnError::Refused("fake spawner set to fail".into()));
            }
            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(SpawnError::Refused("fake spawner set to fail".into()));
            }
            let pid = state.next_pid;
            state.next_pid += 1;
            state.spawned.push(SpawnCall {
                pid,
                topic: spec.topic.clone(),
                kind: spec.kind,
            });
            Ok(pid)
        }

        fn terminate(&mut self, pid: u32) {
            self.inner.lock().terminated.push(pid);
        }
    }
}

#[cfg(test)]
#[path = "spawner_tests.rs"]
mod tests;
