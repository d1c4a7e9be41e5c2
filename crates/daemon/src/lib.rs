// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pj daemon library
//!
//! The master supervisor, the worker runtime, and the on-disk files they
//! share. The CLI uses the path, pid file, and status helpers directly.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod jobs;
pub mod lifecycle;
pub mod logging;
pub mod master;
pub mod paths;
pub mod pidfile;
pub mod process;
pub mod status_file;
pub mod table;
pub mod worker;

pub use jobs::{Jobs, WorkerHandle};
pub use lifecycle::{LifecycleError, MasterTimers, Registries};
pub use master::{Master, MasterEvent, SpawnError, Spawner, StartError};
pub use paths::DataPaths;
pub use pidfile::{read_pid, PidFile, PidFileError};
pub use table::{MasterTable, TableError};
pub use worker::{WorkerRuntime, WorkerSpec};
