// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pj-core: shared types for the pj job-queue worker supervisor

pub mod clock;
pub mod config;
pub mod master;
pub mod message;
pub mod stats;
pub mod time_fmt;
pub mod worker;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use config::{
    Config, ConfigError, JobConfig, LogConfig, LogRotation, NotifierConfig, PluginConfig,
    ProcessConfig, WorkerLimits,
};
pub use master::{MasterRecord, MasterStatus, REFRESH_TABLE_CYCLE};
pub use message::{Disposition, Message};
pub use stats::{AlertState, HistorySummary, JobSummary, SummaryError, WorkerTotals};
pub use time_fmt::{format_elapsed, format_uptime};
pub use worker::{WorkerCounters, WorkerKind, WorkerState, WorkerStatusRecord};
