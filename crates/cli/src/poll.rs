// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polling loop helper for CLI commands.
//!
//! The master is only reachable through signals and files, so every command
//! that waits on it polls the data directory with a deadline and Ctrl+C
//! support.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

/// Result of waiting for the next poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Ready for the next poll iteration.
    Ready,
    /// The deadline was reached.
    Timeout,
    /// Ctrl+C was pressed.
    Interrupted,
}

/// A polling loop helper with interval timing, optional deadline, and Ctrl+C handling.
pub struct Poller {
    interval: Duration,
    deadline: Option<Instant>,
    ctrl_c: Pin<Box<dyn Future<Output = std::io::Result<()>>>>,
}

impl Poller {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self {
            interval,
            deadline: timeout.map(|t| Instant::now() + t),
            ctrl_c: Box::pin(tokio::signal::ctrl_c()),
        }
    }

    /// Wait for the next poll tick.
    ///
    /// Returns [`Tick::Timeout`] if the deadline has been reached (checked
    /// both before and after sleeping) and [`Tick::Interrupted`] if Ctrl+C
    /// was pressed during the sleep.
    pub async fn tick(&mut self) -> Tick {
        if self.expired() {
            return Tick::Timeout;
        }

        tokio::select! {
            _ = &mut self.ctrl_c => Tick::Interrupted,
            _ = tokio::time::sleep(self.interval) => {
                if self.expired() {
                    return Tick::Timeout;
                }
                Tick::Ready
            }
        }
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Poll `done` until it returns true.
///
/// Returns [`Tick::Ready`] once the condition holds; the condition is
/// checked once more after the deadline so a last-moment change still wins.
pub async fn wait_until(
    interval: Duration,
    timeout: Duration,
    mut done: impl FnMut() -> bool,
) -> Tick {
    let mut poller = Poller::new(interval, Some(timeout));
    loop {
        if done() {
            return Tick::Ready;
        }
        match poller.tick().await {
            Tick::Ready => {}
            Tick::Timeout if done() => return Tick::Ready,
            other => return other,
        }
    }
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
