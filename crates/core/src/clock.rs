// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time source abstraction so lifecycle checks can run against a fake clock.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Monotonic plus wall-clock time source.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic instant, used for elapsed/idle arithmetic.
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;

    /// Wall-clock seconds since the Unix epoch.
    fn epoch_secs(&self) -> i64 {
        (self.epoch_ms() / 1000) as i64
    }
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeClock;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FakeTime {
        instant: Instant,
        epoch_ms: u64,
    }

    /// Manually advanced clock for tests. Clones share the same time.
    #[derive(Clone)]
    pub struct FakeClock {
        inner: Arc<Mutex<FakeTime>>,
    }

    impl Default for FakeClock {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeTime {
                    instant: Instant::now(),
                    epoch_ms: 1_700_000_000_000,
                })),
            }
        }
    }

    impl FakeClock {
        pub fn new() -> Self {
            Self::default()
        }

        /// Move both the monotonic and the wall clock forward.
        pub fn advance(&self, by: Duration) {
            let mut time = self.inner.lock();
            time.instant += by;
            time.epoch_ms += by.as_millis() as u64;
        }

        pub fn set_epoch_ms(&self, epoch_ms: u64) {
            self.inner.lock().epoch_ms = epoch_ms;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.inner.lock().instant
        }

        fn epoch_ms(&self) -> u64 {
            self.inner.lock().epoch_ms
        }
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
