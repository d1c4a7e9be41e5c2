// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: queue backends, consumers, notifiers

pub mod consumer;
pub mod notify;
pub mod queue;
pub mod subprocess;

pub use consumer::{CommandConsumer, Consumer, ConsumerError, ConsumerRegistry, LogConsumer};
pub use notify::{
    NoOpNotifyAdapter, NotifierRegistry, NotifyAdapter, NotifyError, WebhookNotifyAdapter,
};
pub use queue::{
    Queue, QueueError, QueueRegistry, RedisDelayQueue, RedisListQueue, RetryPolicy, POP_TIMEOUT,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use consumer::{Behavior, ScriptedConsumer};
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifyAdapter, NotifyCall};
#[cfg(any(test, feature = "test-support"))]
pub use queue::{MemoryBroker, MemoryQueue};
