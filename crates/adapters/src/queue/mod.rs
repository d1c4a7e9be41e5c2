// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue contract and backend registry.
//!
//! Every worker owns exactly one connected [`Queue`]; the master holds one
//! more per topic for backlog checks. Backends retry transient connection
//! loss internally through [`retry`], so callers see either a result or a
//! final error.

mod redis_delay;
mod redis_list;
mod retry;

pub use redis_delay::{DelayTuning, RedisDelayQueue};
pub use redis_list::{RedisLink, RedisListQueue, DEFAULT_REDIS_URL};
pub use retry::{retry, Reconnect, RetryPolicy};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod memory;
#[cfg(any(test, feature = "test-support"))]
pub use memory::{MemoryBroker, MemoryQueue};

use async_trait::async_trait;
use pj_core::PluginConfig;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long a worker blocks on a single pop.
pub const POP_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors from queue operations
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// Connection dropped or timed out; worth reconnecting and retrying
    #[error("queue connection lost: {0}")]
    Transient(String),

    /// Anything retrying will not fix (auth, bad command, bad data)
    #[error("queue error: {0}")]
    Fatal(String),

    /// Unknown backend kind or bad parameters
    #[error("queue config error: {0}")]
    Config(String),
}

impl QueueError {
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::Transient(_))
    }
}

/// A connected queue for one topic.
#[async_trait]
pub trait Queue: Send {
    /// Topic this queue reads from
    fn topic(&self) -> &str;

    /// Actionable backlog.
    async fn size(&mut self) -> Result<u64, QueueError>;

    /// Everything in the queue, including items not yet ready.
    async fn all_size(&mut self) -> Result<u64, QueueError> {
        self.size().await
    }

    /// Dequeue one message, waiting at most `timeout`.
    async fn pop(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, QueueError>;

    /// Put a previously popped body back.
    async fn repush(&mut self, body: &[u8]) -> Result<bool, QueueError>;

    fn is_connected(&self) -> bool;

    async fn close(&mut self);
}

pub type ConnectFuture = Pin<Box<dyn Future<Output = Result<Box<dyn Queue>, QueueError>> + Send>>;

type Connector = Arc<dyn Fn(PluginConfig, String) -> ConnectFuture + Send + Sync>;

/// Maps a configured queue `kind` to a backend constructor.
#[derive(Clone, Default)]
pub struct QueueRegistry {
    connectors: HashMap<String, Connector>,
    policy: RetryPolicy,
}

impl QueueRegistry {
    /// Registry with no backends.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in Redis backends.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("redis", |plugin, topic| {
            Box::pin(async move {
                let queue = RedisListQueue::connect(&plugin, &topic).await?;
                Ok(Box::new(queue) as Box<dyn Queue>)
            })
        });
        registry.register("redis-delay", |plugin, topic| {
            Box::pin(async move {
                let queue = RedisDelayQueue::connect(&plugin, &topic).await?;
                Ok(Box::new(queue) as Box<dyn Queue>)
            })
        });
        registry
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn register<F>(&mut self, kind: &str, connector: F)
    where
        F: Fn(PluginConfig, String) -> ConnectFuture + Send + Sync + 'static,
    {
        self.connectors.insert(kind.to_string(), Arc::new(connector));
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.connectors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Connect a queue for `topic`, retrying transient failures.
    pub async fn connect(
        &self,
        plugin: &PluginConfig,
        topic: &str,
    ) -> Result<Box<dyn Queue>, QueueError> {
        let connector = self
            .connectors
            .get(&plugin.kind)
            .ok_or_else(|| QueueError::Config(format!("unknown queue kind: {}", plugin.kind)))?;

        let mut delays = self.policy.delays().iter();
        loop {
            match connector(plugin.clone(), topic.to_string()).await {
                Ok(queue) => return Ok(queue),
                Err(e) if e.is_transient() => match delays.next() {
                    Some(delay) => {
                        tracing::warn!(topic, kind = %plugin.kind, error = %e, "queue connect failed, retrying");
                        tokio::time::sleep(*delay).await;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
