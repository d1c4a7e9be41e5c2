// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory queue backend for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ConnectFuture, Queue, QueueError};
use async_trait::async_trait;
use parking_lot::Mutex;
use pj_core::PluginConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, VecDeque<Vec<u8>>>,
    size_error: Option<QueueError>,
    connect_errors: VecDeque<QueueError>,
    connects: usize,
}

/// Shared store standing in for a queue server. Every [`MemoryQueue`]
/// connected through the same broker sees the same topics.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the tail of `topic`.
    pub fn push(&self, topic: &str, body: impl Into<Vec<u8>>) {
        self.inner
            .lock()
            .topics
            .entry(topic.to_string())
            .or_default()
            .push_back(body.into());
    }

    pub fn len(&self, topic: &str) -> usize {
        self.inner.lock().topics.get(topic).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, topic: &str) -> bool {
        self.len(topic) == 0
    }

    /// Snapshot of a topic's contents, head first.
    pub fn contents(&self, topic: &str) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .topics
            .get(topic)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Make every `size` call fail with `error` until cleared.
    pub fn fail_size(&self, error: Option<QueueError>) {
        self.inner.lock().size_error = error;
    }

    /// Queue up errors returned by the next connects, in order.
    pub fn fail_connects(&self, errors: Vec<QueueError>) {
        self.inner.lock().connect_errors.extend(errors);
    }

    pub fn connects(&self) -> usize {
        self.inner.lock().connects
    }

    /// Connect a queue for `topic` directly.
    pub fn queue(&self, topic: &str) -> MemoryQueue {
        MemoryQueue {
            topic: topic.to_string(),
            broker: self.clone(),
            connected: true,
        }
    }

    /// Connector suitable for [`super::QueueRegistry::register`].
    pub fn connector(&self) -> impl Fn(PluginConfig, String) -> ConnectFuture + Send + Sync + 'static {
        let broker = self.clone();
        move |_plugin, topic| {
            let broker = broker.clone();
            Box::pin(async move {
                let failure = {
                    let mut state = broker.inner.lock();
                    state.connects += 1;
                    state.connect_errors.pop_front()
                };
                match failure {
                    Some(e) => Err(e),
                    None => Ok(Box::new(broker.queue(&topic)) as Box<dyn Queue>),
                }
            })
        }
    }
}

/// Queue handle over a [`MemoryBroker`] topic.
pub struct MemoryQueue {
    topic: String,
    broker: MemoryBroker,
    connected: bool,
}

#[async_trait]
impl Queue for MemoryQueue {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn size(&mut self) -> Result<u64, QueueError> {
        if let Some(e) = self.broker.inner.lock().size_error.clone() {
            return Err(e);
        }
        Ok(self.broker.len(&self.topic) as u64)
    }

    async fn pop(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, QueueError> {
        let body = self
            .broker
            .inner
            .lock()
            .topics
            .get_mut(&self.topic)
            .and_then(VecDeque::pop_front);
        if body.is_none() {
            // Behave like a blocking pop that timed out
            tokio::time::sleep(timeout.min(Duration::from_millis(10))).await;
        }
        Ok(body)
    }

    async fn repush(&mut self, body: &[u8]) -> Result<bool, QueueError> {
        self.broker.push(&self.topic, body.to_vec());
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) {
        self.connected = false;
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
