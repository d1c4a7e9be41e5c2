// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis list backend: producers LPUSH, workers BRPOP.

use super::{retry, Queue, QueueError, Reconnect, RetryPolicy};
use async_trait::async_trait;
use pj_core::PluginConfig;
use redis::aio::MultiplexedConnection;
use std::time::Duration;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/0";

/// A Redis client plus its current connection, if any.
pub struct RedisLink {
    client: redis::Client,
    conn: Option<MultiplexedConnection>,
}

impl RedisLink {
    /// Open a client from the `url` param and connect.
    pub async fn open(plugin: &PluginConfig) -> Result<Self, QueueError> {
        let url = plugin.param_str("url").unwrap_or(DEFAULT_REDIS_URL);
        let client = redis::Client::open(url)
            .map_err(|e| QueueError::Config(format!("invalid redis url {url}: {e}")))?;
        let mut link = Self { client, conn: None };
        link.reconnect().await?;
        Ok(link)
    }

    /// Current connection, or a transient error if it was dropped.
    pub fn conn(&mut self) -> Result<&mut MultiplexedConnection, QueueError> {
        self.conn
            .as_mut()
            .ok_or_else(|| QueueError::Transient("not connected".to_string()))
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn close(&mut self) {
        self.conn = None;
    }

    /// Classify a redis error, forgetting the connection when it is gone.
    pub fn fail(&mut self, e: redis::RedisError) -> QueueError {
        let err = classify(e);
        if err.is_transient() {
            self.conn = None;
        }
        err
    }
}

#[async_trait]
impl Reconnect for RedisLink {
    async fn reconnect(&mut self) -> Result<(), QueueError> {
        self.conn = None;
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(classify)?;
        self.conn = Some(conn);
        Ok(())
    }
}

pub(super) fn classify(e: redis::RedisError) -> QueueError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
    {
        QueueError::Transient(e.to_string())
    } else {
        QueueError::Fatal(e.to_string())
    }
}

/// Topic backed by a Redis list of the same name.
pub struct RedisListQueue {
    topic: String,
    link: RedisLink,
    policy: RetryPolicy,
}

impl RedisListQueue {
    pub async fn connect(plugin: &PluginConfig, topic: &str) -> Result<Self, QueueError> {
        Ok(Self {
            topic: topic.to_string(),
            link: RedisLink::open(plugin).await?,
            policy: RetryPolicy::default(),
        })
    }
}

#[async_trait]
impl Queue for RedisListQueue {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn size(&mut self) -> Result<u64, QueueError> {
        let key = self.topic.clone();
        retry(&mut self.link, &self.policy, "LLEN", |link| {
            let key = key.clone();
            Box::pin(async move {
                let result: redis::RedisResult<u64> =
                    redis::cmd("LLEN").arg(&key).query_async(link.conn()?).await;
                result.map_err(|e| link.fail(e))
            })
        })
        .await
    }

    async fn pop(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, QueueError> {
        let key = self.topic.clone();
        let secs = timeout.as_secs().max(1);
        retry(&mut self.link, &self.policy, "BRPOP", |link| {
            let key = key.clone();
            Box::pin(async move {
                let result: redis::RedisResult<Option<(String, Vec<u8>)>> = redis::cmd("BRPOP")
                    .arg(&key)
                    .arg(secs)
                    .query_async(link.conn()?)
                    .await;
                result.map(|item| item.map(|(_, body)| body)).map_err(|e| link.fail(e))
            })
        })
        .await
    }

    async fn repush(&mut self, body: &[u8]) -> Result<bool, QueueError> {
        let key = self.topic.clone();
        let body = body.to_vec();
        retry(&mut self.link, &self.policy, "LPUSH", |link| {
            let key = key.clone();
            let body = body.clone();
            Box::pin(async move {
                let result: redis::RedisResult<u64> = redis::cmd("LPUSH")
                    .arg(&key)
                    .arg(body)
                    .query_async(link.conn()?)
                    .await;
                result.map(|len| len > 0).map_err(|e| link.fail(e))
            })
        })
        .await
    }

    fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    async fn close(&mut self) {
        self.link.close();
    }
}
