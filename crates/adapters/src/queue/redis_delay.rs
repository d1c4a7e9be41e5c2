// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis sorted-set backend scored by ready time (epoch seconds).
//!
//! Only members whose score has passed are actionable. Workers poll with
//! an adaptive sleep: short while more than one item is ready, up to the
//! idle sleep when nothing is due soon.

use super::redis_list::RedisLink;
use super::{retry, Queue, QueueError, RetryPolicy};
use async_trait::async_trait;
use pj_core::PluginConfig;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Poll pacing and repush placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayTuning {
    pub busy_sleep: Duration,
    pub idle_sleep: Duration,
    /// Seconds into the future a repushed message becomes ready
    pub repush_delay: u64,
}

impl Default for DelayTuning {
    fn default() -> Self {
        Self {
            busy_sleep: Duration::from_millis(100),
            idle_sleep: Duration::from_millis(1000),
            repush_delay: 0,
        }
    }
}

impl DelayTuning {
    pub fn from_params(plugin: &PluginConfig) -> Self {
        let defaults = Self::default();
        Self {
            busy_sleep: plugin
                .param_u64("busy_sleep_ms")
                .map(Duration::from_millis)
                .unwrap_or(defaults.busy_sleep),
            idle_sleep: plugin
                .param_u64("idle_sleep_ms")
                .map(Duration::from_millis)
                .unwrap_or(defaults.idle_sleep),
            repush_delay: plugin
                .param_u64("repush_delay")
                .unwrap_or(defaults.repush_delay),
        }
    }

    /// Clamp a wanted sleep into `[busy_sleep, idle_sleep]`.
    pub fn clamp(&self, wanted: Duration) -> Duration {
        wanted.max(self.busy_sleep).min(self.idle_sleep.max(self.busy_sleep))
    }

    /// Next sleep given what the last poll saw.
    ///
    /// `ready` is how many due members were seen (capped at 2) and
    /// `next_due_in` the wait until the next not-yet-due member inside the
    /// idle window.
    pub fn next_sleep(&self, ready: usize, next_due_in: Option<Duration>) -> Duration {
        if ready >= 2 {
            return self.busy_sleep;
        }
        match next_due_in {
            Some(wait) => self.clamp(wait),
            None => self.idle_sleep,
        }
    }
}

pub struct RedisDelayQueue {
    topic: String,
    link: RedisLink,
    policy: RetryPolicy,
    tuning: DelayTuning,
    next_sleep: Duration,
}

impl RedisDelayQueue {
    pub async fn connect(plugin: &PluginConfig, topic: &str) -> Result<Self, QueueError> {
        Ok(Self {
            topic: topic.to_string(),
            link: RedisLink::open(plugin).await?,
            policy: RetryPolicy::default(),
            tuning: DelayTuning::from_params(plugin),
            next_sleep: Duration::ZERO,
        })
    }

    async fn count(&mut self, min: String, max: String) -> Result<u64, QueueError> {
        let key = self.topic.clone();
        retry(&mut self.link, &self.policy, "ZCOUNT", |link| {
            let (key, min, max) = (key.clone(), min.clone(), max.clone());
            Box::pin(async move {
                let result: redis::RedisResult<u64> = redis::cmd("ZCOUNT")
                    .arg(&key)
                    .arg(&min)
                    .arg(&max)
                    .query_async(link.conn()?)
                    .await;
                result.map_err(|e| link.fail(e))
            })
        })
        .await
    }

    /// Up to two due members plus the score of the next member due within
    /// the idle window.
    async fn peek(
        &mut self,
        now: u64,
    ) -> Result<(Vec<Vec<u8>>, Option<f64>), QueueError> {
        let key = self.topic.clone();
        let window = self.tuning.idle_sleep.as_secs().max(1);
        retry(&mut self.link, &self.policy, "ZRANGEBYSCORE", |link| {
            let key = key.clone();
            Box::pin(async move {
                let ready: redis::RedisResult<Vec<Vec<u8>>> = redis::cmd("ZRANGEBYSCORE")
                    .arg(&key)
                    .arg(0)
                    .arg(now)
                    .arg("LIMIT")
                    .arg(0)
                    .arg(2)
                    .query_async(link.conn()?)
                    .await;
                let ready = ready.map_err(|e| link.fail(e))?;
                if ready.len() >= 2 {
                    return Ok((ready, None));
                }

                let next: redis::RedisResult<Vec<(Vec<u8>, f64)>> = redis::cmd("ZRANGEBYSCORE")
                    .arg(&key)
                    .arg(now + 1)
                    .arg(now + window)
                    .arg("WITHSCORES")
                    .arg("LIMIT")
                    .arg(0)
                    .arg(1)
                    .query_async(link.conn()?)
                    .await;
                let next = next.map_err(|e| link.fail(e))?;
                Ok((ready, next.first().map(|(_, score)| *score)))
            })
        })
        .await
    }

    async fn remove(&mut self, member: Vec<u8>) -> Result<bool, QueueError> {
        let key = self.topic.clone();
        retry(&mut self.link, &self.policy, "ZREM", |link| {
            let (key, member) = (key.clone(), member.clone());
            Box::pin(async move {
                let result: redis::RedisResult<u64> = redis::cmd("ZREM")
                    .arg(&key)
                    .arg(member)
                    .query_async(link.conn()?)
                    .await;
                result.map(|n| n > 0).map_err(|e| link.fail(e))
            })
        })
        .await
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl Queue for RedisDelayQueue {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn size(&mut self) -> Result<u64, QueueError> {
        self.count("0".to_string(), epoch_secs().to_string()).await
    }

    async fn all_size(&mut self) -> Result<u64, QueueError> {
        self.count("-inf".to_string(), "+inf".to_string()).await
    }

    async fn pop(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, QueueError> {
        let sleep = self.tuning.clamp(self.next_sleep).min(timeout);
        tokio::time::sleep(sleep).await;

        let now = epoch_secs();
        let (mut ready, next_score) = self.peek(now).await?;
        let next_due_in =
            next_score.map(|score| Duration::from_secs((score as u64).saturating_sub(now)));
        self.next_sleep = self.tuning.next_sleep(ready.len(), next_due_in);

        if ready.is_empty() {
            return Ok(None);
        }
        let member = ready.swap_remove(0);
        // Another worker may have claimed it between the read and the remove
        if !self.remove(member.clone()).await? {
            return Ok(None);
        }
        Ok(Some(member))
    }

    async fn repush(&mut self, body: &[u8]) -> Result<bool, QueueError> {
        let key = self.topic.clone();
        let body = body.to_vec();
        let score = epoch_secs() + self.tuning.repush_delay;
        retry(&mut self.link, &self.policy, "ZADD", |link| {
            let (key, body) = (key.clone(), body.clone());
            Box::pin(async move {
                let result: redis::RedisResult<u64> = redis::cmd("ZADD")
                    .arg(&key)
                    .arg(score)
                    .arg(body)
                    .query_async(link.conn()?)
                    .await;
                // ZADD returns 0 when only the score of an existing member moved
                result.map(|_| true).map_err(|e| link.fail(e))
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

#[cfg(test)]
#[path = "redis_delay_tests.rs"]
mod tests;
