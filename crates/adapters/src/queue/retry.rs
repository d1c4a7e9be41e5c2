// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnect-and-retry for queue commands.

use super::QueueError;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Delays before each retry of a failed command. The first attempt is
/// always immediate; one retry runs per listed delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(2),
            ],
        }
    }
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

/// A connection that can be re-established in place.
#[async_trait]
pub trait Reconnect: Send {
    async fn reconnect(&mut self) -> Result<(), QueueError>;
}

/// Run `op` against `link`, reconnecting and retrying on transient errors.
///
/// Fatal errors return immediately. Once the policy is exhausted the last
/// transient error is returned.
pub async fn retry<L, T, F>(
    link: &mut L,
    policy: &RetryPolicy,
    command: &str,
    mut op: F,
) -> Result<T, QueueError>
where
    L: Reconnect,
    F: for<'a> FnMut(&'a mut L) -> Pin<Box<dyn Future<Output = Result<T, QueueError>> + Send + 'a>>,
{
    let mut last = match op(link).await {
        Ok(value) => return Ok(value),
        Err(e) if e.is_transient() => e,
        Err(e) => return Err(e),
    };

    for (attempt, delay) in policy.delays().iter().enumerate() {
        tracing::warn!(command, attempt = attempt + 1, error = %last, "queue command failed, reconnecting");
        if !delay.is_zero() {
            tokio::time::sleep(*delay).await;
        }
        if let Err(e) = link.reconnect().await {
            if !e.is_transient() {
                return Err(e);
            }
            last = e;
            continue;
        }
        match op(link).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => last = e,
            Err(e) => return Err(e),
        }
    }

    Err(last)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
