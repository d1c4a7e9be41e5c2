// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{Consumer, ConsumerError};
use async_trait::async_trait;
use pj_core::Message;

/// Logs each message body and acks it.
#[derive(Debug, Clone)]
pub struct LogConsumer {
    topic: String,
}

impl LogConsumer {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
        }
    }
}

#[async_trait]
impl Consumer for LogConsumer {
    async fn consume(&self, message: &mut Message) -> Result<(), ConsumerError> {
        tracing::info!(topic = %self.topic, body = %message.body_str(), "message received");
        message.ack();
        Ok(())
    }
}
