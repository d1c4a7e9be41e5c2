// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell command consumer.
//!
//! Runs `sh -c <command>` with the message body on stdin and `PJ_TOPIC` in
//! the environment. The exit code picks the disposition.

use super::{Consumer, ConsumerError};
use crate::subprocess::{run_with_input, COMMAND_CONSUMER_TIMEOUT};
use async_trait::async_trait;
use pj_core::{Message, PluginConfig};
use std::time::Duration;
use tokio::process::Command;

/// Exit code meaning "reject" (EX_DATAERR)
pub const DEFAULT_REJECT_EXIT_CODE: i32 = 65;
/// Exit code meaning "repush" (EX_TEMPFAIL)
pub const DEFAULT_REPUSH_EXIT_CODE: i32 = 75;

#[derive(Debug, Clone)]
pub struct CommandConsumer {
    topic: String,
    command: String,
    timeout: Duration,
    reject_exit_code: i32,
    repush_exit_code: i32,
}

impl CommandConsumer {
    pub fn new(topic: &str, command: &str) -> Self {
        Self {
            topic: topic.to_string(),
            command: command.to_string(),
            timeout: COMMAND_CONSUMER_TIMEOUT,
            reject_exit_code: DEFAULT_REJECT_EXIT_CODE,
            repush_exit_code: DEFAULT_REPUSH_EXIT_CODE,
        }
    }

    pub fn from_params(plugin: &PluginConfig, topic: &str) -> Result<Self, ConsumerError> {
        let command = plugin
            .param_str("command")
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                ConsumerError::Config("command consumer requires params.command".into())
            })?;
        let mut consumer = Self::new(topic, command);
        if let Some(secs) = plugin.param_u64("timeout") {
            consumer.timeout = Duration::from_secs(secs);
        }
        if let Some(code) = plugin.param_i64("reject_exit_code") {
            consumer.reject_exit_code = exit_code(code, "reject_exit_code")?;
        }
        if let Some(code) = plugin.param_i64("repush_exit_code") {
            consumer.repush_exit_code = exit_code(code, "repush_exit_code")?;
        }
        if consumer.reject_exit_code == consumer.repush_exit_code {
            return Err(ConsumerError::Config(
                "reject_exit_code and repush_exit_code must differ".into(),
            ));
        }
        Ok(consumer)
    }
}

fn exit_code(code: i64, name: &str) -> Result<i32, ConsumerError> {
    match i32::try_from(code) {
        Ok(code) if (1..=255).contains(&code) => Ok(code),
        _ => Err(ConsumerError::Config(format!(
            "{name} must be between 1 and 255"
        ))),
    }
}

#[async_trait]
impl Consumer for CommandConsumer {
    async fn consume(&self, message: &mut Message) -> Result<(), ConsumerError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.command).env("PJ_TOPIC", &self.topic);

        let output = run_with_input(cmd, message.body(), self.timeout, "consumer command")
            .await
            .map_err(ConsumerError::Failed)?;

        match output.status.code() {
            Some(0) => {
                message.ack();
            }
            Some(code) if code == self.reject_exit_code => {
                message.reject();
            }
            Some(code) if code == self.repush_exit_code => {
                message.repush();
            }
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stderr = stderr.trim();
                return Err(ConsumerError::Failed(match code {
                    Some(code) => format!("command exited with {code}: {stderr}"),
                    None => format!("command killed by signal: {stderr}"),
                }));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
