// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consumers: per-topic message handling logic.
//!
//! A consumer must settle the message (ack, reject, or repush) before
//! returning `Ok`. An error, a panic, or an unsettled message counts as a
//! failed message.

mod command;
mod log;

pub use command::CommandConsumer;
pub use log::LogConsumer;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{Behavior, ScriptedConsumer};

use async_trait::async_trait;
use pj_core::{Message, PluginConfig};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from consumers
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("consume failed: {0}")]
    Failed(String),

    #[error("consumer config error: {0}")]
    Config(String),
}

#[async_trait]
pub trait Consumer: Send + Sync + 'static {
    async fn consume(&self, message: &mut Message) -> Result<(), ConsumerError>;
}

type Builder =
    Arc<dyn Fn(&PluginConfig, &str) -> Result<Arc<dyn Consumer>, ConsumerError> + Send + Sync>;

/// Maps a configured consumer `kind` to a constructor taking the plugin
/// params and the topic.
#[derive(Clone, Default)]
pub struct ConsumerRegistry {
    builders: HashMap<String, Builder>,
}

impl ConsumerRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with `log` and `command`.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("log", |_, topic| Ok(Arc::new(LogConsumer::new(topic))));
        registry.register("command", |plugin, topic| {
            Ok(Arc::new(CommandConsumer::from_params(plugin, topic)?))
        });
        registry
    }

    pub fn register<F>(&mut self, kind: &str, builder: F)
    where
        F: Fn(&PluginConfig, &str) -> Result<Arc<dyn Consumer>, ConsumerError>
            + Send
            + Sync
            + 'static,
    {
        self.builders.insert(kind.to_string(), Arc::new(builder));
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn build(
        &self,
        plugin: &PluginConfig,
        topic: &str,
    ) -> Result<Arc<dyn Consumer>, ConsumerError> {
        let builder = self.builders.get(&plugin.kind).ok_or_else(|| {
            ConsumerError::Config(format!("unknown consumer kind: {}", plugin.kind))
        })?;
        builder(plugin, topic)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
