// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification adapters

mod noop;
mod webhook;

pub use noop::NoOpNotifyAdapter;
pub use webhook::WebhookNotifyAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifyAdapter, NotifyCall};

use async_trait::async_trait;
use pj_core::PluginConfig;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from notify operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("notifier config error: {0}")]
    Config(String),
}

/// Adapter for delivering alert text
#[async_trait]
pub trait NotifyAdapter: Send + Sync + 'static {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

type Builder = Arc<dyn Fn(&PluginConfig) -> Result<Arc<dyn NotifyAdapter>, NotifyError> + Send + Sync>;

/// Maps a configured notifier `kind` to a constructor.
#[derive(Clone, Default)]
pub struct NotifierRegistry {
    builders: HashMap<String, Builder>,
}

impl NotifierRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with `noop` and `webhook`.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("noop", |_| Ok(Arc::new(NoOpNotifyAdapter::new())));
        registry.register("webhook", |plugin| {
            Ok(Arc::new(WebhookNotifyAdapter::from_params(plugin)?))
        });
        registry
    }

    pub fn register<F>(&mut self, kind: &str, builder: F)
    where
        F: Fn(&PluginConfig) -> Result<Arc<dyn NotifyAdapter>, NotifyError> + Send + Sync + 'static,
    {
        self.builders.insert(kind.to_string(), Arc::new(builder));
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn build(&self, plugin: &PluginConfig) -> Result<Arc<dyn NotifyAdapter>, NotifyError> {
        let builder = self
            .builders
            .get(&plugin.kind)
            .ok_or_else(|| NotifyError::Config(format!("unknown notifier kind: {}", plugin.kind)))?;
        builder(plugin)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
