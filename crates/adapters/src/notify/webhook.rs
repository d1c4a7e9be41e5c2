// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat-robot webhook notifier.
//!
//! POSTs `{"msgtype":"text","text":{"content":"<prefix>#<message>"}}` to the
//! configured URL.

use super::{NotifyAdapter, NotifyError};
use async_trait::async_trait;
use pj_core::PluginConfig;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct WebhookNotifyAdapter {
    client: reqwest::Client,
    url: String,
    prefix: String,
}

impl WebhookNotifyAdapter {
    /// Build from `url` (required), `prefix`, and `timeout` (seconds) params.
    pub fn from_params(plugin: &PluginConfig) -> Result<Self, NotifyError> {
        let url = plugin
            .param_str("url")
            .filter(|u| !u.is_empty())
            .ok_or_else(|| NotifyError::Config("webhook notifier requires params.url".into()))?;
        let timeout = plugin
            .param_u64("timeout")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Config(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
            prefix: plugin.param_str("prefix").unwrap_or_default().to_string(),
        })
    }

    pub fn payload(&self, message: &str) -> serde_json::Value {
        serde_json::json!({
            "msgtype": "text",
            "text": { "content": format!("{}#{}", self.prefix, message) },
        })
    }
}

#[async_trait]
impl NotifyAdapter for WebhookNotifyAdapter {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::SendFailed(format!("webhook returned {status}")));
        }
        tracing::debug!(%status, "webhook notification delivered");
        Ok(())
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
