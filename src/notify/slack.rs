//! Slack `chat.postMessage` notifier.

use super::traits::AlertSink;
use crate::config::SlackConfig;
use crate::error::NotifyError;
use crate::monitor::AlertPayload;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};

const POST_MESSAGE_PATH: &str = "/api/chat.postMessage";

/// Web API envelope; HTTP 200 does not imply success.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts alerts to one channel under a fixed bot display name.
pub struct SlackNotifier {
    http: Client,
    token: String,
    channel: String,
    user_name: String,
    api_base: String,
}

impl SlackNotifier {
    /// Create a notifier from configuration.
    pub fn new(config: &SlackConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self::with_http(http, config))
    }

    /// Create a notifier around an existing HTTP client.
    pub fn with_http(http: Client, config: &SlackConfig) -> Self {
        Self {
            http,
            token: config.bot_token.clone(),
            channel: config.channel.clone(),
            user_name: config.user_name.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    fn request_body(&self, payload: &AlertPayload) -> serde_json::Value {
        serde_json::json!({
            "channel": self.channel,
            "username": self.user_name,
            "blocks": payload.blocks,
            "text": payload.fallback_text(),
        })
    }
}

#[async_trait]
impl AlertSink for SlackNotifier {
    #[instrument(skip(self, payload), fields(lines = payload.fallback_lines.len()))]
    async fn send(&self, payload: &AlertPayload) -> Result<(), NotifyError> {
        if payload.is_empty() {
            return Ok(());
        }

        info!("Sending messages...");

        let url = format!("{}{}", self.api_base, POST_MESSAGE_PATH);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&self.request_body(payload))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::HttpStatus(status.as_u16()));
        }

        let body: ApiResponse = response.json().await?;
        if !body.ok {
            return Err(NotifyError::Rejected(
                body.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        info!("Messages sent");
        Ok(())
    }
}
