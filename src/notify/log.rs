//! Sink that writes alerts to the log instead of a channel.

use super::traits::AlertSink;
use crate::error::NotifyError;
use crate::monitor::AlertPayload;
use async_trait::async_trait;
use tracing::warn;

/// Used for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, payload: &AlertPayload) -> Result<(), NotifyError> {
        for line in &payload.fallback_lines {
            warn!(target: "balance_alert", "{}", line);
        }
        Ok(())
    }
}
