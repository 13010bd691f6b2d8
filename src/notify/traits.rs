//! Alert delivery seam.

use crate::error::NotifyError;
use crate::monitor::AlertPayload;
use async_trait::async_trait;

/// Destination for formatted alerts.
///
/// Implementations must not contact the channel for an empty payload.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, payload: &AlertPayload) -> Result<(), NotifyError>;
}
