//! Two-stage shutdown on interrupt signals.
//!
//! The first signal cancels the token so the loop stops after the cycle in
//! flight. A second signal means the operator does not want to wait (for
//! example behind a stuck request) and the caller should exit at once.

use std::future::Future;
use std::io;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Cancel `cancel` on the first signal, then wait for another.
///
/// Returns `true` when a second signal arrived and the process should exit
/// immediately, `false` when signals could not be received.
pub async fn shutdown_on_signal<F, Fut>(mut signal: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal().await {
        error!("❌ Failed to listen for shutdown signal: {}", e);
        return false;
    }
    info!("🛑 Shutdown signal received, finishing current cycle (repeat to exit now)");
    cancel.cancel();

    match signal().await {
        Ok(()) => {
            warn!("🛑 Second shutdown signal received, exiting immediately");
            true
        }
        Err(e) => {
            error!("❌ Failed to listen for shutdown signal: {}", e);
            false
        }
    }
}
