//! Cached limits registry with TTL refresh.
//!
//! The table is loaded once at startup and reloaded when older than the
//! configured TTL. Refreshes replace the whole table behind an `Arc`, so a
//! reader always holds a complete table. A failed refresh keeps the last
//! good table in service.

use super::loader::{LimitEntry, LimitSource, LimitTable};
use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

struct Loaded {
    table: Arc<LimitTable>,
    /// Monotonic load time, used for the TTL
    loaded: Instant,
    /// Wall-clock load time, for display
    loaded_at: DateTime<Utc>,
}

impl Loaded {
    fn new(table: LimitTable) -> Self {
        Self {
            table: Arc::new(table),
            loaded: Instant::now(),
            loaded_at: Utc::now(),
        }
    }
}

/// Owner of the current limits table.
pub struct LimitRegistry {
    source: Arc<dyn LimitSource>,
    ttl: Duration,
    state: RwLock<Loaded>,
}

impl LimitRegistry {
    /// Load the table from `source`. Failure here is fatal to startup.
    pub fn load(source: Arc<dyn LimitSource>, ttl: Duration) -> Result<Self, ConfigError> {
        let table = source.load()?;
        info!(
            "📋 [LIMITS] Loaded {} limit entries from {}",
            table.len(),
            source.describe()
        );
        warn_inverted(&table);

        Ok(Self {
            source,
            ttl,
            state: RwLock::new(Loaded::new(table)),
        })
    }

    /// The current table. Hold it for the duration of one evaluation.
    pub fn table(&self) -> Arc<LimitTable> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .table
            .clone()
    }

    /// Bounds for a (platform, currency) pair; a miss is unbounded.
    pub fn lookup(&self, platform: &str, currency: &str) -> LimitEntry {
        self.table().lookup(platform, currency)
    }

    /// Wall-clock time the current table was loaded.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .loaded_at
    }

    /// Age of the current table at `now`, on the monotonic clock.
    pub fn age(&self, now: Instant) -> Duration {
        let loaded = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .loaded;
        now.saturating_duration_since(loaded)
    }

    /// Whether the table is older than the TTL at `now`.
    pub fn is_stale(&self, now: Instant) -> bool {
        self.age(now) >= self.ttl
    }

    /// Reload unconditionally and swap the table in.
    pub fn refresh(&self) -> Result<usize, ConfigError> {
        let table = self.source.load()?;
        let count = table.len();
        warn_inverted(&table);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = Loaded::new(table);
        Ok(count)
    }

    /// Reload if the TTL has expired. Returns `true` when a new table was
    /// swapped in. Failures are logged and the previous table is kept.
    pub fn refresh_if_stale(&self) -> bool {
        if !self.is_stale(Instant::now()) {
            return false;
        }

        match self.refresh() {
            Ok(count) => {
                info!("🔄 [LIMITS] Refreshed {} limit entries", count);
                true
            }
            Err(e) => {
                error!(
                    "❌ [LIMITS] Refresh from {} failed, keeping previous table: {}",
                    self.source.describe(),
                    e
                );
                false
            }
        }
    }

    /// Check staleness every `period` in the background until cancelled.
    pub fn spawn_refresher(
        self: Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately and the table is fresh
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Limits refresher shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let registry = self.clone();
                        if let Err(e) = tokio::task::spawn_blocking(move || registry.refresh_if_stale()).await {
                            error!("❌ [LIMITS] Refresh task panicked: {}", e);
                        }
                    }
                }
            }
        })
    }
}

fn warn_inverted(table: &LimitTable) {
    for (key, entry) in table.inverted_entries() {
        warn!(
            "⚠️  [LIMITS] Inverted limits for '{}' on {}: lower {:?} > upper {:?}",
            key.currency, key.platform, entry.lower, entry.upper
        );
    }
}
