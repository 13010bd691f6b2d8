//! Source-agnostic trait for balance providers.

use super::types::BalanceSnapshot;
use async_trait::async_trait;

/// Anything that can produce a balance snapshot for one poll cycle.
///
/// Implementations never fail: transport problems are reported as a
/// snapshot whose status is not 200.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn snapshot(&self) -> BalanceSnapshot;
}
