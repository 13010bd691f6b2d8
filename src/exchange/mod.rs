//! Ledger exchange integration.
//!
//! Provides signed access to the exchange admin API:
//! - HMAC-SHA256 request signing
//! - Exchange balance retrieval
//! - A `BalanceSource` seam for the poll loop

mod client;
mod signer;
mod traits;
mod types;

pub use client::{BalanceClient, BALANCES_PATH};
pub use signer::RequestSigner;
pub use traits::BalanceSource;
#[cfg(test)]
pub use traits::MockBalanceSource;
pub use types::*;
