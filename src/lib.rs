//! # Balance Monitor
//!
//! Periodically fetches exchange balances from a signed admin API, checks
//! them against configured per-currency limits and posts chat alerts for
//! anything out of range.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `error`: Typed errors for config, transport and notification failures
//! - `exchange`: Request signing and the balances REST client
//! - `limits`: Limits table loading and TTL-cached registry
//! - `monitor`: Threshold evaluation, alert formatting and the poll loop
//! - `notify`: Alert delivery (Slack, log-only)

pub mod config;
pub mod error;
pub mod exchange;
pub mod limits;
pub mod monitor;
pub mod notify;

pub use config::Config;
