//! Balance limits: per (platform, currency) acceptable ranges.
//!
//! - `loader`: CSV parsing into an immutable `LimitTable`
//! - `registry`: cached table with TTL refresh and atomic swap

mod loader;
mod registry;

pub use loader::{CsvLimitSource, LimitEntry, LimitKey, LimitSource, LimitTable};
pub use registry::LimitRegistry;
