//! Type definitions for the exchange balances endpoint.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// HTTP status treated as a successful fetch.
pub const STATUS_OK: u16 = 200;

/// One balance row as returned by `/api/v2/peatio/admin/exchange_balances`.
///
/// The endpoint reports the platform as `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    #[serde(rename = "id", deserialize_with = "string_or_number")]
    pub platform: String,
    pub currency: String,
    pub balance: Decimal,
}

impl BalanceEntry {
    pub fn new(platform: &str, currency: &str, balance: Decimal) -> Self {
        Self {
            platform: platform.to_string(),
            currency: currency.to_string(),
            balance,
        }
    }
}

/// Balances fetched in a single poll, tagged with the response status.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSnapshot {
    pub status: u16,
    pub entries: Vec<BalanceEntry>,
}

impl BalanceSnapshot {
    /// A successful snapshot.
    pub fn ok(entries: Vec<BalanceEntry>) -> Self {
        Self {
            status: STATUS_OK,
            entries,
        }
    }

    /// A snapshot carrying a status but no data.
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            entries: Vec::new(),
        }
    }

    /// Snapshot used when the request never produced a response.
    pub fn failed() -> Self {
        Self::with_status(crate::error::TransportError::FAILURE_STATUS)
    }

    /// Whether the data can be trusted for evaluation.
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Authentication headers for one signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub api_key: String,
    pub nonce: String,
    pub signature: String,
}

impl AuthHeaders {
    pub const API_KEY: &'static str = "X-Auth-Apikey";
    pub const NONCE: &'static str = "X-Auth-Nonce";
    pub const SIGNATURE: &'static str = "X-Auth-Signature";
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_entry_from_wire() {
        let json = r#"[
            {"id": "binance", "currency": "USDT", "balance": "1500.25"},
            {"id": 7, "currency": "btc", "balance": 0.5}
        ]"#;

        let entries: Vec<BalanceEntry> = serde_json::from_str(json).unwrap();

        assert_eq!(entries[0], BalanceEntry::new("binance", "USDT", dec!(1500.25)));
        assert_eq!(entries[1].platform, "7");
        assert_eq!(entries[1].balance, dec!(0.5));
    }

    #[test]
    fn test_snapshot_status() {
        assert!(BalanceSnapshot::ok(Vec::new()).is_success());
        assert!(!BalanceSnapshot::with_status(401).is_success());

        let failed = BalanceSnapshot::failed();
        assert_eq!(failed.status, 500);
        assert!(failed.entries.is_empty());
    }
}
