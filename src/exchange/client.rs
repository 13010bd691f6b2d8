//! Ledger admin REST API client.

use super::signer::RequestSigner;
use super::traits::BalanceSource;
use super::types::{AuthHeaders, BalanceEntry, BalanceSnapshot};
use crate::config::LedgerConfig;
use crate::error::TransportError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Path of the exchange balances endpoint.
pub const BALANCES_PATH: &str = "/api/v2/peatio/admin/exchange_balances";

/// Authenticated client for the exchange balances endpoint.
pub struct BalanceClient {
    http: Client,
    signer: RequestSigner,
    base_url: String,
}

impl BalanceClient {
    /// Create a new client from configuration.
    pub fn new(config: &LedgerConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let signer = RequestSigner::new(&config.access_key, &config.secret_key);
        Ok(Self::with_http(http, signer, &config.host))
    }

    /// Create a client around an existing HTTP client and signer.
    pub fn with_http(http: Client, signer: RequestSigner, base_url: &str) -> Self {
        Self {
            http,
            signer,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch all exchange balances.
    ///
    /// A non-200 response is not an error: the snapshot carries the status
    /// and no entries. Only failures to obtain or decode a response are.
    #[instrument(skip(self))]
    pub async fn fetch_balances(&self) -> std::result::Result<BalanceSnapshot, TransportError> {
        let url = format!("{}{}", self.base_url, BALANCES_PATH);
        let auth = self.signer.headers();

        let response = self
            .http
            .get(&url)
            .header(AuthHeaders::API_KEY, &auth.api_key)
            .header(AuthHeaders::NONCE, &auth.nonce)
            .header(AuthHeaders::SIGNATURE, &auth.signature)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Balance API returned {}: {}", status, body);
            return Ok(BalanceSnapshot::with_status(status.as_u16()));
        }

        let entries: Vec<BalanceEntry> = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        debug!("Fetched {} balances", entries.len());

        let mut snapshot = BalanceSnapshot::ok(entries);
        snapshot.status = status.as_u16();
        Ok(snapshot)
    }
}

#[async_trait]
impl BalanceSource for BalanceClient {
    async fn snapshot(&self) -> BalanceSnapshot {
        match self.fetch_balances().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("{}{}: {}", self.base_url, BALANCES_PATH, e);
                BalanceSnapshot::failed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    /// Accepts requests whose signature matches their own nonce.
    struct ValidSignature(RequestSigner);

    impl wiremock::Match for ValidSignature {
        fn matches(&self, request: &Request) -> bool {
            let get = |name: &str| {
                request
                    .headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            match (get(AuthHeaders::NONCE), get(AuthHeaders::SIGNATURE)) {
                (Some(nonce), Some(signature)) => self.0.sign(&nonce) == signature,
                _ => false,
            }
        }
    }

    fn client_for(base_url: &str) -> BalanceClient {
        BalanceClient::with_http(
            Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
            RequestSigner::new("access", "secret"),
            base_url,
        )
    }

    #[tokio::test]
    async fn test_fetch_sends_signed_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(BALANCES_PATH))
            .and(header(AuthHeaders::API_KEY, "access"))
            .and(header_exists(AuthHeaders::NONCE))
            .and(ValidSignature(RequestSigner::new("access", "secret")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "binance", "currency": "usdt", "balance": "1200.5"},
                {"id": "kraken", "currency": "btc", "balance": 2}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = client_for(&format!("{}/", server.uri()))
            .fetch_balances()
            .await
            .unwrap();

        assert!(snapshot.is_success());
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.entries[0].platform, "binance");
        assert_eq!(snapshot.entries[1].balance, dec!(2));
    }

    #[tokio::test]
    async fn test_non_200_is_tagged_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(BALANCES_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid signature"))
            .mount(&server)
            .await;

        let snapshot = client_for(&server.uri()).fetch_balances().await.unwrap();

        assert_eq!(snapshot.status, 401);
        assert!(snapshot.entries.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(BALANCES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client.fetch_balances().await.unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));

        let snapshot = client.snapshot().await;
        assert_eq!(snapshot, BalanceSnapshot::failed());
    }

    #[tokio::test]
    async fn test_connection_refused_becomes_failed_snapshot() {
        // Nothing listens on port 1.
        let client = client_for("http://127.0.0.1:1");

        let err = client.fetch_balances().await.unwrap_err();
        assert!(matches!(err, TransportError::Request(_)));

        let snapshot = client.snapshot().await;
        assert_eq!(snapshot.status, 500);
        assert!(snapshot.entries.is_empty());
    }
}
