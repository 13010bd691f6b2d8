//! HMAC request signing for the ledger admin API.
//!
//! Each request carries the access key, a millisecond nonce and
//! `hex(HMAC-SHA256(secret, nonce + access_key))`.

use super::types::AuthHeaders;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Produces time-based authentication headers from a fixed credential pair.
#[derive(Clone)]
pub struct RequestSigner {
    access_key: String,
    secret_key: String,
}

impl RequestSigner {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Headers for a request issued now.
    pub fn headers(&self) -> AuthHeaders {
        self.headers_at(Self::nonce_now())
    }

    /// Headers for a specific nonce (milliseconds since the Unix epoch).
    pub fn headers_at(&self, nonce_ms: u64) -> AuthHeaders {
        let nonce = nonce_ms.to_string();
        let signature = self.sign(&nonce);
        AuthHeaders {
            api_key: self.access_key.clone(),
            nonce,
            signature,
        }
    }

    /// Generate the HMAC-SHA256 signature over `nonce || access_key`.
    pub fn sign(&self, nonce: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(nonce.as_bytes());
        mac.update(self.access_key.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Current wall-clock time in milliseconds.
    fn nonce_now() -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}
