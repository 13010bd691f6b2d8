//! Error types for the balance monitor.
//!
//! Only [`ConfigError`] is fatal. Transport and notification errors are
//! contained within a single poll cycle and surfaced through logs.

use thiserror::Error;

/// Startup configuration errors. The process does not start when one occurs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent or empty
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// A setting is present but unusable
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The limits source could not be read
    #[error("Failed to read limits source {path}: {source}")]
    LimitsRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The limits source is missing a required column
    #[error("Limits source schema error: {0}")]
    LimitsSchema(String),

    /// A limits row could not be parsed
    #[error("Limits source line {line}: {reason}")]
    LimitsParse { line: usize, reason: String },
}

/// Failures while fetching balances from the ledger API.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level failure (connection refused, timeout, DNS, TLS)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Successful status but the body was not a balance list
    #[error("Failed to decode balance response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Status code reported for a cycle that failed at the transport level.
    pub const FAILURE_STATUS: u16 = 500;
}

/// Failures while delivering an alert to the chat channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code
    #[error("Notification endpoint returned HTTP {0}")]
    HttpStatus(u16),

    /// The chat API accepted the request but refused the message
    #[error("Notification rejected: {0}")]
    Rejected(String),
}
