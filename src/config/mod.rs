//! Configuration management for the balance monitor.
//!
//! Loads settings from an optional config file, `BALMON__*` environment
//! variables and the legacy variable names used by earlier deployments
//! (`TOWER_ACCESS_KEY`, `BOT_CHANNEL`, ...). Later sources win.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Legacy environment variable names and the config keys they populate.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("TOWER_ACCESS_KEY", "ledger.access_key"),
    ("TOWER_SECRET_KEY", "ledger.secret_key"),
    ("LIVE_SERVER_HOST", "ledger.host"),
    ("BOT_TOKEN", "slack.bot_token"),
    ("BOT_CHANNEL", "slack.channel"),
    ("BOT_USER_NAME", "slack.user_name"),
];

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ledger API credentials and host
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Chat channel used for alerts
    #[serde(default)]
    pub slack: SlackConfig,
    /// Poll loop timing
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Limits table location and refresh policy
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Access key sent as `X-Auth-Apikey`
    #[serde(default)]
    pub access_key: String,
    /// Secret key used to sign the nonce
    #[serde(default)]
    pub secret_key: String,
    /// Base URL of the live server, e.g. `https://exchange.example.com`
    #[serde(default)]
    pub host: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot OAuth token
    #[serde(default)]
    pub bot_token: String,
    /// Channel ID or name alerts are posted to
    #[serde(default)]
    pub channel: String,
    /// Display name the bot posts under
    #[serde(default)]
    pub user_name: String,
    /// Web API base URL
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds slept after each cycle completes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Path to the limits CSV
    #[serde(default = "default_limits_path")]
    pub path: String,
    /// Age after which the limits table is reloaded
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
    /// How often the background refresher checks the table age
    #[serde(default = "default_refresh_check")]
    pub refresh_check_secs: u64,
}

// Default value functions
fn default_slack_api_base() -> String {
    "https://slack.com".to_string()
}

fn default_poll_interval() -> u64 {
    180 // 3 minutes
}

fn default_request_timeout() -> u64 {
    30
}

fn default_limits_path() -> String {
    "balance_limits.csv".to_string()
}

fn default_refresh_ttl() -> u64 {
    36_000 // 10 hours
}

fn default_refresh_check() -> u64 {
    60
}

impl Config {
    /// Load configuration from the config file, `.env` and environment variables.
    ///
    /// When `path` is given the file must exist; otherwise an optional
    /// `config.*` in the working directory is used.
    pub fn load(path: Option<&str>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(p) => config::File::with_name(p).required(true),
            None => config::File::with_name("config").required(false),
        };

        let builder = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::default().separator("__").prefix("BALMON"));

        let builder = apply_legacy_env(builder, |name| std::env::var(name).ok())
            .context("Failed to apply legacy environment variables")?;

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values. All credentials are required.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        require(&self.ledger.access_key, "ledger.access_key")?;
        require(&self.ledger.secret_key, "ledger.secret_key")?;
        require(&self.ledger.host, "ledger.host")?;
        require(&self.slack.bot_token, "slack.bot_token")?;
        require(&self.slack.channel, "slack.channel")?;
        require(&self.slack.user_name, "slack.user_name")?;

        check_url(&self.ledger.host, "ledger.host")?;
        check_url(&self.slack.api_base, "slack.api_base")?;

        if self.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "monitor.poll_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.monitor.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "monitor.request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.limits.refresh_ttl_secs == 0 || self.limits.refresh_check_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "limits.refresh_ttl_secs",
                reason: "refresh intervals must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl LimitsConfig {
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    pub fn refresh_check(&self) -> Duration {
        Duration::from_secs(self.refresh_check_secs)
    }
}

/// Override config keys from the legacy variable names when they are set.
fn apply_legacy_env<F>(
    mut builder: config::ConfigBuilder<config::builder::DefaultState>,
    lookup: F,
) -> std::result::Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for (name, key) in LEGACY_ENV {
        let value = lookup(*name).filter(|v| !v.trim().is_empty());
        builder = builder.set_override_option(*key, value)?;
    }
    Ok(builder)
}

fn require(value: &str, field: &'static str) -> std::result::Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(field));
    }
    Ok(())
}

fn check_url(value: &str, field: &'static str) -> std::result::Result<(), ConfigError> {
    let url = reqwest::Url::parse(value).map_err(|e| ConfigError::Invalid {
        field,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel: String::new(),
            user_name: String::new(),
            api_base: default_slack_api_base(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            path: default_limits_path(),
            refresh_ttl_secs: default_refresh_ttl(),
            refresh_check_secs: default_refresh_check(),
        }
    }
}

// Secrets never reach the logs.
impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

impl fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"<redacted>")
            .field("channel", &self.channel)
            .field("user_name", &self.user_name)
            .field("api_base", &self.api_base)
            .finish()
    }
}
