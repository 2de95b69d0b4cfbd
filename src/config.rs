use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";
pub const DEFAULT_YAHOO_CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_BACKOFF_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// How many times an adapter call is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// One attempt, no retries.
    pub fn single_shot() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_shot()
    }
}

/// Provider endpoints, credentials and call limits.
#[derive(Debug, Clone)]
pub struct Config {
    pub finnhub_api_key: String,
    pub finnhub_base_url: String,
    pub yahoo_chart_url: String,
    pub yahoo_proxy: Option<String>,
    pub http_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn new(finnhub_api_key: impl Into<String>) -> Self {
        Self {
            finnhub_api_key: finnhub_api_key.into(),
            finnhub_base_url: DEFAULT_FINNHUB_BASE_URL.to_string(),
            yahoo_chart_url: DEFAULT_YAHOO_CHART_URL.to_string(),
            yahoo_proxy: None,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = read("FINNHUB_API_KEY").ok_or(ConfigError::Missing("FINNHUB_API_KEY"))?;
        let mut config = Config::new(api_key);

        if let Some(url) = read("FINNHUB_BASE_URL") {
            config.finnhub_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = read("YAHOO_CHART_URL") {
            config.yahoo_chart_url = url.trim_end_matches('/').to_string();
        }
        config.yahoo_proxy = read("YAHOO_PROXY");

        if let Some(raw) = read("HTTP_TIMEOUT_SECS") {
            let secs = parse_u64("HTTP_TIMEOUT_SECS", &raw)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "HTTP_TIMEOUT_SECS",
                    reason: "must be greater than zero".into(),
                });
            }
            config.http_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = read("PROVIDER_MAX_ATTEMPTS") {
            let attempts = parse_u64("PROVIDER_MAX_ATTEMPTS", &raw)?;
            config.retry.max_attempts = attempts.clamp(1, 5) as u32;
        }
        if let Some(raw) = read("PROVIDER_RETRY_BACKOFF_MS") {
            config.retry.backoff =
                Duration::from_millis(parse_u64("PROVIDER_RETRY_BACKOFF_MS", &raw)?);
        }

        Ok(config)
    }
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}
