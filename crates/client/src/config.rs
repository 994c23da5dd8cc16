use std::time::Duration;

use scribe_core::error::CoreError;

use crate::poller::PollConfig;

/// Default backend address.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
/// Default interval between two status polls of the same task.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
/// Default per-request timeout for status and config calls.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a backend running locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL.
    pub api_url: String,
    /// Fixed delay between polls of one task.
    pub poll_interval: Duration,
    /// Timeout applied to status, config, language and health calls.
    /// Uploads and downloads are not bounded by it.
    pub request_timeout: Duration,
    /// Timeout for establishing a TCP connection.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `SCRIBE_API_URL`              | `http://127.0.0.1:5000` |
    /// | `SCRIBE_POLL_INTERVAL_MS`     | `2000`                  |
    /// | `SCRIBE_REQUEST_TIMEOUT_SECS` | `30`                    |
    /// | `SCRIBE_CONNECT_TIMEOUT_SECS` | `10`                    |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key: &str| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let api_url = validate_api_url(
            lookup("SCRIBE_API_URL")
                .filter(|v| !v.trim().is_empty())
                .as_deref()
                .unwrap_or(DEFAULT_API_URL),
        )?;

        let poll_interval_ms =
            positive_u64(&lookup, "SCRIBE_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let request_timeout_secs =
            positive_u64(&lookup, "SCRIBE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        let connect_timeout_secs =
            positive_u64(&lookup, "SCRIBE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?;

        Ok(Self {
            api_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
        })
    }

    /// Replace the backend URL, applying the same checks as
    /// `SCRIBE_API_URL`.
    pub fn with_api_url(mut self, api_url: &str) -> Result<Self, CoreError> {
        self.api_url = validate_api_url(api_url)?;
        Ok(self)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: self.poll_interval,
        }
    }
}

fn validate_api_url(raw: &str) -> Result<String, CoreError> {
    let api_url = raw.trim();
    if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
        return Err(CoreError::Validation(format!(
            "API URL must start with http:// or https://, got: '{api_url}'"
        )));
    }
    Ok(api_url.to_string())
}

fn positive_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, CoreError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(CoreError::Validation(format!(
            "{key} must be a positive integer, got: '{raw}'"
        ))),
        Ok(value) => Ok(value),
    }
}
