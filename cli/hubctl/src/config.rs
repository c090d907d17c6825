//! hubctl configuration (env-driven).

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use hub_events::{ClientConfig, RetryPolicy};

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Event API base URL. Unset means offline: events are validated and
    /// logged only.
    pub api_url: Option<String>,

    /// Bulk endpoint override.
    pub bulk_url: Option<String>,

    /// Publishing service name (actor id for service sessions).
    pub service_name: String,

    /// Topic definitions document.
    pub topics_file: PathBuf,

    /// Overrides the default category of the topic definitions.
    pub default_category: Option<String>,

    pub retry: RetryPolicy,

    pub request_timeout: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = non_empty("HUB_API_URL");
        let bulk_url = non_empty("HUB_BULK_URL");

        let service_name = non_empty("HUB_SERVICE_NAME").unwrap_or_else(|| "hubctl".to_string());

        let topics_file = non_empty("HUB_TOPICS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("topics.yaml"));

        let default_category = non_empty("HUB_DEFAULT_CATEGORY");

        let defaults = RetryPolicy::default();
        let millis = |key: &str, default: Duration| -> Result<Duration> {
            Ok(non_empty(key)
                .map(|v| v.parse::<u64>())
                .transpose()
                .with_context(|| format!("{key} must be an integer (milliseconds)."))?
                .map(Duration::from_millis)
                .unwrap_or(default))
        };

        let retry = RetryPolicy {
            delay: millis("HUB_RETRY_DELAY_MS", defaults.delay)?,
            max_delay: millis("HUB_RETRY_MAX_DELAY_MS", defaults.max_delay)?,
            max_time: millis("HUB_RETRY_MAX_TIME_MS", defaults.max_time)?,
            jitter: defaults.jitter,
        };

        let request_timeout_secs: u64 = non_empty("HUB_REQUEST_TIMEOUT_SECS")
            .map(|v| v.parse())
            .transpose()
            .context("HUB_REQUEST_TIMEOUT_SECS must be an integer (seconds).")?
            .unwrap_or(10);
        let request_timeout = Duration::from_secs(request_timeout_secs.max(1));

        let log_level = non_empty("HUB_LOG_LEVEL").unwrap_or_else(|| "warn".to_string());

        let log_json = lookup("HUB_LOG_JSON")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            api_url,
            bulk_url,
            service_name,
            topics_file,
            default_category,
            retry,
            request_timeout,
            log_level,
            log_json,
        })
    }

    /// Library client configuration; `offline` drops the endpoints.
    pub fn client_config(&self, offline: bool) -> ClientConfig {
        let mut config = ClientConfig::new(&self.service_name);
        if !offline {
            config.api_url = self.api_url.clone();
            config.bulk_url = self.bulk_url.clone();
        }
        config.default_category = self.default_category.clone();
        config.retry = self.retry.clone();
        config.request_timeout = self.request_timeout;
        config
    }
}
