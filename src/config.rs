//! Bus configuration.
//!
//! Values come from defaults, from a JSON document, or from `MQBUS_*`
//! environment variables:
//!
//! | variable                   | field                | default |
//! |----------------------------|----------------------|---------|
//! | `MQBUS_REQUEST_TIMEOUT_MS` | `request_timeout_ms` | 30000   |
//! | `MQBUS_POLL_INTERVAL_MS`   | `poll_interval_ms`   | 100     |
//! | `MQBUS_MAX_RETRIES`        | `max_retries`        | 1       |
//! | `MQBUS_CODEC`              | `codec`              | json    |

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::BusError;

/// Default time `Bus::send` waits for a reply (30s).
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default upper bound a worker blocks on an empty queue before checking for shutdown (100ms).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default number of redeliveries after a handler failure.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

const ENV_PREFIX: &str = "MQBUS_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// How long `send` blocks for a correlated reply.
    pub request_timeout_ms: u64,
    /// How long a worker blocks on an empty queue per poll.
    pub poll_interval_ms: u64,
    /// Redeliveries of a failing message before it is dead-lettered.
    pub max_retries: u32,
    /// Codec used for outgoing payloads.
    pub codec: Codec,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            codec: Codec::default(),
        }
    }
}

impl BusConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, BusError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BusError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `MQBUS_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, BusError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BusError> {
        let mut config = Self::default();
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(value) = var("REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_number("REQUEST_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_number("POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = var("MAX_RETRIES") {
            config.max_retries = parse_number("MAX_RETRIES", &value)?;
        }
        if let Some(value) = var("CODEC") {
            config.codec = value.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BusError> {
        if self.request_timeout_ms == 0 {
            return Err(BusError::Config("request_timeout_ms must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(BusError::Config("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, BusError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| BusError::Config(format!("{ENV_PREFIX}{name}={value}: {e}")))
}
