//! Runtime settings for the tracker.
//!
//! Defaults point at a local order service. [`TrackerConfig::from_env`] overlays
//! `TRACKER_*` environment variables; the binary additionally loads `.env.local` first and
//! applies command-line overrides last.

use crate::tracking_actor::DEFAULT_PROGRESS_STEP;
use std::time::Duration;
use thiserror::Error;

pub const ENV_API_BASE_URL: &str = "TRACKER_API_BASE_URL";
pub const ENV_WS_BASE_URL: &str = "TRACKER_WS_BASE_URL";
pub const ENV_API_TIMEOUT_MS: &str = "TRACKER_API_TIMEOUT_MS";
pub const ENV_TICK_INTERVAL_MS: &str = "TRACKER_TICK_INTERVAL_MS";
pub const ENV_PROGRESS_STEP: &str = "TRACKER_PROGRESS_STEP";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must start with one of {expected:?}, got {value:?}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        expected: &'static [&'static str],
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub api_base_url: String,
    pub ws_base_url: String,
    pub request_timeout: Duration,
    pub tick_interval: Duration,
    pub progress_step: u8,
    pub session_buffer: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            ws_base_url: "ws://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(30),
            tick_interval: Duration::from_secs(1),
            progress_step: DEFAULT_PROGRESS_STEP,
            session_buffer: 32,
        }
    }
}

const HTTP_SCHEMES: &[&str] = &["http://", "https://"];
const WS_SCHEMES: &[&str] = &["ws://", "wss://"];

impl TrackerConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each `TRACKER_*` key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_BASE_URL) {
            config.api_base_url = url;
        }
        if let Some(url) = lookup(ENV_WS_BASE_URL) {
            config.ws_base_url = url;
        }
        if let Some(ms) = lookup(ENV_API_TIMEOUT_MS) {
            config.request_timeout = Duration::from_millis(positive(ENV_API_TIMEOUT_MS, &ms)?);
        }
        if let Some(ms) = lookup(ENV_TICK_INTERVAL_MS) {
            config.tick_interval = Duration::from_millis(positive(ENV_TICK_INTERVAL_MS, &ms)?);
        }
        if let Some(step) = lookup(ENV_PROGRESS_STEP) {
            let value = positive(ENV_PROGRESS_STEP, &step)?;
            config.progress_step = u8::try_from(value.min(100)).unwrap_or(100);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_scheme(ENV_API_BASE_URL, &self.api_base_url, HTTP_SCHEMES)?;
        check_scheme(ENV_WS_BASE_URL, &self.ws_base_url, WS_SCHEMES)?;
        Ok(())
    }
}

fn positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        }),
    }
}

fn check_scheme(
    key: &'static str,
    value: &str,
    expected: &'static [&'static str],
) -> Result<(), ConfigError> {
    if expected.iter().any(|scheme| value.starts_with(scheme)) {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            key,
            value: value.to_string(),
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = TrackerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.request_timeout, Duration::from_millis(30_000));
        assert_eq!(config.progress_step, 5);
    }

    #[test]
    fn environment_overrides() {
        let config = TrackerConfig::from_lookup(lookup(&[
            (ENV_API_BASE_URL, "https://orders.example.com"),
            (ENV_WS_BASE_URL, "wss://orders.example.com"),
            (ENV_API_TIMEOUT_MS, "2500"),
            (ENV_TICK_INTERVAL_MS, "200"),
            (ENV_PROGRESS_STEP, "250"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "https://orders.example.com");
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.tick_interval, Duration::from_millis(200));
        assert_eq!(config.progress_step, 100);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            TrackerConfig::from_lookup(lookup(&[(ENV_TICK_INTERVAL_MS, "0")])),
            Err(ConfigError::InvalidNumber { key: ENV_TICK_INTERVAL_MS, .. })
        ));
        assert!(matches!(
            TrackerConfig::from_lookup(lookup(&[(ENV_API_TIMEOUT_MS, "soon")])),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            TrackerConfig::from_lookup(lookup(&[(ENV_WS_BASE_URL, "http://localhost:8000")])),
            Err(ConfigError::InvalidUrl { key: ENV_WS_BASE_URL, .. })
        ));
    }
}
