#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_LOG: &str = "MOCKREDIS_LOG";
pub const ENV_JOURNAL: &str = "MOCKREDIS_JOURNAL";
pub const ENV_JOURNAL_CAPACITY: &str = "MOCKREDIS_JOURNAL_CAPACITY";

pub const DEFAULT_LOG_FILTER: &str = "warn";
pub const DEFAULT_JOURNAL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: expected {expected}")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("invalid config document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings for one mock instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// `env_logger` filter directive, e.g. `"mr_zset=debug"`.
    pub log_filter: String,
    pub journal_enabled: bool,
    /// Oldest journal entries are dropped beyond this many.
    pub journal_capacity: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            journal_enabled: true,
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
        }
    }
}

impl MockConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup` on top of the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(filter) = lookup(ENV_LOG) {
            config.log_filter = filter;
        }
        if let Some(raw) = lookup(ENV_JOURNAL) {
            config.journal_enabled = parse_switch(ENV_JOURNAL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_JOURNAL_CAPACITY) {
            config.journal_capacity = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: ENV_JOURNAL_CAPACITY,
                value: raw.clone(),
                expected: "a non-negative integer",
            })?;
        }
        Ok(config)
    }

    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

fn parse_switch(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "yes" | "true" => Ok(true),
        "0" | "off" | "no" | "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: raw.to_string(),
            expected: "on/off",
        }),
    }
}
