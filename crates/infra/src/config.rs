//! Runtime settings.
//!
//! Loaded from an optional TOML file (`TALLYERP_CONFIG`, default
//! `tallyerp.toml`) with `TALLYERP__*` environment variables layered on top,
//! e.g. `TALLYERP__POSTING__MAX_ATTEMPTS=5` or `TALLYERP__ACCOUNTS__CASH=1-1110`.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use tallyerp_accounting::AccountDefaults;

use crate::poster::RetryPolicy;

pub const CONFIG_PATH_VAR: &str = "TALLYERP_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "tallyerp.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PostingSettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for PostingSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_attempts: retry.max_attempts,
            base_delay_ms: retry.base_delay.as_millis() as u64,
            max_delay_ms: retry.max_delay.as_millis() as u64,
        }
    }
}

impl PostingSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Postgres URL. The in-memory store is used when unset.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub listen_addr: String,
    pub log_filter: String,
    pub posting: PostingSettings,
    pub accounts: AccountDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            listen_addr: "0.0.0.0:8080".to_string(),
            log_filter: "info".to_string(),
            posting: PostingSettings::default(),
            accounts: AccountDefaults::default(),
        }
    }
}

impl Settings {
    /// Load from the file named by `TALLYERP_CONFIG` plus the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(&path)
    }

    /// Load from `path` (optional) plus the environment.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("TALLYERP").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_source_yields_defaults() {
        assert_eq!(from_toml(""), Settings::default());
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let settings = from_toml(
            r#"
            listen_addr = "127.0.0.1:9000"

            [posting]
            max_attempts = 5

            [accounts]
            cash = "1-1110"
            "#,
        );

        assert_eq!(settings.listen_addr, "127.0.0.1:9000");
        assert_eq!(settings.posting.max_attempts, 5);
        assert_eq!(settings.posting.base_delay_ms, 50);
        assert_eq!(settings.accounts.cash, "1-1110");
        assert_eq!(settings.accounts.receivable, "1-1200");
        assert!(settings.database_url.is_none());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let settings = Settings::from_file("/nonexistent/tallyerp-test-config").unwrap();
        assert_eq!(settings.max_connections, 5);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let posting = PostingSettings {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(posting.retry_policy().max_attempts, 1);
    }
}
