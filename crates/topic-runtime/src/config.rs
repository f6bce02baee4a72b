//! # Runtime Configuration
//!
//! Operator identity, network profile and driver timings.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config <path>`)
//! 3. Process environment, after `.env` has been loaded into it
//!
//! The operator account id and private key have no default: a missing value
//! is fatal at startup.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use topic_lifecycle::{
    DeliveryGuarantee, DriverSettings, NetworkProfile, OperatorIdentity, TopicError,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required value is absent from every source.
    #[error("missing {name}: set {env} (or {alias}) or `{toml_key}` in the config file")]
    Missing {
        name: &'static str,
        env: &'static str,
        alias: &'static str,
        toml_key: &'static str,
    },

    /// A value is present but malformed.
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl From<ConfigError> for TopicError {
    fn from(e: ConfigError) -> Self {
        TopicError::Configuration(e.to_string())
    }
}

// =============================================================================
// FILE LAYOUT
// =============================================================================

/// Shape of the TOML configuration file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub operator: OperatorSection,
    pub network: NetworkSection,
    pub subscription: SubscriptionSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperatorSection {
    pub account_id: Option<String>,
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSection {
    pub profile: Option<String>,
    pub receipt_timeout_ms: Option<u64>,
    pub receipt_poll_interval_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubscriptionSection {
    pub delivery: Option<String>,
}

impl FileConfig {
    /// Parse a TOML document.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a TOML file.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }
}

// =============================================================================
// RESOLVED CONFIGURATION
// =============================================================================

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub operator: OperatorIdentity,
    pub profile: NetworkProfile,
    pub driver: DriverSettings,
}

impl RuntimeConfig {
    /// Resolve from an optional TOML file and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match file {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Resolve from a parsed file and an environment lookup.
    ///
    /// Blank environment values count as unset.
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let account_id = lookup("OPERATOR_ID")
            .or_else(|| lookup("MY_ACCOUNT_ID"))
            .or(file.operator.account_id)
            .ok_or(ConfigError::Missing {
                name: "operator account id",
                env: "OPERATOR_ID",
                alias: "MY_ACCOUNT_ID",
                toml_key: "operator.account_id",
            })?;
        let private_key = lookup("OPERATOR_KEY")
            .or_else(|| lookup("MY_PRIVATE_KEY"))
            .or(file.operator.private_key)
            .ok_or(ConfigError::Missing {
                name: "operator private key",
                env: "OPERATOR_KEY",
                alias: "MY_PRIVATE_KEY",
                toml_key: "operator.private_key",
            })?;
        let operator = OperatorIdentity::parse(account_id.trim(), private_key.trim())
            .map_err(|e| ConfigError::Invalid {
                key: "operator",
                reason: e.to_string(),
            })?;

        let profile = match lookup("LEDGER_NETWORK").or(file.network.profile) {
            Some(name) => name.parse::<NetworkProfile>().map_err(|e| ConfigError::Invalid {
                key: "network profile",
                reason: e.to_string(),
            })?,
            None => NetworkProfile::default(),
        };

        let defaults = DriverSettings::default();
        let millis = |env_key: &'static str, from_file: Option<u64>, default: Duration| {
            match lookup(env_key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| ConfigError::Invalid {
                        key: env_key,
                        reason: e.to_string(),
                    }),
                None => Ok(from_file.map_or(default, Duration::from_millis)),
            }
        };

        let delivery = match lookup("LEDGER_DELIVERY").or(file.subscription.delivery) {
            Some(name) => name.parse::<DeliveryGuarantee>().map_err(|e| ConfigError::Invalid {
                key: "delivery guarantee",
                reason: e.to_string(),
            })?,
            None => defaults.delivery,
        };

        let driver = DriverSettings {
            receipt_timeout: millis(
                "LEDGER_RECEIPT_TIMEOUT_MS",
                file.network.receipt_timeout_ms,
                defaults.receipt_timeout,
            )?,
            receipt_poll_interval: millis(
                "LEDGER_RECEIPT_POLL_MS",
                file.network.receipt_poll_interval_ms,
                defaults.receipt_poll_interval,
            )?,
            request_timeout: millis(
                "LEDGER_REQUEST_TIMEOUT_MS",
                file.network.request_timeout_ms,
                defaults.request_timeout,
            )?,
            delivery,
            subscription_buffer: defaults.subscription_buffer,
        };

        if driver.receipt_poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "receipt poll interval",
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            operator,
            profile,
            driver,
        })
    }
}
