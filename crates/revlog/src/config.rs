#![forbid(unsafe_code)]

//! Configuration-as-data for stores and transaction history.
//!
//! [`RevlogConfig`] groups [`StoreConfig`] and [`HistoryConfig`] so both can
//! be loaded from TOML or JSON at startup.
//!
//! ```toml
//! [store]
//! max_records = 1000
//! unique = true
//! missing = "reject"
//!
//! [history]
//! max_depth = 50
//! ```
//!
//! ```rust,ignore
//! let config = RevlogConfig::from_toml_file("revlog.toml")?;
//! let store = SharedStore::<String>::with_config(config.store.clone());
//! let log = TransactionLog::new(config.history.clone());
//! ```
//!
//! Every omitted field keeps its default, so an empty document yields
//! `RevlogConfig::default()`. A limit of 0 means unlimited.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::HistoryConfig;
use crate::store::StoreConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevlogConfig {
    /// Store constraints.
    pub store: StoreConfig,
    /// Transaction history limits.
    pub history: HistoryConfig,
}

/// Errors loading or validating a [`RevlogConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl RevlogConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.check()
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.check()
    }

    /// Serialize to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Validate all parameters.
    ///
    /// Returns a list of problems; empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, value) in [
            ("store.max_records", self.store.max_records),
            ("history.max_depth", self.history.max_depth),
            ("history.max_bytes", self.history.max_bytes),
        ] {
            if i64::try_from(value).is_err() {
                errors.push(format!("{name} must be <= {} (0 = unlimited)", i64::MAX));
            }
        }
        if self.history.max_depth == 0 && self.history.max_bytes == 0 {
            tracing::warn!(target: "revlog.config", "transaction history is unbounded");
        }

        errors
    }

    fn check(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MissingPolicy;
    use std::io::Write;

    #[test]
    fn default_matches_component_defaults() {
        let config = RevlogConfig::default();
        assert_eq!(config.store, StoreConfig::default());
        assert_eq!(config.history, HistoryConfig::default());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn empty_toml_yields_default() {
        let config = RevlogConfig::from_toml_str("").unwrap();
        assert_eq!(config, RevlogConfig::default());
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let config = RevlogConfig::from_toml_str(
            r#"
            [store]
            unique = true
            missing = "reject"

            [history]
            max_depth = 7
            "#,
        )
        .unwrap();
        assert!(config.store.unique);
        assert_eq!(config.store.missing, MissingPolicy::Reject);
        assert_eq!(config.store.max_records, 0);
        assert_eq!(config.history.max_depth, 7);
        assert_eq!(config.history.max_bytes, HistoryConfig::default().max_bytes);
    }

    #[test]
    fn json_round_trip() {
        let mut config = RevlogConfig::default();
        config.store.max_records = 12;
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(RevlogConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn toml_serialization_reloads() {
        let config = RevlogConfig {
            store: StoreConfig::strict(),
            history: HistoryConfig::new(5, 2048),
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(RevlogConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn unlimited_history_round_trips_through_toml() {
        let config = RevlogConfig {
            store: StoreConfig::default(),
            history: HistoryConfig::unlimited(),
        };
        assert!(config.validate().is_empty());
        let text = config.to_toml_string().unwrap();
        assert_eq!(RevlogConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn zero_depth_loads_as_unlimited() {
        let config = RevlogConfig::from_toml_str("[history]\nmax_depth = 0\n").unwrap();
        assert_eq!(config.history.max_depth, 0);
    }

    #[test]
    fn validation_rejects_limits_toml_cannot_hold() {
        let json = format!(r#"{{"history": {{"max_depth": {}}}}}"#, u64::MAX);
        let err = RevlogConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("history.max_depth"));
    }

    #[test]
    fn unknown_policy_is_parse_error() {
        let err = RevlogConfig::from_toml_str("[store]\nmissing = \"maybe\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\nmax_records = 3").unwrap();
        let config = RevlogConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.store.max_records, 3);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RevlogConfig::from_toml_file("/nonexistent/revlog.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
