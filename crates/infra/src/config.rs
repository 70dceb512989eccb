//! Ledger configuration.
//!
//! Loaded from environment variables; every field has a default so an empty
//! environment yields an in-memory, weighted-average ledger.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_inventory::CostingMethod;

pub const ENV_COSTING: &str = "STOCKLEDGER_COSTING";
pub const ENV_MAX_RETRIES: &str = "STOCKLEDGER_MAX_RETRIES";
pub const ENV_JOURNAL: &str = "STOCKLEDGER_JOURNAL";
pub const ENV_BIND: &str = "STOCKLEDGER_BIND";
pub const ENV_CATALOG: &str = "STOCKLEDGER_CATALOG";

pub const DEFAULT_MAX_COMMIT_RETRIES: u32 = 8;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Costing method for the whole deployment.
    pub costing_method: CostingMethod,
    /// Optimistic commit attempts per movement before reporting contention.
    pub max_commit_retries: u32,
    /// Journal file; `None` keeps the movement log in memory.
    pub journal_path: Option<PathBuf>,
    /// Product catalog file; `None` keeps product references in memory.
    pub catalog_path: Option<PathBuf>,
    pub bind_addr: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            costing_method: CostingMethod::default(),
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
            journal_path: None,
            catalog_path: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source (tests pass a closure over a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let value = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(raw) = value(ENV_COSTING) {
            config.costing_method = raw.parse().map_err(|e| ConfigError::Invalid {
                var: ENV_COSTING,
                reason: format!("{e}"),
            })?;
        }

        if let Some(raw) = value(ENV_MAX_RETRIES) {
            config.max_commit_retries =
                raw.trim().parse().map_err(|e| ConfigError::Invalid {
                    var: ENV_MAX_RETRIES,
                    reason: format!("{e}"),
                })?;
        }

        if let Some(raw) = value(ENV_JOURNAL) {
            config.journal_path = Some(PathBuf::from(raw));
        }

        if let Some(raw) = value(ENV_CATALOG) {
            config.catalog_path = Some(PathBuf::from(raw));
        }

        if let Some(raw) = value(ENV_BIND) {
            config.bind_addr = raw.trim().to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_commit_retries == 0 {
            return Err(ConfigError::Invalid {
                var: ENV_MAX_RETRIES,
                reason: "must be at least 1".to_string(),
            });
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr.parse().map_err(|e| ConfigError::Invalid {
            var: ENV_BIND,
            reason: format!("{e}"),
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
        move |var| map.get(var).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.max_commit_retries, 8);
        assert_eq!(config.costing_method, CostingMethod::WeightedAverage);
    }

    #[test]
    fn variables_override_defaults() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (ENV_COSTING, "fifo"),
            (ENV_MAX_RETRIES, "3"),
            (ENV_JOURNAL, "/var/lib/stockledger/ledger.jsonl"),
            (ENV_CATALOG, "/var/lib/stockledger/catalog.json"),
            (ENV_BIND, "127.0.0.1:9000"),
        ]))
        .unwrap();

        assert_eq!(config.costing_method, CostingMethod::Fifo);
        assert_eq!(config.max_commit_retries, 3);
        assert_eq!(
            config.journal_path,
            Some(PathBuf::from("/var/lib/stockledger/ledger.jsonl"))
        );
        assert_eq!(
            config.catalog_path,
            Some(PathBuf::from("/var/lib/stockledger/catalog.json"))
        );
        assert_eq!(config.socket_addr().unwrap().port(), 9000);
    }

    #[test]
    fn invalid_values_are_reported_with_their_variable() {
        let err = LedgerConfig::from_lookup(lookup(&[(ENV_COSTING, "lifo")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_COSTING, .. }));

        let err = LedgerConfig::from_lookup(lookup(&[(ENV_MAX_RETRIES, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_MAX_RETRIES, .. }));

        let err = LedgerConfig::from_lookup(lookup(&[(ENV_BIND, "nowhere")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_BIND, .. }));
    }
}
