//! Engine configuration parsing and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Main configuration struct matching the `osp.yml` schema
///
/// Every section is optional; `EngineConfig::default()` gives an ephemeral
/// in-memory engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub access: AccessConfig,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON document backing the durable store; in-memory when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Flush persistent anchors when the runtime is dropped
    #[serde(default = "default_true")]
    pub commit_on_drop: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            commit_on_drop: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DenialLogLevel {
    #[default]
    Info,
    Debug,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Level at which access denials are logged
    #[serde(default)]
    pub denial_log_level: DenialLogLevel,
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    4
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pool.workers".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Durable store path, resolved relative to the config file
    pub fn store_path(&self) -> Option<PathBuf> {
        self.store.path.as_ref().map(|p| self.resolve_path(p))
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(parent) = self.config_path.as_ref().and_then(|p| p.parent()) {
            parent.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = EngineConfig::default();
        assert!(config.store.path.is_none());
        assert!(config.store.commit_on_drop);
        assert_eq!(config.pool.workers, 4);
        assert_eq!(config.access.denial_log_level, DenialLogLevel::Info);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
store:
  path: graph.json
  commit_on_drop: false
pool:
  workers: 2
access:
  denial_log_level: debug
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.store.path, Some(PathBuf::from("graph.json")));
        assert!(!config.store.commit_on_drop);
        assert_eq!(config.pool.workers, 2);
        assert_eq!(config.access.denial_log_level, DenialLogLevel::Debug);
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = EngineConfig::from_yaml("{}").unwrap();
        assert_eq!(config.pool.workers, 4);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = EngineConfig::from_yaml("pool:\n  workers: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_store_path_relative_to_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("osp.yml");
        std::fs::write(&config_path, "store:\n  path: data/graph.json\n").unwrap();

        let config = EngineConfig::from_file(&config_path).unwrap();
        assert_eq!(
            config.store_path(),
            Some(dir.path().join("data/graph.json"))
        );
    }
}
