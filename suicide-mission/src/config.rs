//! Run settings, loadable from JSON with per-field defaults.

use crate::tree::Scope;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings for one invocation of the run driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "RunConfig::default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
    /// Leaves between periodic checkpoint saves.
    #[serde(default = "RunConfig::default_save_every_leaves")]
    pub save_every_leaves: u64,
    /// Stop after this many leaves in this invocation.
    #[serde(default)]
    pub leaf_budget: Option<u64>,
    #[serde(default)]
    pub scope: Scope,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: Self::default_checkpoint_path(),
            save_every_leaves: Self::default_save_every_leaves(),
            leaf_budget: None,
            scope: Scope::full(),
        }
    }
}

impl RunConfig {
    pub const DEFAULT_CHECKPOINT: &'static str = "suicide-mission.ckpt";

    #[must_use]
    pub fn default_checkpoint_path() -> PathBuf {
        PathBuf::from(Self::DEFAULT_CHECKPOINT)
    }

    #[must_use]
    pub const fn default_save_every_leaves() -> u64 {
        10_000_000
    }

    /// Parses a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the JSON is malformed or a field is out of
    /// bounds.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` when the file cannot be read, otherwise
    /// as [`RunConfig::from_json`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates its bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checkpoint_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyCheckpointPath);
        }
        if self.save_every_leaves == 0 {
            return Err(ConfigError::MinViolation {
                field: "save_every_leaves",
                value: 0,
            });
        }
        if self.leaf_budget == Some(0) {
            return Err(ConfigError::MinViolation {
                field: "leaf_budget",
                value: 0,
            });
        }
        Ok(())
    }
}

/// Errors raised while loading or validating a [`RunConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("checkpoint_path must not be empty")]
    EmptyCheckpointPath,
    #[error("{field} must be at least 1 (got {value})")]
    MinViolation { field: &'static str, value: u64 },
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
