//! Journal configuration
//!
//! Loaded from the `[retention]` and `[query]` tables of the TOML config file.
//! Missing tables or fields fall back to defaults.

use crate::retention::RetentionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Limits applied to changes-since answers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Answers longer than this become a single `TooManyChanges` record
    /// (default: 0, unlimited)
    pub max_changes: usize,
}

/// Journal configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub retention: RetentionPolicy,
    pub query: QueryLimits,
}

impl JournalConfig {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: JournalConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject combinations that can never retain anything useful
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention.max_bytes > 0 && self.retention.max_bytes < 4096 {
            return Err(ConfigError::Invalid {
                key: "retention.max_bytes",
                reason: format!(
                    "{} is below the 4096 byte minimum (use 0 for unlimited)",
                    self.retention.max_bytes
                ),
            });
        }
        Ok(())
    }
}
