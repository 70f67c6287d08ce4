//! Combined configuration file
//!
//! One TOML file carries the journal tables (`[retention]`, `[query]`) and
//! the `[watcher]` table.

use anyhow::{Context, Result};
use journal::{JournalConfig, QueryLimits, RetentionPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use watcher::WatcherConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retention: RetentionPolicy,
    pub query: QueryLimits,
    pub watcher: WatcherConfig,
}

impl Config {
    /// Load from `path`, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.journal_config().validate()?;
        config.watcher.validate()?;
        Ok(config)
    }

    pub fn journal_config(&self) -> JournalConfig {
        JournalConfig {
            retention: self.retention.clone(),
            query: self.query.clone(),
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render config")
    }
}
