//! Retention policies and pruning budgets

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retention policy configuration
///
/// A zero in any field disables that budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Number of entries to keep (default: 1,000,000)
    pub max_entries: usize,
    /// Approximate memory budget in bytes (default: 512 MiB)
    pub max_bytes: usize,
    /// Drop entries older than this many seconds (default: 0, no age limit)
    pub max_age_secs: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_entries: 1_000_000,
            max_bytes: 512 * 1024 * 1024,
            max_age_secs: 0,
        }
    }
}

impl RetentionPolicy {
    /// A policy that never prunes
    pub fn unlimited() -> Self {
        Self {
            max_entries: 0,
            max_bytes: 0,
            max_age_secs: 0,
        }
    }

    /// Keep at most `max_entries` entries, no other limit
    pub fn entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::unlimited()
        }
    }

    /// Age limit, if any
    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_secs > 0).then(|| Duration::from_secs(self.max_age_secs))
    }

    /// Check whether the retained set exceeds any budget
    ///
    /// `oldest_age` is the age of the head entry, the one pruning would drop.
    pub fn exceeded(&self, entries: usize, bytes: usize, oldest_age: Duration) -> bool {
        if self.max_entries > 0 && entries > self.max_entries {
            return true;
        }
        if self.max_bytes > 0 && bytes > self.max_bytes {
            return true;
        }
        match self.max_age() {
            Some(max_age) => oldest_age > max_age,
            None => false,
        }
    }
}
