//! Driver event intake for Mountlog
//!
//! This crate turns the primitive events a filesystem driver reports into
//! journal entries:
//! - Backend capability sets (rename / replace detection)
//! - Event coalescing into change records
//! - Flush windows bounding each batch
//! - A pump thread serializing many driver threads into one journal

pub mod coalesce;
pub mod debounce;
pub mod pump;

pub use coalesce::{coalesce, Coalescer, CoalescerOptions};
pub use debounce::FlushWindow;
pub use pump::{EventPump, EventSender, PumpStats};

use journal::{ConfigError, JournalError};
use ml_core::{Dtype, RawPath};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to spawn event pump: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("event pump thread panicked")]
    PumpPanicked,

    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// Primitive event reported by the filesystem driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Type of change
    pub kind: EventKind,
    /// Path that changed (source path for renames)
    pub path: RawPath,
    /// Destination of a rename
    pub dest: Option<RawPath>,
    pub file_type: Dtype,
    /// Whether a rename clobbered an existing destination
    pub dest_existed: bool,
}

impl WatchEvent {
    pub fn create(file_type: Dtype, path: impl Into<RawPath>) -> Self {
        Self::simple(EventKind::Create, file_type, path.into())
    }

    pub fn write(file_type: Dtype, path: impl Into<RawPath>) -> Self {
        Self::simple(EventKind::Write, file_type, path.into())
    }

    pub fn remove(file_type: Dtype, path: impl Into<RawPath>) -> Self {
        Self::simple(EventKind::Remove, file_type, path.into())
    }

    pub fn rename(
        file_type: Dtype,
        from: impl Into<RawPath>,
        to: impl Into<RawPath>,
        dest_existed: bool,
    ) -> Self {
        Self {
            kind: EventKind::Rename,
            path: from.into(),
            dest: Some(to.into()),
            file_type,
            dest_existed,
        }
    }

    fn simple(kind: EventKind, file_type: Dtype, path: RawPath) -> Self {
        Self {
            kind,
            path,
            dest: None,
            file_type,
            dest_existed: false,
        }
    }
}

/// Type of driver event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Entry created
    Create,
    /// File contents written
    Write,
    /// Entry unlinked
    Remove,
    /// Entry renamed
    Rename,
}

/// What a notification backend can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Renames arrive as one event with both paths
    pub rename_detection: bool,
    /// A rename onto an existing entry is reported as such
    pub replace_detection: bool,
}

impl Capabilities {
    /// POSIX-style driver that sees every rename
    pub const FULL: Capabilities = Capabilities {
        rename_detection: true,
        replace_detection: true,
    };

    /// Notification source that only reports adds and removes
    pub const COARSE: Capabilities = Capabilities {
        rename_detection: false,
        replace_detection: false,
    };
}

/// Notification backend of a mount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Fuse,
    Prjfs,
}

impl Backend {
    pub fn capabilities(self) -> Capabilities {
        match self {
            Backend::Fuse => Capabilities::FULL,
            Backend::Prjfs => Capabilities::COARSE,
        }
    }
}

/// `[watcher]` configuration table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub backend: Backend,
    /// How long a batch stays open after its first event (default: 20ms)
    pub flush_interval_ms: u64,
    /// Events per batch before it is flushed early (default: 1024)
    pub max_batch: usize,
    /// Drop create+remove pairs that never saw a write (default: false)
    pub cancel_transient: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            flush_interval_ms: 20,
            max_batch: 1024,
            cancel_transient: false,
        }
    }
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch == 0 {
            return Err(ConfigError::Invalid {
                key: "watcher.max_batch",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    pub fn coalescer_options(&self) -> CoalescerOptions {
        CoalescerOptions {
            cancel_transient: self.cancel_transient,
        }
    }

    pub fn flush_window(&self) -> FlushWindow {
        FlushWindow::new(Duration::from_millis(self.flush_interval_ms), self.max_batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_capabilities() {
        assert!(Backend::Fuse.capabilities().rename_detection);
        assert!(Backend::Fuse.capabilities().replace_detection);
        assert_eq!(Backend::Prjfs.capabilities(), Capabilities::COARSE);
    }

    #[test]
    fn test_config_defaults_and_parse() {
        #[derive(Deserialize)]
        struct File {
            #[serde(default)]
            watcher: WatcherConfig,
        }

        let file: File = toml::from_str("").unwrap();
        assert_eq!(file.watcher, WatcherConfig::default());

        let file: File =
            toml::from_str("[watcher]\nbackend = \"prjfs\"\ncancel_transient = true\n").unwrap();
        assert_eq!(file.watcher.backend, Backend::Prjfs);
        assert!(file.watcher.cancel_transient);
        assert_eq!(file.watcher.max_batch, 1024);
    }

    #[test]
    fn test_zero_batch_rejected() {
        let config = WatcherConfig {
            max_batch: 0,
            ..WatcherConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rename_event_carries_destination() {
        let event = WatchEvent::rename(Dtype::Regular, "a", "b", true);
        assert_eq!(event.kind, EventKind::Rename);
        assert_eq!(event.dest, Some(RawPath::from("b")));
        assert!(event.dest_existed);
    }
}
