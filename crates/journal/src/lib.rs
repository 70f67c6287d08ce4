//! Per-mount change journal
//!
//! This crate provides:
//! - Append-only, position-indexed change journal (one per mount)
//! - Changes-since query engine with remount / truncation detection
//! - Retention budgets and pruning
//! - Mount table exposing the RPC-facing operations
//! - TOML configuration

pub mod config;
pub mod error;
pub mod journal;
pub mod mounts;
pub mod query;
pub mod retention;

// Re-exports
pub use config::{ConfigError, JournalConfig, QueryLimits};
pub use error::JournalError;
pub use journal::{Journal, JournalEntry, JournalStats};
pub use mounts::MountTable;
pub use retention::RetentionPolicy;

/// Result type for journal operations
pub type Result<T, E = JournalError> = std::result::Result<T, E>;
