//! Mountlog Core - shared data model for the mount change journal
//!
//! This crate provides the types every other layer speaks:
//! - Journal positions (mount generation + sequence)
//! - File kinds and raw byte paths
//! - Small / large change records
//! - Stable wire encoding for positions and change lists

pub mod change;
pub mod path;
pub mod position;
pub mod wire;

// Re-export main types for convenience
pub use change::{ChangeRecord, Dtype, LargeChange, LostChangesReason, SmallChange};
pub use path::RawPath;
pub use position::Position;
pub use wire::{ChangesSinceResult, WireError};
