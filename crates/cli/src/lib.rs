//! Mountlog CLI library
//!
//! Trace parsing, configuration loading and journal replay shared by the
//! `mountlog` binary and its integration tests.

pub mod config;
pub mod replay;
pub mod trace;

pub use config::Config;
pub use replay::{replay, ReplayOptions, ReplayOutcome};
pub use trace::{parse_trace, TraceLine};
