//! Journal error taxonomy
//!
//! Stale views (remount, truncation) are not errors: they are answered with a
//! `LostChanges` record. Only request validation failures and broken
//! invariants surface here.

use ml_core::WireError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("unknown mount: {0}")]
    UnknownMount(String),

    #[error("mount is not active: {0}")]
    MountNotActive(String),

    #[error("mount is already active: {0}")]
    MountAlreadyActive(String),

    #[error("malformed position: {0}")]
    MalformedPosition(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("journal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("journal refused the operation after an earlier invariant violation")]
    Poisoned,
}

impl JournalError {
    /// Whether the error only affects the current request
    ///
    /// Invariant violations take the whole journal out of service.
    pub fn is_request_error(&self) -> bool {
        !matches!(
            self,
            JournalError::InvariantViolation(_) | JournalError::Poisoned
        )
    }
}
