//! Changes-since query engine
//!
//! Answers are computed from already-recorded state under a single read
//! lock, so one answer never mixes two generations or straddles a prune.

use crate::error::JournalError;
use crate::journal::{Journal, JournalState};
use crate::Result;
use ml_core::{ChangeRecord, ChangesSinceResult, LostChangesReason, Position};
use tracing::debug;

impl Journal {
    /// Every change recorded after `from`, in append order
    ///
    /// A position from an earlier mount generation answers a single
    /// `LostChanges(Remounted)`; one older than the retained history answers
    /// a single `LostChanges(Truncated)`.
    pub fn changes_since(&self, from: &Position) -> Result<Vec<ChangeRecord>> {
        Ok(self.changes_since_result(from)?.changes)
    }

    /// Like [`Journal::changes_since`], also reporting the position the
    /// answer runs up to
    pub fn changes_since_result(&self, from: &Position) -> Result<ChangesSinceResult> {
        let state = self.read_state()?;
        let changes = collect_changes(&state, from, self.limits.max_changes)?;
        debug!(
            "Journal::changes_since({}): {} changes up to {}",
            from,
            changes.len(),
            state.current
        );
        Ok(ChangesSinceResult {
            to_position: state.current,
            changes,
        })
    }

    /// Decode a position token and run [`Journal::changes_since_result`]
    pub fn changes_since_token(&self, token: &[u8]) -> Result<ChangesSinceResult> {
        let from = Position::from_token(token)?;
        self.changes_since_result(&from)
    }
}

fn collect_changes(
    state: &JournalState,
    from: &Position,
    max_changes: usize,
) -> Result<Vec<ChangeRecord>> {
    if !from.same_generation(&state.current) {
        return Ok(vec![ChangeRecord::lost(LostChangesReason::Remounted)]);
    }
    if from.sequence() > state.current.sequence() {
        return Err(JournalError::MalformedPosition(format!(
            "{} is ahead of the journal ({})",
            from, state.current
        )));
    }
    if from.sequence() < state.truncated_through {
        return Ok(vec![ChangeRecord::lost(LostChangesReason::Truncated)]);
    }

    // Entries are ordered by position across generations, so everything up
    // to and including `from` sits in one prefix.
    let start = state.entries.partition_point(|entry| entry.position <= *from);
    let count = state.entries.len() - start;
    if max_changes > 0 && count > max_changes {
        return Ok(vec![ChangeRecord::lost(LostChangesReason::TooManyChanges)]);
    }

    Ok(state
        .entries
        .range(start..)
        .map(|entry| entry.change.clone())
        .collect())
}
