//! Replay a driver trace into a fresh mount
//!
//! Events go through the same coalescer a live pump uses. Control lines
//! (`mark`, `commit`, `remount`) close the open batch first, and a batch is
//! also closed every `watcher.max_batch` events.

use crate::config::Config;
use crate::trace::TraceLine;
use anyhow::{Context, Result};
use journal::MountTable;
use ml_core::{ChangesSinceResult, Position, RawPath};
use tracing::{debug, info};
use watcher::Coalescer;

/// Mount path used for replayed traces
pub const REPLAY_MOUNT: &str = "/replay";

/// Generation of the first replay mount, fixed so tokens are reproducible
pub const REPLAY_GENERATION: u64 = 1;

#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Report changes since this mark
    pub since_mark: Option<String>,
    /// Report changes since this position
    pub since: Option<Position>,
}

#[derive(Debug)]
pub struct ReplayOutcome {
    /// Marks in trace order
    pub marks: Vec<(String, Position)>,
    /// Position the answer was computed from
    pub from: Position,
    pub result: ChangesSinceResult,
}

pub fn replay(lines: &[TraceLine], config: &Config, options: &ReplayOptions) -> Result<ReplayOutcome> {
    let table = MountTable::with_generation_seed(config.journal_config(), REPLAY_GENERATION);
    let mount = RawPath::from(REPLAY_MOUNT);
    let mut journal = table.mount(&mount)?;
    let start = journal.current_position()?;

    let mut coalescer = Coalescer::new(
        config.watcher.capabilities(),
        config.watcher.coalescer_options(),
    );
    let mut batched = 0usize;
    let mut marks = Vec::new();

    for line in lines {
        if let Some(event) = line.to_event() {
            coalescer.push(event);
            batched += 1;
            if batched >= config.watcher.max_batch {
                journal.append(coalescer.flush())?;
                batched = 0;
            }
            continue;
        }

        journal.append(coalescer.flush())?;
        batched = 0;
        match line {
            TraceLine::Mark { name } => {
                let position = journal.current_position()?;
                debug!("Mark {} at {}", name, position);
                marks.push((name.clone(), position));
            }
            TraceLine::Commit { from, to } => {
                let from = hex::decode(from).with_context(|| format!("Invalid commit id {}", from))?;
                let to = hex::decode(to).with_context(|| format!("Invalid commit id {}", to))?;
                journal.record_commit_transition(&from, &to)?;
            }
            TraceLine::Remount => {
                table.unmount(&mount)?;
                journal = table.mount(&mount)?;
            }
            _ => {}
        }
    }
    journal.append(coalescer.flush())?;

    let from = match (&options.since_mark, options.since) {
        (Some(name), _) => marks
            .iter()
            .find(|(mark, _)| mark == name)
            .map(|(_, position)| *position)
            .with_context(|| format!("No mark named {}", name))?,
        (None, Some(position)) => position,
        (None, None) => start,
    };

    let result = table.changes_since_token(&mount, &from.to_token())?;
    info!(
        "Replayed {} trace lines: {} changes since {}",
        lines.len(),
        result.changes.len(),
        from
    );
    Ok(ReplayOutcome {
        marks,
        from,
        result,
    })
}
