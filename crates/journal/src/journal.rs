//! Append-only change journal for one mount

use crate::config::{JournalConfig, QueryLimits};
use crate::error::JournalError;
use crate::retention::RetentionPolicy;
use crate::Result;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use ml_core::{ChangeRecord, Position};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Generation of a journal created outside a mount table
pub const DEFAULT_GENERATION: u64 = 1;

/// Notifications buffered per subscriber before new ones are dropped
const SUBSCRIBER_BUFFER: usize = 64;

/// One recorded change
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub position: Position,
    pub change: ChangeRecord,
    pub recorded_at: Instant,
}

impl JournalEntry {
    fn estimated_size(&self) -> usize {
        std::mem::size_of::<Self>() - std::mem::size_of::<ChangeRecord>()
            + self.change.estimated_size()
    }
}

/// Snapshot of journal bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalStats {
    pub generation: u64,
    pub current_position: Position,
    /// Oldest position from which a changes-since answer is complete
    pub earliest_complete_position: Position,
    pub entry_count: usize,
    pub memory_bytes: usize,
    pub oldest_entry_age: Option<Duration>,
}

/// State guarded by the journal lock
pub(crate) struct JournalState {
    /// Retained entries in strictly increasing position order
    pub(crate) entries: VecDeque<JournalEntry>,
    /// Position of the most recent change ("now")
    pub(crate) current: Position,
    /// Highest current-generation sequence dropped by pruning or flush;
    /// queries starting before it have lost history
    pub(crate) truncated_through: u64,
    pub(crate) memory_bytes: usize,
    poisoned: bool,
}

/// Append-only journal of changes for one mount
///
/// Writers (`append`, `remount`, `prune`, `flush`) serialize behind the write
/// lock; readers share the read lock and always see whole batches.
pub struct Journal {
    state: RwLock<JournalState>,
    retention: RetentionPolicy,
    pub(crate) limits: QueryLimits,
    subscribers: Mutex<Vec<Sender<Position>>>,
}

impl Journal {
    /// Create an empty journal with default configuration
    pub fn new() -> Self {
        Self::with_config(JournalConfig::default())
    }

    /// Create an empty journal in the default generation
    pub fn with_config(config: JournalConfig) -> Self {
        Self::starting_at(DEFAULT_GENERATION, config)
    }

    /// Create an empty journal in the given mount generation
    pub fn starting_at(generation: u64, config: JournalConfig) -> Self {
        Self {
            state: RwLock::new(JournalState {
                entries: VecDeque::new(),
                current: Position::initial(generation),
                truncated_through: 0,
                memory_bytes: 0,
                poisoned: false,
            }),
            retention: config.retention,
            limits: config.query,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Append a batch of changes
    ///
    /// Every record gets the next sequence number in order; the batch becomes
    /// visible to readers all at once. Returns the position of the last
    /// record, or the unchanged current position for an empty batch.
    pub fn append(&self, records: Vec<ChangeRecord>) -> Result<Position> {
        let mut state = self.write_state()?;
        if records.is_empty() {
            return Ok(state.current);
        }

        let batch_len = records.len() as u64;
        if state.current.sequence().checked_add(batch_len).is_none() {
            let msg = format!(
                "sequence space exhausted at {} appending {} records",
                state.current, batch_len
            );
            return Err(poison(&mut state, msg));
        }
        if let Some(last) = state.entries.back() {
            if last.position > state.current {
                let msg = format!(
                    "last entry {:?} is ahead of current position {:?}",
                    last.position, state.current
                );
                return Err(poison(&mut state, msg));
            }
        }

        let now = Instant::now();
        for change in records {
            let position = match state.current.checked_next() {
                Some(position) => position,
                None => return Err(poison(&mut state, "sequence overflow mid-batch".into())),
            };
            let entry = JournalEntry {
                position,
                change,
                recorded_at: now,
            };
            state.memory_bytes += entry.estimated_size();
            state.entries.push_back(entry);
            state.current = position;
        }

        debug!(
            "Journal::append: {} records, now at {}",
            batch_len, state.current
        );

        prune_locked(&mut state, &self.retention, now);

        // notify under the lock so subscribers see positions in order
        self.notify(state.current);
        Ok(state.current)
    }

    /// Append a commit transition marker
    pub fn record_commit_transition(&self, from: &[u8], to: &[u8]) -> Result<Position> {
        self.append(vec![ChangeRecord::commit_transition(from, to)])
    }

    /// Position representing "now"
    pub fn current_position(&self) -> Result<Position> {
        Ok(self.read_state()?.current)
    }

    /// Start a new mount generation
    ///
    /// Sequence numbers restart at zero. Older entries stay in place but every
    /// position from an earlier generation now answers `Remounted`.
    pub fn remount(&self) -> Result<Position> {
        let mut state = self.write_state()?;
        let generation = match state.current.generation().checked_add(1) {
            Some(generation) => generation,
            None => return Err(poison(&mut state, "mount generation overflow".into())),
        };

        info!(
            "Journal::remount: generation {} -> {}",
            state.current.generation(),
            generation
        );
        state.current = Position::initial(generation);
        state.truncated_through = 0;

        self.notify(state.current);
        Ok(state.current)
    }

    /// Drop the oldest entries until the policy is satisfied
    ///
    /// The most recent entry is never dropped. Returns the number of entries
    /// removed.
    pub fn prune(&self, policy: &RetentionPolicy) -> Result<usize> {
        let mut state = self.write_state()?;
        Ok(prune_locked(&mut state, policy, Instant::now()))
    }

    /// Forget all retained history
    ///
    /// Queries from any position before now answer `Truncated` afterwards.
    pub fn flush(&self) -> Result<Position> {
        let mut state = self.write_state()?;
        let dropped = state.entries.len();
        state.entries.clear();
        state.memory_bytes = 0;
        state.truncated_through = state.current.sequence();
        info!(
            "Journal::flush: dropped {} entries at {}",
            dropped, state.current
        );

        self.notify(state.current);
        Ok(state.current)
    }

    /// Bookkeeping snapshot
    pub fn stats(&self) -> Result<JournalStats> {
        let state = self.read_state()?;
        let now = Instant::now();
        Ok(JournalStats {
            generation: state.current.generation(),
            current_position: state.current,
            earliest_complete_position: Position::new(
                state.current.generation(),
                state.truncated_through,
            ),
            entry_count: state.entries.len(),
            memory_bytes: state.memory_bytes,
            oldest_entry_age: state
                .entries
                .front()
                .map(|entry| now.saturating_duration_since(entry.recorded_at)),
        })
    }

    /// Receive the new current position after every append, remount and flush
    ///
    /// Notifications arrive in position order. They are hints: a subscriber
    /// that falls behind misses some of them and should catch up with a
    /// changes-since query.
    pub fn subscribe(&self) -> Receiver<Position> {
        let (tx, rx) = crossbeam_channel::bounded(SUBSCRIBER_BUFFER);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Mount generation of "now", readable even after poisoning
    pub fn generation(&self) -> u64 {
        self.state.read().current.generation()
    }

    /// Whether an earlier invariant violation took the journal out of service
    pub fn is_poisoned(&self) -> bool {
        self.state.read().poisoned
    }

    pub(crate) fn read_state(&self) -> Result<RwLockReadGuard<'_, JournalState>> {
        let state = self.state.read();
        if state.poisoned {
            return Err(JournalError::Poisoned);
        }
        Ok(state)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, JournalState>> {
        let state = self.state.write();
        if state.poisoned {
            return Err(JournalError::Poisoned);
        }
        Ok(state)
    }

    fn notify(&self, position: Position) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(position) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Journal subscriber lagging, dropped notification for {}", position);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

fn poison(state: &mut JournalState, msg: String) -> JournalError {
    error!("Journal poisoned: {}", msg);
    state.poisoned = true;
    JournalError::InvariantViolation(msg)
}

fn prune_locked(state: &mut JournalState, policy: &RetentionPolicy, now: Instant) -> usize {
    let mut pruned = 0;
    while state.entries.len() > 1 {
        let oldest_age = match state.entries.front() {
            Some(entry) => now.saturating_duration_since(entry.recorded_at),
            None => break,
        };
        if !policy.exceeded(state.entries.len(), state.memory_bytes, oldest_age) {
            break;
        }

        let Some(entry) = state.entries.pop_front() else {
            break;
        };
        state.memory_bytes = state.memory_bytes.saturating_sub(entry.estimated_size());
        if entry.position.same_generation(&state.current) {
            state.truncated_through = state.truncated_through.max(entry.position.sequence());
        }
        pruned += 1;
    }

    if pruned > 0 {
        debug!(
            "Journal::prune: dropped {} entries, complete from sequence {}",
            pruned, state.truncated_through
        );
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_core::Dtype;

    fn added(name: &str) -> ChangeRecord {
        ChangeRecord::added(Dtype::Regular, name)
    }

    #[test]
    fn test_fresh_journal_position() {
        let journal = Journal::new();
        assert_eq!(
            journal.current_position().unwrap(),
            Position::initial(DEFAULT_GENERATION)
        );
        assert_eq!(journal.stats().unwrap().entry_count, 0);
    }

    #[test]
    fn test_append_assigns_consecutive_sequences() {
        let journal = Journal::new();
        let pos = journal
            .append(vec![added("a"), added("b"), added("c")])
            .unwrap();
        assert_eq!(pos.sequence(), 3);

        let pos = journal.append(vec![added("d")]).unwrap();
        assert_eq!(pos.sequence(), 4);
        assert_eq!(journal.current_position().unwrap(), pos);
    }

    #[test]
    fn test_empty_append_is_noop() {
        let journal = Journal::new();
        let before = journal.append(vec![added("a")]).unwrap();
        let after = journal.append(Vec::new()).unwrap();
        assert_eq!(before, after);
        assert_eq!(journal.stats().unwrap().entry_count, 1);
    }

    #[test]
    fn test_remount_resets_sequence() {
        let journal = Journal::new();
        journal.append(vec![added("a"), added("b")]).unwrap();

        let pos = journal.remount().unwrap();
        assert_eq!(pos, Position::initial(DEFAULT_GENERATION + 1));
        assert_eq!(journal.current_position().unwrap(), pos);

        // old entries are still held
        assert_eq!(journal.stats().unwrap().entry_count, 2);

        let pos = journal.append(vec![added("c")]).unwrap();
        assert_eq!(pos, Position::new(DEFAULT_GENERATION + 1, 1));
    }

    #[test]
    fn test_prune_keeps_most_recent_entry() {
        let journal = Journal::new();
        journal
            .append(vec![added("a"), added("b"), added("c")])
            .unwrap();

        let pruned = journal.prune(&RetentionPolicy::entries(1)).unwrap();
        assert_eq!(pruned, 2);

        let stats = journal.stats().unwrap();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.earliest_complete_position.sequence(), 2);

        // a budget the last entry alone exceeds still leaves it in place
        let policy = RetentionPolicy {
            max_entries: 0,
            max_bytes: 1,
            max_age_secs: 0,
        };
        assert_eq!(journal.prune(&policy).unwrap(), 0);
        assert_eq!(journal.stats().unwrap().entry_count, 1);
    }

    #[test]
    fn test_append_prunes_opportunistically() {
        let journal = Journal::with_config(JournalConfig {
            retention: RetentionPolicy::entries(2),
            ..JournalConfig::default()
        });
        for name in ["a", "b", "c", "d", "e"] {
            journal.append(vec![added(name)]).unwrap();
        }
        let stats = journal.stats().unwrap();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.earliest_complete_position.sequence(), 3);
    }

    #[test]
    fn test_aged_entries_pruned_on_append() {
        let journal = Journal::with_config(JournalConfig {
            retention: RetentionPolicy {
                max_entries: 0,
                max_bytes: 0,
                max_age_secs: 60,
            },
            ..JournalConfig::default()
        });
        let p0 = journal.current_position().unwrap();
        journal.append(vec![added("a"), added("b")]).unwrap();

        // still fresh: nothing pruned
        journal.append(vec![added("c")]).unwrap();
        assert_eq!(journal.stats().unwrap().entry_count, 3);

        let old = Instant::now()
            .checked_sub(Duration::from_secs(120))
            .unwrap();
        {
            let mut state = journal.state.write();
            for entry in state.entries.iter_mut().take(2) {
                entry.recorded_at = old;
            }
        }

        journal.append(vec![added("d")]).unwrap();
        let stats = journal.stats().unwrap();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.earliest_complete_position.sequence(), 2);

        assert_eq!(
            journal.changes_since(&p0).unwrap(),
            vec![ChangeRecord::lost(ml_core::LostChangesReason::Truncated)]
        );
        assert_eq!(
            journal
                .changes_since(&Position::new(p0.generation(), 2))
                .unwrap(),
            vec![added("c"), added("d")]
        );
    }

    #[test]
    fn test_memory_accounting() {
        let journal = Journal::new();
        journal.append(vec![added("a"), added("b")]).unwrap();
        let bytes = journal.stats().unwrap().memory_bytes;
        assert!(bytes > 0);

        journal.prune(&RetentionPolicy::entries(1)).unwrap();
        let after = journal.stats().unwrap().memory_bytes;
        assert!(after < bytes);

        journal.flush().unwrap();
        assert_eq!(journal.stats().unwrap().memory_bytes, 0);
    }

    #[test]
    fn test_flush_moves_boundary_to_now() {
        let journal = Journal::new();
        let pos = journal.append(vec![added("a"), added("b")]).unwrap();
        journal.flush().unwrap();

        let stats = journal.stats().unwrap();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.earliest_complete_position, pos);
        assert_eq!(journal.current_position().unwrap(), pos);
    }

    #[test]
    fn test_sequence_exhaustion_poisons() {
        let journal = Journal::starting_at(1, JournalConfig::default());
        {
            let mut state = journal.state.write();
            state.current = Position::new(1, u64::MAX - 1);
        }

        let err = journal.append(vec![added("a"), added("b")]).unwrap_err();
        assert!(matches!(err, JournalError::InvariantViolation(_)));
        assert!(!err.is_request_error());
        assert!(journal.is_poisoned());

        // nothing from the failed batch is visible and the journal stays down
        assert!(matches!(journal.current_position(), Err(JournalError::Poisoned)));
        assert!(matches!(journal.append(vec![added("c")]), Err(JournalError::Poisoned)));
    }

    #[test]
    fn test_generation_overflow_poisons() {
        let journal = Journal::starting_at(u64::MAX, JournalConfig::default());
        assert!(matches!(
            journal.remount(),
            Err(JournalError::InvariantViolation(_))
        ));
        assert!(matches!(journal.remount(), Err(JournalError::Poisoned)));
    }

    #[test]
    fn test_subscribers_notified() {
        let journal = Journal::new();
        let rx = journal.subscribe();

        let pos = journal.append(vec![added("a")]).unwrap();
        assert_eq!(rx.try_recv().unwrap(), pos);

        let pos = journal.remount().unwrap();
        assert_eq!(rx.try_recv().unwrap(), pos);

        // empty batches do not notify
        journal.append(Vec::new()).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_appends_notify_in_order() {
        let journal = std::sync::Arc::new(Journal::new());
        let rx = journal.subscribe();

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let journal = std::sync::Arc::clone(&journal);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        journal.append(vec![added(&format!("w{}-{}", w, i))]).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let seen: Vec<Position> = rx.try_iter().collect();
        assert_eq!(seen.len(), 40);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_dropped_subscriber_is_removed() {
        let journal = Journal::new();
        let rx = journal.subscribe();
        drop(rx);

        journal.append(vec![added("a")]).unwrap();
        assert!(journal.subscribers.lock().is_empty());
    }

    #[test]
    fn test_lagging_subscriber_does_not_block() {
        let journal = Journal::new();
        let rx = journal.subscribe();
        for i in 0..(SUBSCRIBER_BUFFER + 10) {
            journal.append(vec![added(&format!("f{}", i))]).unwrap();
        }
        assert_eq!(rx.len(), SUBSCRIBER_BUFFER);
    }
}
