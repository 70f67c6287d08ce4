//! Event coalescing
//!
//! Folds a burst of driver events into the ordered change records the
//! journal stores. The only state is the look-back buffer of the batch being
//! built; `flush` hands it over and starts clean.

use crate::{Capabilities, EventKind, WatchEvent};
use ahash::AHashMap;
use ml_core::{ChangeRecord, Dtype, RawPath};
use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace, warn};

/// Optional coalescing behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoalescerOptions {
    /// Drop a create and its remove when no write happened in between
    pub cancel_transient: bool,
}

/// Builds one batch of change records from driver events
pub struct Coalescer {
    caps: Capabilities,
    options: CoalescerOptions,
    /// Records in emission order; cancelled records become `None`
    buffer: Vec<Option<ChangeRecord>>,
    /// Buffer index of each `Added` no write or rename has touched yet
    pending_adds: AHashMap<RawPath, usize>,
}

impl Coalescer {
    pub fn new(caps: Capabilities, options: CoalescerOptions) -> Self {
        Self {
            caps,
            options,
            buffer: Vec::new(),
            pending_adds: AHashMap::new(),
        }
    }

    /// Fold one event into the batch
    pub fn push(&mut self, event: WatchEvent) {
        match event.kind {
            EventKind::Create => {
                let index = self.emit(ChangeRecord::added(event.file_type, event.path.clone()));
                // a repeated create leaves two Added records; neither is cancellable
                if self.pending_adds.remove(&event.path).is_none() {
                    self.pending_adds.insert(event.path, index);
                }
            }
            EventKind::Write => {
                self.pending_adds.remove(&event.path);
                let record = ChangeRecord::modified(event.file_type, event.path);
                if self.last() == Some(&record) {
                    trace!("Dropping duplicate {}", record);
                    return;
                }
                self.emit(record);
            }
            EventKind::Remove => {
                let pending = self.pending_adds.remove(&event.path);
                if let (true, Some(index)) = (self.options.cancel_transient, pending) {
                    debug!("Cancelled transient {}", event.path);
                    self.buffer[index] = None;
                    return;
                }
                self.emit(ChangeRecord::removed(event.file_type, event.path));
            }
            EventKind::Rename => {
                self.pending_adds.remove(&event.path);
                for record in self.translate_rename(event) {
                    self.emit(record);
                }
            }
        }
    }

    /// Number of records the batch would produce
    pub fn len(&self) -> usize {
        self.buffer.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the finished batch, leaving the coalescer empty
    pub fn flush(&mut self) -> Vec<ChangeRecord> {
        self.pending_adds.clear();
        self.buffer.drain(..).flatten().collect()
    }

    fn translate_rename(&mut self, event: WatchEvent) -> SmallVec<[ChangeRecord; 2]> {
        let WatchEvent {
            path: from,
            dest,
            file_type,
            dest_existed,
            ..
        } = event;

        let Some(to) = dest else {
            warn!("Rename of {} without a destination, recording removal", from);
            return smallvec![ChangeRecord::removed(file_type, from)];
        };
        self.pending_adds.remove(&to);

        if !self.caps.rename_detection {
            return smallvec![
                ChangeRecord::removed(file_type, from),
                ChangeRecord::added(file_type, to),
            ];
        }
        if file_type == Dtype::Directory {
            return smallvec![ChangeRecord::directory_renamed(from, to)];
        }
        if dest_existed && self.caps.replace_detection {
            smallvec![ChangeRecord::replaced(file_type, from, to)]
        } else {
            smallvec![ChangeRecord::renamed(file_type, from, to)]
        }
    }

    fn emit(&mut self, record: ChangeRecord) -> usize {
        self.buffer.push(Some(record));
        self.buffer.len() - 1
    }

    fn last(&self) -> Option<&ChangeRecord> {
        self.buffer.last().and_then(Option::as_ref)
    }
}

/// Coalesce a complete burst of events in one go
pub fn coalesce(
    events: impl IntoIterator<Item = WatchEvent>,
    caps: Capabilities,
    options: CoalescerOptions,
) -> Vec<ChangeRecord> {
    let mut coalescer = Coalescer::new(caps, options);
    for event in events {
        coalescer.push(event);
    }
    coalescer.flush()
}
