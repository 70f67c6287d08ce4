//! Flush windows
//!
//! A batch opens with the first event and closes after a fixed interval or
//! once it holds `max_batch` events, whichever comes first.

use crate::WatchEvent;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushWindow {
    interval: Duration,
    max_batch: usize,
}

impl FlushWindow {
    pub fn new(interval: Duration, max_batch: usize) -> Self {
        Self {
            interval,
            max_batch: max_batch.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    /// Block for the next batch
    ///
    /// Returns `None` once every sender is gone and the channel is drained.
    pub fn collect(&self, rx: &Receiver<WatchEvent>) -> Option<Vec<WatchEvent>> {
        let first = rx.recv().ok()?;
        let deadline = Instant::now() + self.interval;

        let mut batch = vec![first];
        while batch.len() < self.max_batch {
            match rx.recv_deadline(deadline) {
                Ok(event) => batch.push(event),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Some(batch)
    }
}
