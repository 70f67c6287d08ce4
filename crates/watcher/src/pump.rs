//! Event pump
//!
//! Driver worker threads hand events to an [`EventSender`]; one pump thread
//! batches, coalesces and appends them, so the journal sees a single writer
//! per mount and events keep the order they were sent in.

use crate::coalesce::Coalescer;
use crate::debounce::FlushWindow;
use crate::{Capabilities, CoalescerOptions, WatchEvent, WatcherConfig, WatcherError};
use crossbeam_channel::{Receiver, SendError, Sender};
use journal::Journal;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Counters reported when the pump stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub batches: u64,
    pub events: u64,
    pub records: u64,
}

/// Cloneable handle for feeding driver events to a pump
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<WatchEvent>,
}

impl EventSender {
    pub fn send(&self, event: WatchEvent) -> Result<(), SendError<WatchEvent>> {
        self.tx.send(event)
    }
}

/// Background thread moving driver events into a journal
pub struct EventPump {
    sender: EventSender,
    handle: JoinHandle<Result<PumpStats, WatcherError>>,
}

impl EventPump {
    /// Start a pump for `journal`
    pub fn spawn(journal: Arc<Journal>, config: &WatcherConfig) -> Result<Self, WatcherError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let window = config.flush_window();
        let caps = config.capabilities();
        let options = config.coalescer_options();

        let handle = thread::Builder::new()
            .name("mountlog-pump".to_string())
            .spawn(move || run(rx, journal, window, caps, options))
            .map_err(WatcherError::Spawn)?;

        info!(
            "Event pump started (backend: {:?}, window: {:?}, max batch: {})",
            config.backend,
            window.interval(),
            window.max_batch()
        );
        Ok(Self {
            sender: EventSender { tx },
            handle,
        })
    }

    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Stop the pump after every queued event has been journaled
    ///
    /// Blocks until all `EventSender` clones are dropped.
    pub fn shutdown(self) -> Result<PumpStats, WatcherError> {
        let Self { sender, handle } = self;
        drop(sender);
        let stats = handle.join().map_err(|_| WatcherError::PumpPanicked)??;
        info!(
            "Event pump stopped: {} events in {} batches, {} records",
            stats.events, stats.batches, stats.records
        );
        Ok(stats)
    }
}

fn run(
    rx: Receiver<WatchEvent>,
    journal: Arc<Journal>,
    window: FlushWindow,
    caps: Capabilities,
    options: CoalescerOptions,
) -> Result<PumpStats, WatcherError> {
    let mut coalescer = Coalescer::new(caps, options);
    let mut stats = PumpStats::default();

    while let Some(batch) = window.collect(&rx) {
        stats.batches += 1;
        stats.events += batch.len() as u64;
        for event in batch {
            coalescer.push(event);
        }

        let records = coalescer.flush();
        stats.records += records.len() as u64;
        if records.is_empty() {
            continue;
        }
        match journal.append(records) {
            Ok(position) => debug!("Pump batch {} journaled up to {}", stats.batches, position),
            Err(e) => {
                error!("Pump stopping, journal append failed: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(stats)
}
