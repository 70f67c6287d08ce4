//! Mount table: the journal operations exposed to RPC callers
//!
//! Each logical checkout owns one journal for as long as it is known to the
//! table. Mounting a known checkout again starts a new generation in the same
//! journal; removing it destroys the journal. A journal created after a
//! removal never reuses a generation the destroyed one handed out.

use crate::config::JournalConfig;
use crate::error::JournalError;
use crate::journal::Journal;
use crate::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ml_core::{ChangeRecord, ChangesSinceResult, Position, RawPath};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

struct MountSlot {
    journal: Arc<Journal>,
    active: bool,
}

/// Registry of per-mount journals keyed by mount path
pub struct MountTable {
    mounts: DashMap<RawPath, MountSlot>,
    config: JournalConfig,
    /// Generation for the next journal the table creates
    next_generation: AtomicU64,
}

impl MountTable {
    /// Create a table whose journals start at a time-derived generation
    ///
    /// Seeding from the clock keeps positions handed out by an earlier process
    /// from matching generations issued by this one.
    pub fn new(config: JournalConfig) -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::with_generation_seed(config, secs << 16)
    }

    /// Create a table whose first journal starts at generation `seed`
    pub fn with_generation_seed(config: JournalConfig, seed: u64) -> Self {
        Self {
            mounts: DashMap::new(),
            config,
            next_generation: AtomicU64::new(seed),
        }
    }

    /// Attach a checkout
    ///
    /// First mount creates its journal; every later mount of the same path
    /// remounts the existing journal (new generation, sequence reset).
    pub fn mount(&self, mount_id: &RawPath) -> Result<Arc<Journal>> {
        match self.mounts.entry(mount_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if slot.active {
                    return Err(JournalError::MountAlreadyActive(mount_id.to_string()));
                }
                let position = slot.journal.remount()?;
                slot.active = true;
                info!("Remounted {} at {}", mount_id, position);
                Ok(Arc::clone(&slot.journal))
            }
            Entry::Vacant(vacant) => {
                let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
                let journal = Arc::new(Journal::starting_at(generation, self.config.clone()));
                info!("Mounted {} at generation {}", mount_id, generation);
                vacant.insert(MountSlot {
                    journal: Arc::clone(&journal),
                    active: true,
                });
                Ok(journal)
            }
        }
    }

    /// Detach a checkout, keeping its journal for the next mount
    pub fn unmount(&self, mount_id: &RawPath) -> Result<()> {
        let mut slot = self
            .mounts
            .get_mut(mount_id)
            .ok_or_else(|| JournalError::UnknownMount(mount_id.to_string()))?;
        if !slot.active {
            return Err(JournalError::MountNotActive(mount_id.to_string()));
        }
        slot.active = false;
        info!("Unmounted {}", mount_id);
        Ok(())
    }

    /// Forget a checkout and destroy its journal
    pub fn remove(&self, mount_id: &RawPath) -> Result<()> {
        let (_, slot) = self
            .mounts
            .remove(mount_id)
            .ok_or_else(|| JournalError::UnknownMount(mount_id.to_string()))?;

        // generations the journal reached through remounts stay retired
        let last = slot.journal.generation();
        self.next_generation
            .fetch_max(last.saturating_add(1), Ordering::SeqCst);
        info!("Removed {} at generation {}", mount_id, last);
        Ok(())
    }

    /// Journal of an active mount
    pub fn journal(&self, mount_id: &RawPath) -> Result<Arc<Journal>> {
        let slot = self
            .mounts
            .get(mount_id)
            .ok_or_else(|| JournalError::UnknownMount(mount_id.to_string()))?;
        if !slot.active {
            return Err(JournalError::MountNotActive(mount_id.to_string()));
        }
        Ok(Arc::clone(&slot.journal))
    }

    /// Current position of a mount
    pub fn get_current_position(&self, mount_id: &RawPath) -> Result<Position> {
        self.journal(mount_id)?.current_position()
    }

    /// Changes recorded on a mount after `from`
    pub fn changes_since(&self, mount_id: &RawPath, from: &Position) -> Result<Vec<ChangeRecord>> {
        self.journal(mount_id)?.changes_since(from)
    }

    /// Changes since an encoded position token, with the resume position
    pub fn changes_since_token(
        &self,
        mount_id: &RawPath,
        token: &[u8],
    ) -> Result<ChangesSinceResult> {
        self.journal(mount_id)?.changes_since_token(token)
    }

    /// Paths of all known mounts, active or not
    pub fn mount_ids(&self) -> Vec<RawPath> {
        let mut ids: Vec<RawPath> = self.mounts.iter().map(|slot| slot.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Whether the mount is known and active
    pub fn is_active(&self, mount_id: &RawPath) -> bool {
        self.mounts
            .get(mount_id)
            .map(|slot| slot.active)
            .unwrap_or(false)
    }
}
