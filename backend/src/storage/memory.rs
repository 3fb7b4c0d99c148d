use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::ProfileSnapshot;
use std::sync::{Arc, Mutex, PoisonError};

use super::traits::SnapshotStorage;

/// In-process snapshot slot, used by tests and throwaway runs
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemorySlot>>,
}

#[derive(Default)]
struct MemorySlot {
    snapshot: Option<ProfileSnapshot>,
    save_count: usize,
    fail_saves: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an already-saved snapshot
    pub fn with_snapshot(snapshot: ProfileSnapshot) -> Self {
        let storage = Self::default();
        storage.slot().snapshot = Some(snapshot);
        storage
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.slot().save_count
    }

    /// Currently stored snapshot
    pub fn stored(&self) -> Option<ProfileSnapshot> {
        self.slot().snapshot.clone()
    }

    /// Make every following save fail, to exercise error paths
    pub fn fail_saves(&self, fail: bool) {
        self.slot().fail_saves = fail;
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, MemorySlot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SnapshotStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<ProfileSnapshot>> {
        Ok(self.slot().snapshot.clone())
    }

    async fn save(&self, snapshot: &ProfileSnapshot) -> Result<()> {
        let mut slot = self.slot();
        if slot.fail_saves {
            return Err(anyhow!("memory storage is configured to fail"));
        }
        slot.snapshot = Some(snapshot.clone());
        slot.save_count += 1;
        Ok(())
    }
}
