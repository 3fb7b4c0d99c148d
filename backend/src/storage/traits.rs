//! # Storage Traits
//!
//! Storage abstraction used by the profile store. The store only ever reads
//! and writes complete snapshots, so a backend is a single key/value slot.

use anyhow::Result;
use async_trait::async_trait;
use shared::ProfileSnapshot;

/// Persistence port for the profile list
///
/// Implementations must make `save` atomic from the caller's point of view:
/// after it returns, a subsequent `load` (possibly in a new process) yields
/// exactly the saved snapshot, and a failed save leaves the previous
/// snapshot in place.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Load the last saved snapshot, or `None` if nothing was ever saved
    async fn load(&self) -> Result<Option<ProfileSnapshot>>;

    /// Replace the stored snapshot
    async fn save(&self, snapshot: &ProfileSnapshot) -> Result<()>;
}
