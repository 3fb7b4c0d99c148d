use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use shared::{DogProfile, ProfileSnapshot};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::traits::SnapshotStorage;

/// Slot name used by the browser version of the app
pub const DEFAULT_SLOT: &str = "dogs_v1";

/// Snapshot storage backed by one JSON file per slot
#[derive(Clone, Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
}

/// Accepted on-disk layouts. Older exports stored the bare profile array.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSnapshot {
    Current(ProfileSnapshot),
    Legacy(Vec<DogProfile>),
}

impl JsonFileStorage {
    /// Create a storage slot inside `data_directory`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(data_directory: P, slot: &str) -> Result<Self> {
        let data_directory = data_directory.as_ref();
        if !data_directory.exists() {
            fs::create_dir_all(data_directory).with_context(|| {
                format!("Failed to create data directory {}", data_directory.display())
            })?;
            info!("Created data directory: {}", data_directory.display());
        }

        Ok(Self {
            path: data_directory.join(format!("{}.json", slot)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStorage for JsonFileStorage {
    async fn load(&self) -> Result<Option<ProfileSnapshot>> {
        if !self.path.exists() {
            debug!("No snapshot at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read snapshot {}", self.path.display()))?;
        let stored: StoredSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Snapshot {} is not valid profile data", self.path.display()))?;

        let snapshot = match stored {
            StoredSnapshot::Current(snapshot) => snapshot,
            StoredSnapshot::Legacy(profiles) => {
                info!("Upgrading legacy snapshot with {} profiles", profiles.len());
                ProfileSnapshot { profiles }
            }
        };

        debug!("Loaded {} profiles from {}", snapshot.profiles.len(), self.path.display());
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &ProfileSnapshot) -> Result<()> {
        let content = serde_json::to_string_pretty(snapshot)?;

        // Atomic write using temp file
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Saved {} profiles to {}", snapshot.profiles.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::Gender;
    use tempfile::TempDir;

    fn profile(id: &str, tag: Option<&str>) -> DogProfile {
        DogProfile {
            id: id.to_string(),
            nfc_id: tag.map(str::to_string),
            name: format!("Dog {}", id),
            breed: "Beagle".to_string(),
            gender: Gender::Female,
            photo_url: None,
            birth_date: NaiveDate::from_ymd_opt(2020, 2, 29).unwrap(),
            vaccinations: Vec::new(),
            created_at: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn test_load_empty_slot() {
        let temp_dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(temp_dir.path(), DEFAULT_SLOT).unwrap();

        assert!(storage.load().await.unwrap().is_none());
        assert!(storage.path().ends_with("dogs_v1.json"));
    }

    #[tokio::test]
    async fn test_save_and_reload_preserves_order() {
        let temp_dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(temp_dir.path(), DEFAULT_SLOT).unwrap();
        let snapshot = ProfileSnapshot {
            profiles: vec![profile("b", Some("04:BB")), profile("a", None), profile("c", Some("04:CC"))],
        };

        storage.save(&snapshot).await.expect("Failed to save snapshot");

        // A fresh handle on the same directory sees the same data
        let reopened = JsonFileStorage::new(temp_dir.path(), DEFAULT_SLOT).unwrap();
        let loaded = reopened.load().await.unwrap().expect("Snapshot missing");
        assert_eq!(loaded, snapshot);
        assert!(!storage.path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_creates_missing_data_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("data");

        let storage = JsonFileStorage::new(&nested, "test_slot").unwrap();
        storage.save(&ProfileSnapshot::default()).await.unwrap();

        assert!(nested.join("test_slot.json").exists());
    }

    #[tokio::test]
    async fn test_loads_legacy_bare_array() {
        let temp_dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(temp_dir.path(), DEFAULT_SLOT).unwrap();
        let legacy = serde_json::to_string(&vec![profile("1", Some("04:AA"))]).unwrap();
        fs::write(storage.path(), legacy).unwrap();

        let loaded = storage.load().await.unwrap().unwrap();
        assert_eq!(loaded.profiles.len(), 1);
        assert_eq!(loaded.profiles[0].nfc_id.as_deref(), Some("04:AA"));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(temp_dir.path(), DEFAULT_SLOT).unwrap();
        fs::write(storage.path(), "{ not json").unwrap();

        assert!(storage.load().await.is_err());
    }
}
