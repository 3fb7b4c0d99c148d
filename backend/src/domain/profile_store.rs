use anyhow::Context;
use chrono::NaiveDate;
use shared::{DogProfile, Gender, ProfileSnapshot, Vaccination};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::errors::{ProfileError, ProfileValidationError};
use crate::storage::SnapshotStorage;

/// Owner of the dog profile list
///
/// Every mutation writes the complete list through the storage port before it
/// becomes visible in memory, so a restart always reconstructs the last
/// acknowledged state. The write lock is held across the save, which keeps
/// persistence last-write-wins.
#[derive(Clone)]
pub struct ProfileStore {
    storage: Arc<dyn SnapshotStorage>,
    profiles: Arc<RwLock<Vec<DogProfile>>>,
}

impl ProfileStore {
    /// Load the saved profiles, or start from `seed` (and persist it) when the
    /// slot is empty
    pub async fn open(storage: Arc<dyn SnapshotStorage>, seed: Vec<DogProfile>) -> Result<Self, ProfileError> {
        let profiles = match storage.load().await.context("Failed to load profile snapshot")? {
            Some(snapshot) => {
                info!("Loaded {} profiles", snapshot.profiles.len());
                snapshot.profiles
            }
            None => {
                info!("No saved profiles, starting with {} seed profiles", seed.len());
                let snapshot = ProfileSnapshot { profiles: seed };
                storage
                    .save(&snapshot)
                    .await
                    .context("Failed to persist seed profiles")?;
                snapshot.profiles
            }
        };

        Ok(Self {
            storage,
            profiles: Arc::new(RwLock::new(profiles)),
        })
    }

    /// All profiles in insertion order
    pub async fn list(&self) -> Vec<DogProfile> {
        self.profiles.read().await.clone()
    }

    pub async fn get(&self, profile_id: &str) -> Option<DogProfile> {
        let profile = self
            .profiles
            .read()
            .await
            .iter()
            .find(|p| p.id == profile_id)
            .cloned();

        if profile.is_none() {
            warn!("Profile not found: {}", profile_id);
        }
        profile
    }

    /// First profile linked to `tag_id`
    pub async fn find_by_tag(&self, tag_id: &str) -> Option<DogProfile> {
        self.profiles
            .read()
            .await
            .iter()
            .find(|p| p.has_tag(tag_id))
            .cloned()
    }

    pub async fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            profiles: self.list().await,
        }
    }

    /// Append a new profile
    pub async fn add(&self, profile: DogProfile) -> Result<DogProfile, ProfileError> {
        info!("Adding profile: id={}, name={}", profile.id, profile.name);

        let mut profiles = self.profiles.write().await;
        if profiles.iter().any(|p| p.id == profile.id) {
            return Err(ProfileValidationError::DuplicateId(profile.id).into());
        }
        ensure_tag_available(&profiles, &profile)?;

        let mut next = profiles.clone();
        next.push(profile.clone());
        self.persist(next.clone()).await?;
        *profiles = next;

        info!("Added profile {} ({} total)", profile.id, profiles.len());
        Ok(profile)
    }

    /// Replace the profile with the same id
    pub async fn update(&self, profile: DogProfile) -> Result<DogProfile, ProfileError> {
        info!("Updating profile: id={}", profile.id);

        let mut profiles = self.profiles.write().await;
        let index = profiles
            .iter()
            .position(|p| p.id == profile.id)
            .ok_or_else(|| ProfileError::NotFound(profile.id.clone()))?;
        ensure_tag_available(&profiles, &profile)?;

        let mut next = profiles.clone();
        next[index] = profile.clone();
        self.persist(next.clone()).await?;
        *profiles = next;

        info!("Updated profile {}", profile.id);
        Ok(profile)
    }

    /// Read-modify-write of one profile under the write lock
    ///
    /// `edit` sees the current stored profile and returns its replacement, so
    /// concurrent edits of the same profile are applied one after the other.
    /// The id cannot be changed.
    pub async fn modify<F>(&self, profile_id: &str, edit: F) -> Result<DogProfile, ProfileError>
    where
        F: FnOnce(&DogProfile) -> Result<DogProfile, ProfileError>,
    {
        info!("Modifying profile: id={}", profile_id);

        let mut profiles = self.profiles.write().await;
        let index = profiles
            .iter()
            .position(|p| p.id == profile_id)
            .ok_or_else(|| ProfileError::NotFound(profile_id.to_string()))?;

        let mut profile = edit(&profiles[index])?;
        profile.id = profile_id.to_string();
        ensure_tag_available(&profiles, &profile)?;

        let mut next = profiles.clone();
        next[index] = profile.clone();
        self.persist(next.clone()).await?;
        *profiles = next;

        info!("Modified profile {}", profile.id);
        Ok(profile)
    }

    /// Delete a profile. Returns `false` when there was nothing to delete.
    pub async fn remove(&self, profile_id: &str) -> Result<bool, ProfileError> {
        info!("Removing profile: {}", profile_id);

        let mut profiles = self.profiles.write().await;
        let Some(index) = profiles.iter().position(|p| p.id == profile_id) else {
            debug!("Nothing to remove for profile {}", profile_id);
            return Ok(false);
        };

        let mut next = profiles.clone();
        let removed = next.remove(index);
        self.persist(next.clone()).await?;
        *profiles = next;

        info!("Removed profile {} ({})", removed.id, removed.name);
        Ok(true)
    }

    async fn persist(&self, profiles: Vec<DogProfile>) -> Result<(), ProfileError> {
        self.storage
            .save(&ProfileSnapshot { profiles })
            .await
            .context("Failed to persist profiles")?;
        Ok(())
    }
}

/// Reject a profile whose tag is already held by a different profile
fn ensure_tag_available(profiles: &[DogProfile], candidate: &DogProfile) -> Result<(), ProfileValidationError> {
    let Some(tag_id) = candidate.nfc_id.as_deref() else {
        return Ok(());
    };

    match profiles.iter().find(|p| p.id != candidate.id && p.has_tag(tag_id)) {
        Some(owner) => Err(ProfileValidationError::TagAlreadyAssigned {
            tag_id: tag_id.to_string(),
            profile_id: owner.id.clone(),
        }),
        None => Ok(()),
    }
}

/// Profile shown on first start, before the user has added any dog
pub fn demo_profiles(created_at: i64) -> Vec<DogProfile> {
    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
    let (Some(birth_date), Some(rabies), Some(rabies_expiry), Some(parvo)) = (
        date(2021, 5, 15),
        date(2023, 10, 1),
        date(2024, 10, 1),
        date(2023, 11, 15),
    ) else {
        return Vec::new();
    };

    vec![DogProfile {
        id: "1".to_string(),
        nfc_id: Some("04:A1:B2:C3:D4:E5:F6".to_string()),
        name: "Burek".to_string(),
        breed: "Golden Retriever".to_string(),
        gender: Gender::Male,
        photo_url: Some("https://picsum.photos/seed/dog1/400/400".to_string()),
        birth_date,
        vaccinations: vec![
            Vaccination {
                id: "v1".to_string(),
                name: "Rabies".to_string(),
                date: rabies,
                expiry_date: Some(rabies_expiry),
                doctor_name: None,
            },
            Vaccination {
                id: "v2".to_string(),
                name: "Parvovirus".to_string(),
                date: parvo,
                expiry_date: None,
                doctor_name: None,
            },
        ],
        created_at,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonFileStorage, MemoryStorage, DEFAULT_SLOT};
    use tempfile::TempDir;

    fn profile(id: &str, tag: Option<&str>) -> DogProfile {
        DogProfile {
            id: id.to_string(),
            nfc_id: tag.map(str::to_string),
            name: format!("Dog {}", id),
            breed: "Mixed".to_string(),
            gender: Gender::Male,
            photo_url: None,
            birth_date: NaiveDate::from_ymd_opt(2019, 7, 1).unwrap(),
            vaccinations: Vec::new(),
            created_at: 1_700_000_000_000,
        }
    }

    async fn setup_test() -> (ProfileStore, MemoryStorage) {
        let storage = MemoryStorage::new();
        let store = ProfileStore::open(Arc::new(storage.clone()), Vec::new())
            .await
            .expect("Failed to open store");
        (store, storage)
    }

    #[tokio::test]
    async fn test_add_keeps_insertion_order_and_persists() {
        let (store, storage) = setup_test().await;

        store.add(profile("b", None)).await.unwrap();
        store.add(profile("a", None)).await.unwrap();
        store.add(profile("c", None)).await.unwrap();

        let ids: Vec<String> = store.list().await.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(storage.stored().unwrap(), store.snapshot().await);
    }

    #[tokio::test]
    async fn test_add_rejects_duplicate_id() {
        let (store, storage) = setup_test().await;
        store.add(profile("1", None)).await.unwrap();
        let saves = storage.save_count();

        let result = store.add(profile("1", None)).await;

        assert!(matches!(
            result,
            Err(ProfileError::Validation(ProfileValidationError::DuplicateId(ref id))) if id == "1"
        ));
        assert_eq!(store.list().await.len(), 1);
        assert_eq!(storage.save_count(), saves);
    }

    #[tokio::test]
    async fn test_find_by_tag_returns_only_owner() {
        let (store, _storage) = setup_test().await;
        store.add(profile("1", Some("04:AA"))).await.unwrap();
        store.add(profile("2", Some("04:BB"))).await.unwrap();
        store.add(profile("3", None)).await.unwrap();

        for p in store.list().await {
            if let Some(tag) = p.nfc_id.as_deref() {
                let found = store.find_by_tag(tag).await.expect("Tag owner missing");
                assert_eq!(found.id, p.id);
                let owners = store.list().await.into_iter().filter(|o| o.has_tag(tag)).count();
                assert_eq!(owners, 1);
            }
        }
        assert!(store.find_by_tag("04:ZZ").await.is_none());
    }

    fn add_entry(name: &'static str) -> impl FnOnce(&DogProfile) -> Result<DogProfile, ProfileError> {
        move |current| {
            let mut next = current.clone();
            next.vaccinations.push(Vaccination {
                id: name.to_lowercase(),
                name: name.to_string(),
                date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                expiry_date: None,
                doctor_name: None,
            });
            Ok(next)
        }
    }

    #[tokio::test]
    async fn test_overlapping_modifies_keep_every_change() {
        let (store, storage) = setup_test().await;
        store.add(profile("1", None)).await.unwrap();

        let (first, second) = tokio::join!(
            store.modify("1", add_entry("Distemper")),
            store.modify("1", add_entry("Rabies"))
        );
        first.unwrap();
        second.unwrap();

        let names: Vec<String> = store.get("1").await.unwrap().vaccinations.into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["Distemper", "Rabies"]);
        assert_eq!(storage.stored().unwrap(), store.snapshot().await);
    }

    #[tokio::test]
    async fn test_modify_guards() {
        let (store, storage) = setup_test().await;
        store.add(profile("1", Some("04:AA"))).await.unwrap();
        store.add(profile("2", None)).await.unwrap();
        let saves = storage.save_count();

        let missing = store.modify("ghost", add_entry("Rabies")).await;
        assert!(matches!(missing, Err(ProfileError::NotFound(ref id)) if id == "ghost"));

        let stolen = store
            .modify("2", |current| Ok(DogProfile { nfc_id: Some("04:AA".to_string()), ..current.clone() }))
            .await;
        assert!(matches!(
            stolen,
            Err(ProfileError::Validation(ProfileValidationError::TagAlreadyAssigned { .. }))
        ));

        let rejected = store
            .modify("2", |_| Err(ProfileValidationError::EmptyName.into()))
            .await;
        assert!(matches!(rejected, Err(ProfileError::Validation(ProfileValidationError::EmptyName))));
        assert_eq!(storage.save_count(), saves);

        // The id always stays the one being modified
        let renamed = store
            .modify("2", |current| Ok(DogProfile { id: "other".to_string(), ..current.clone() }))
            .await
            .unwrap();
        assert_eq!(renamed.id, "2");
        assert_eq!(store.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_second_claim_on_tag_is_rejected() {
        let (store, _storage) = setup_test().await;
        store.add(profile("1", Some("04:AA"))).await.unwrap();
        store.add(profile("2", None)).await.unwrap();

        let on_add = store.add(profile("3", Some("04:AA"))).await;
        assert!(matches!(
            on_add,
            Err(ProfileError::Validation(ProfileValidationError::TagAlreadyAssigned { ref profile_id, .. })) if profile_id == "1"
        ));

        let on_update = store.update(profile("2", Some("04:AA"))).await;
        assert!(matches!(
            on_update,
            Err(ProfileError::Validation(ProfileValidationError::TagAlreadyAssigned { .. }))
        ));

        // Re-saving the owner with its own tag is fine
        let mut owner = profile("1", Some("04:AA"));
        owner.name = "Renamed".to_string();
        store.update(owner).await.unwrap();
        assert_eq!(store.find_by_tag("04:AA").await.unwrap().name, "Renamed");
    }

    #[tokio::test]
    async fn test_update_missing_profile_is_not_found() {
        let (store, storage) = setup_test().await;

        let result = store.update(profile("ghost", None)).await;

        assert!(matches!(result, Err(ProfileError::NotFound(ref id)) if id == "ghost"));
        assert_eq!(storage.save_count(), 1); // only the initial seed write
    }

    #[tokio::test]
    async fn test_update_replaces_in_place() {
        let (store, _storage) = setup_test().await;
        store.add(profile("1", None)).await.unwrap();
        store.add(profile("2", None)).await.unwrap();

        let mut changed = profile("1", Some("04:AA"));
        changed.breed = "Husky".to_string();
        store.update(changed).await.unwrap();

        let profiles = store.list().await;
        assert_eq!(profiles[0].id, "1");
        assert_eq!(profiles[0].breed, "Husky");
        assert_eq!(profiles[1].id, "2");
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, storage) = setup_test().await;
        store.add(profile("1", None)).await.unwrap();

        assert!(store.remove("1").await.unwrap());
        assert!(store.list().await.is_empty());
        assert!(storage.stored().unwrap().profiles.is_empty());

        // Removing again is a no-op
        let saves = storage.save_count();
        assert!(!store.remove("1").await.unwrap());
        assert_eq!(storage.save_count(), saves);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_memory_untouched() {
        let (store, storage) = setup_test().await;
        store.add(profile("1", None)).await.unwrap();
        storage.fail_saves(true);

        assert!(matches!(store.add(profile("2", None)).await, Err(ProfileError::Storage(_))));
        assert!(matches!(store.remove("1").await, Err(ProfileError::Storage(_))));

        let ids: Vec<String> = store.list().await.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[tokio::test]
    async fn test_seed_used_only_for_empty_slot() {
        let storage = MemoryStorage::new();
        let store = ProfileStore::open(Arc::new(storage.clone()), demo_profiles(1))
            .await
            .unwrap();
        assert_eq!(store.list().await.len(), 1);
        assert_eq!(storage.save_count(), 1);

        store.remove("1").await.unwrap();

        // An empty list is still a saved state, so the seed does not come back
        let reopened = ProfileStore::open(Arc::new(storage.clone()), demo_profiles(1))
            .await
            .unwrap();
        assert!(reopened.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_open_existing_snapshot_ignores_seed() {
        let saved = ProfileSnapshot {
            profiles: vec![profile("7", Some("04:CC"))],
        };
        let storage = MemoryStorage::with_snapshot(saved.clone());

        let store = ProfileStore::open(Arc::new(storage.clone()), demo_profiles(1))
            .await
            .unwrap();

        assert_eq!(store.snapshot().await, saved);
        assert_eq!(storage.save_count(), 0);
    }

    #[tokio::test]
    async fn test_restart_reconstructs_identical_state() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(JsonFileStorage::new(temp_dir.path(), DEFAULT_SLOT).unwrap());
        let store = ProfileStore::open(storage.clone(), demo_profiles(1_700_000_000_000))
            .await
            .unwrap();
        store.add(profile("2", Some("04:BB"))).await.unwrap();
        store.add(profile("3", None)).await.unwrap();
        store.remove("2").await.unwrap();
        let before = store.list().await;

        let reloaded = ProfileStore::open(
            Arc::new(JsonFileStorage::new(temp_dir.path(), DEFAULT_SLOT).unwrap()),
            Vec::new(),
        )
        .await
        .unwrap();

        assert_eq!(reloaded.list().await, before);
    }
}
