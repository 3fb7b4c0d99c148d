//! What happens when a tag is scanned.
//!
//! This is a decision table, not a search:
//!
//! | tag owner | user confirms creation | outcome                          |
//! |-----------|------------------------|----------------------------------|
//! | found     | n/a                    | open the owner's detail view     |
//! | none      | yes                    | open a new profile with the tag  |
//! | none      | no                     | stay where we are                |

use shared::{DogProfile, Route};
use tracing::info;

use super::profile_store::ProfileStore;

/// Result of looking a tag up in the profile list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagResolution {
    Assigned(DogProfile),
    Unassigned(String),
}

/// Asks the user whether an unknown tag should get a new profile
pub trait CreateProfilePrompt {
    fn confirm_create(&self, tag_id: &str) -> bool;
}

impl<F> CreateProfilePrompt for F
where
    F: Fn(&str) -> bool,
{
    fn confirm_create(&self, tag_id: &str) -> bool {
        self(tag_id)
    }
}

/// Linear scan for the first profile holding `tag_id`
pub fn resolve_tag(tag_id: &str, profiles: &[DogProfile]) -> TagResolution {
    match profiles.iter().find(|p| p.has_tag(tag_id)) {
        Some(profile) => TagResolution::Assigned(profile.clone()),
        None => TagResolution::Unassigned(tag_id.to_string()),
    }
}

/// Turn a resolution into a navigation target. `None` means no state change.
pub fn decide(resolution: &TagResolution, prompt: &dyn CreateProfilePrompt) -> Option<Route> {
    match resolution {
        TagResolution::Assigned(profile) => Some(Route::ProfileDetail { id: profile.id.clone() }),
        TagResolution::Unassigned(tag_id) if prompt.confirm_create(tag_id) => Some(Route::CreateProfile {
            nfc_id: Some(tag_id.clone()),
        }),
        TagResolution::Unassigned(_) => None,
    }
}

/// Resolves scanned tags against the profile store
#[derive(Clone)]
pub struct ScanResolver {
    store: ProfileStore,
}

impl ScanResolver {
    pub fn new(store: ProfileStore) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, tag_id: &str) -> TagResolution {
        let resolution = resolve_tag(tag_id, &self.store.list().await);

        match &resolution {
            TagResolution::Assigned(profile) => info!("Tag {} belongs to {} ({})", tag_id, profile.name, profile.id),
            TagResolution::Unassigned(_) => info!("Tag {} is not assigned to any profile", tag_id),
        }
        resolution
    }

    /// Resolve `tag_id` and apply the user's answer
    pub async fn handle_tag(&self, tag_id: &str, prompt: &dyn CreateProfilePrompt) -> Option<Route> {
        let resolution = self.resolve(tag_id).await;
        decide(&resolution, prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::profile_editor::ProfileEditor;
    use crate::storage::MemoryStorage;
    use chrono::NaiveDate;
    use shared::Gender;
    use std::cell::Cell;
    use std::sync::Arc;

    fn profile(id: &str, tag: Option<&str>) -> DogProfile {
        DogProfile {
            id: id.to_string(),
            nfc_id: tag.map(str::to_string),
            name: "Reksio".to_string(),
            breed: "Terrier".to_string(),
            gender: Gender::Male,
            photo_url: None,
            birth_date: NaiveDate::from_ymd_opt(2018, 3, 3).unwrap(),
            vaccinations: Vec::new(),
            created_at: 0,
        }
    }

    async fn setup_test() -> (ScanResolver, ProfileStore) {
        let store = ProfileStore::open(Arc::new(MemoryStorage::new()), Vec::new()).await.unwrap();
        store.add(profile("dog-1", Some("04:AA"))).await.unwrap();
        (ScanResolver::new(store.clone()), store)
    }

    #[test]
    fn test_resolve_is_first_match() {
        let profiles = vec![profile("a", None), profile("b", Some("04:AA"))];

        assert_eq!(resolve_tag("04:AA", &profiles), TagResolution::Assigned(profiles[1].clone()));
        assert_eq!(resolve_tag("04:BB", &profiles), TagResolution::Unassigned("04:BB".to_string()));
    }

    #[test]
    fn test_assigned_tag_never_prompts() {
        let asked = Cell::new(false);
        let prompt = |_: &str| {
            asked.set(true);
            true
        };

        let route = decide(&TagResolution::Assigned(profile("a", Some("04:AA"))), &prompt);

        assert_eq!(route, Some(Route::ProfileDetail { id: "a".to_string() }));
        assert!(!asked.get());
    }

    #[tokio::test]
    async fn test_known_tag_opens_profile() {
        let (resolver, _store) = setup_test().await;

        let route = resolver.handle_tag("04:AA", &|_: &str| false).await;

        assert_eq!(route, Some(Route::ProfileDetail { id: "dog-1".to_string() }));
    }

    #[tokio::test]
    async fn test_unknown_tag_confirmed_prefills_new_profile() {
        let (resolver, store) = setup_test().await;

        let route = resolver
            .handle_tag("04:BB", &|tag: &str| tag == "04:BB")
            .await
            .expect("Expected navigation to the editor");
        assert_eq!(route, Route::CreateProfile { nfc_id: Some("04:BB".to_string()) });

        let editor = ProfileEditor::open(&route, &store).await.unwrap();
        assert_eq!(editor.draft().nfc_id.as_deref(), Some("04:BB"));
        assert!(editor.is_new());
    }

    #[tokio::test]
    async fn test_resolver_matches_profile_list_lookup() {
        let (resolver, store) = setup_test().await;
        store.add(profile("dog-2", Some("04:CC"))).await.unwrap();
        let profiles = store.list().await;

        for tag in ["04:AA", "04:BB", "04:CC"] {
            assert_eq!(resolver.resolve(tag).await, resolve_tag(tag, &profiles));
        }
    }

    #[tokio::test]
    async fn test_unknown_tag_declined_changes_nothing() {
        let (resolver, store) = setup_test().await;
        let before = store.list().await;

        let route = resolver.handle_tag("04:BB", &|_: &str| false).await;

        assert_eq!(route, None);
        assert_eq!(store.list().await, before);
    }
}
