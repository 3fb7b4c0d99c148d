//! Profile editor: draft handling, breed detection and submission.
//!
//! The editor owns a draft and commits it to the [`ProfileStore`] on submit.
//! Breed detection runs outside the editor: attaching a photo hands out a
//! [`DetectionTicket`] stamped with the draft generation, and the result is
//! applied only while that generation is current. Submitting, cancelling
//! detection or attaching another photo moves the generation on, so late
//! results are discarded instead of landing in a stale draft.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Local, NaiveDate, Utc};
use shared::{DogProfile, Gender, Route, Vaccination, VaccinationInput};
use tracing::{info, warn};
use uuid::Uuid;

use super::assistant::BreedDetector;
use super::errors::{ExternalServiceError, ProfileError, ProfileValidationError};
use super::profile_store::ProfileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    New,
    Edit,
}

/// Unsaved profile being edited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    pub id: String,
    pub name: String,
    pub breed: String,
    pub gender: Gender,
    pub photo_url: Option<String>,
    pub birth_date: NaiveDate,
    pub nfc_id: Option<String>,
    pub vaccinations: Vec<Vaccination>,
    pub created_at: i64,
}

impl ProfileDraft {
    fn blank(nfc_id: Option<String>, today: NaiveDate, created_at: i64) -> Self {
        Self {
            id: generate_id(),
            name: String::new(),
            breed: String::new(),
            gender: Gender::Male,
            photo_url: None,
            birth_date: today,
            nfc_id,
            vaccinations: Vec::new(),
            created_at,
        }
    }

    fn from_profile(profile: &DogProfile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            breed: profile.breed.clone(),
            gender: profile.gender,
            photo_url: profile.photo_url.clone(),
            birth_date: profile.birth_date,
            nfc_id: profile.nfc_id.clone(),
            vaccinations: profile.vaccinations.clone(),
            created_at: profile.created_at,
        }
    }

    fn to_profile(&self) -> DogProfile {
        DogProfile {
            id: self.id.clone(),
            nfc_id: non_empty(self.nfc_id.as_deref()),
            name: self.name.trim().to_string(),
            breed: self.breed.trim().to_string(),
            gender: self.gender,
            photo_url: non_empty(self.photo_url.as_deref()),
            birth_date: self.birth_date,
            vaccinations: self.vaccinations.clone(),
            created_at: self.created_at,
        }
    }
}

/// A single draft field change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftField {
    Name(String),
    Breed(String),
    Gender(Gender),
    BirthDate(NaiveDate),
    NfcId(Option<String>),
    PhotoUrl(Option<String>),
}

/// Request for the fields of a new vaccination entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaccinationPrompt {
    pub default_date: NaiveDate,
}

/// Answer to an input request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse<T> {
    Submit(T),
    Cancel,
}

/// Work order for one breed detection run
#[derive(Debug, Clone)]
pub struct DetectionTicket {
    generation: u64,
    image: Vec<u8>,
    mime_type: String,
}

impl DetectionTicket {
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreedDetectionOutcome {
    /// The draft's breed was overwritten
    Applied(String),
    /// Detection failed; the breed was left as it was
    Failed(String),
    /// The result arrived for a draft generation that is no longer current
    Discarded,
}

pub struct ProfileEditor {
    mode: EditorMode,
    draft: ProfileDraft,
    today: NaiveDate,
    generation: u64,
    pending_detection: Option<u64>,
    closed: bool,
}

impl ProfileEditor {
    /// Editor for a new profile, optionally linked to a scanned tag
    pub fn new_profile(nfc_id: Option<String>) -> Self {
        Self::new_profile_at(nfc_id, Local::now().date_naive(), Utc::now().timestamp_millis())
    }

    pub fn new_profile_at(nfc_id: Option<String>, today: NaiveDate, created_at: i64) -> Self {
        info!("Opening editor for a new profile (tag: {:?})", nfc_id);
        Self::with_draft(EditorMode::New, ProfileDraft::blank(nfc_id, today, created_at), today)
    }

    /// Editor seeded from an existing profile
    pub fn edit(profile: &DogProfile) -> Self {
        info!("Opening editor for profile {}", profile.id);
        Self::with_draft(EditorMode::Edit, ProfileDraft::from_profile(profile), Local::now().date_naive())
    }

    /// Open the editor a route points at
    pub async fn open(route: &Route, store: &ProfileStore) -> Result<Self, ProfileError> {
        match route {
            Route::CreateProfile { nfc_id } => Ok(Self::new_profile(nfc_id.clone())),
            Route::EditProfile { id } => store
                .get(id)
                .await
                .map(|profile| Self::edit(&profile))
                .ok_or_else(|| ProfileError::NotFound(id.clone())),
            other => Err(ProfileError::NotFound(other.path())),
        }
    }

    fn with_draft(mode: EditorMode, draft: ProfileDraft, today: NaiveDate) -> Self {
        Self {
            mode,
            draft,
            today,
            generation: 0,
            pending_detection: None,
            closed: false,
        }
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn is_new(&self) -> bool {
        self.mode == EditorMode::New
    }

    pub fn draft(&self) -> &ProfileDraft {
        &self.draft
    }

    /// Whether a breed detection result is still awaited
    pub fn is_analyzing(&self) -> bool {
        self.pending_detection.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Change one draft field. No validation happens until submit.
    pub fn set_field(&mut self, field: DraftField) {
        match field {
            DraftField::Name(name) => self.draft.name = name,
            DraftField::Breed(breed) => self.draft.breed = breed,
            DraftField::Gender(gender) => self.draft.gender = gender,
            DraftField::BirthDate(date) => self.draft.birth_date = date,
            DraftField::NfcId(nfc_id) => self.draft.nfc_id = nfc_id,
            DraftField::PhotoUrl(photo_url) => self.draft.photo_url = photo_url,
        }
    }

    /// Store the photo in the draft and hand out a breed detection ticket
    pub fn attach_photo(&mut self, image: Vec<u8>, mime_type: &str) -> DetectionTicket {
        self.draft.photo_url = Some(format!("data:{};base64,{}", mime_type, STANDARD.encode(&image)));
        self.generation += 1;
        self.pending_detection = Some(self.generation);

        info!("Photo attached to draft {} ({} bytes)", self.draft.id, image.len());
        DetectionTicket {
            generation: self.generation,
            image,
            mime_type: mime_type.to_string(),
        }
    }

    /// Apply the result of the detection started with `ticket`
    pub fn complete_breed_detection(
        &mut self,
        ticket: &DetectionTicket,
        result: Result<String, ExternalServiceError>,
    ) -> BreedDetectionOutcome {
        if self.closed || self.pending_detection != Some(ticket.generation) {
            info!("Discarding breed detection result for a superseded draft");
            return BreedDetectionOutcome::Discarded;
        }
        self.pending_detection = None;

        match result {
            Ok(breed) if !breed.trim().is_empty() => {
                let breed = breed.trim().to_string();
                info!("Detected breed: {}", breed);
                self.draft.breed = breed.clone();
                BreedDetectionOutcome::Applied(breed)
            }
            Ok(_) => {
                warn!("Breed detection returned an empty answer");
                BreedDetectionOutcome::Failed("no breed recognised".to_string())
            }
            Err(e) => {
                warn!("Breed detection failed: {}", e);
                BreedDetectionOutcome::Failed(e.to_string())
            }
        }
    }

    /// Attach a photo and wait for breed detection in place
    pub async fn attach_photo_and_detect(
        &mut self,
        image: Vec<u8>,
        mime_type: &str,
        detector: &dyn BreedDetector,
    ) -> BreedDetectionOutcome {
        let ticket = self.attach_photo(image, mime_type);
        let result = detector.detect_breed(ticket.image(), ticket.mime_type()).await;
        self.complete_breed_detection(&ticket, result)
    }

    /// Stop waiting for a running detection. Returns `false` if none was running.
    pub fn cancel_breed_detection(&mut self) -> bool {
        if self.pending_detection.take().is_none() {
            return false;
        }
        self.generation += 1;
        info!("Breed detection cancelled for draft {}", self.draft.id);
        true
    }

    pub fn vaccination_prompt(&self) -> VaccinationPrompt {
        VaccinationPrompt { default_date: self.today }
    }

    /// Append a vaccination from a prompt response. A cancelled prompt
    /// changes nothing and yields `None`.
    pub fn add_vaccination(
        &mut self,
        response: PromptResponse<VaccinationInput>,
    ) -> Result<Option<Vaccination>, ProfileValidationError> {
        let PromptResponse::Submit(input) = response else {
            return Ok(None);
        };

        let name = input.name.trim();
        if name.is_empty() {
            return Err(ProfileValidationError::EmptyVaccinationName);
        }

        let vaccination = Vaccination {
            id: generate_id(),
            name: name.to_string(),
            date: input.date,
            expiry_date: input.expiry_date,
            doctor_name: non_empty(input.doctor_name.as_deref()),
        };
        self.draft.vaccinations.push(vaccination.clone());
        Ok(Some(vaccination))
    }

    pub fn remove_vaccination(&mut self, vaccination_id: &str) -> Option<Vaccination> {
        let index = self
            .draft
            .vaccinations
            .iter()
            .position(|v| v.id == vaccination_id)?;
        Some(self.draft.vaccinations.remove(index))
    }

    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        if self.draft.name.trim().is_empty() {
            return Err(ProfileValidationError::EmptyName);
        }
        if self.draft.breed.trim().is_empty() {
            return Err(ProfileValidationError::EmptyBreed);
        }
        Ok(())
    }

    /// The profile the draft describes, if it passes validation
    pub fn validated_profile(&self) -> Result<DogProfile, ProfileValidationError> {
        self.validate()?;
        Ok(self.draft.to_profile())
    }

    /// Validate and save the draft, then close the editor
    ///
    /// Returns the detail route of the saved profile. The breed saved is the
    /// one in the draft right now; a detection still running is discarded.
    pub async fn submit(&mut self, store: &ProfileStore) -> Result<(DogProfile, Route), ProfileError> {
        let profile = self.validated_profile()?;
        let saved = match self.mode {
            EditorMode::New => store.add(profile).await?,
            EditorMode::Edit => store.update(profile).await?,
        };

        self.closed = true;
        self.pending_detection = None;
        self.generation += 1;

        info!("Saved profile {} ({})", saved.id, saved.name);
        let route = Route::ProfileDetail { id: saved.id.clone() };
        Ok((saved, route))
    }
}

fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
