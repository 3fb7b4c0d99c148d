use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::form_urlencoded;

/// Gender of a dog
///
/// Serialized as `MALE` / `FEMALE`. The localized labels written by the first
/// browser version of the app are still accepted when reading old snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    #[serde(rename = "MALE", alias = "Samiec")]
    Male,
    #[serde(rename = "FEMALE", alias = "Samiczka")]
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "Male"),
            Gender::Female => write!(f, "Female"),
        }
    }
}

/// A single vaccination entry, owned by exactly one dog profile.
///
/// Entries are never edited in place; a correction is a delete followed by a
/// new entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vaccination {
    /// Unique within the owning profile
    pub id: String,
    pub name: String,
    /// Date the vaccine was administered (YYYY-MM-DD)
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    /// Name of the vet who administered the vaccine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
}

/// A dog profile, optionally linked to a physical NFC tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DogProfile {
    pub id: String,
    /// Serial number of the NFC tag attached to the collar
    #[serde(default)]
    pub nfc_id: Option<String>,
    pub name: String,
    pub breed: String,
    #[serde(default)]
    pub gender: Gender,
    /// Photo reference, usually a `data:` URL
    #[serde(default)]
    pub photo_url: Option<String>,
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub vaccinations: Vec<Vaccination>,
    /// Creation time in epoch milliseconds
    pub created_at: i64,
}

impl DogProfile {
    /// Whether this profile is linked to the given tag
    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.nfc_id.as_deref() == Some(tag_id)
    }

    /// Age in whole years at `today`
    pub fn age_in_years(&self, today: NaiveDate) -> u32 {
        let birth = self.birth_date;
        let mut years = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        years.max(0) as u32
    }

    /// Age in whole months at `today`
    pub fn age_in_months(&self, today: NaiveDate) -> u32 {
        let birth = self.birth_date;
        let mut months = (today.year() - birth.year()) * 12 + today.month() as i32 - birth.month() as i32;
        if today.day() < birth.day() {
            months -= 1;
        }
        months.max(0) as u32
    }

    /// Vaccinations ordered by administration date, most recent first
    pub fn vaccinations_newest_first(&self) -> Vec<Vaccination> {
        let mut vaccinations = self.vaccinations.clone();
        vaccinations.sort_by(|a, b| b.date.cmp(&a.date));
        vaccinations
    }
}

/// Complete persisted state of the profile list at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub profiles: Vec<DogProfile>,
}

/// Coarse state of the NFC scan session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ScanState {
    #[default]
    Idle,
    /// Waiting for the reader to grant access
    Requesting,
    /// Listening for tags
    Reading,
    Error(String),
}

/// Transient NFC status shown to the user. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfcScanStatus {
    pub is_supported: bool,
    pub is_reading: bool,
    pub last_error: Option<String>,
    pub scanned_tag_id: Option<String>,
    pub state: ScanState,
}

/// A user-facing view. Paths follow the hash-router layout of the web app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Route {
    Home,
    ProfileDetail { id: String },
    CreateProfile { nfc_id: Option<String> },
    EditProfile { id: String },
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::ProfileDetail { id } => format!("/dog/{}", id),
            Route::CreateProfile { nfc_id: Some(tag) } => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("nfc", tag)
                    .finish();
                format!("/add?{}", query)
            }
            Route::CreateProfile { nfc_id: None } => "/add".to_string(),
            Route::EditProfile { id } => format!("/edit/{}", id),
        }
    }

    /// Parse a route path, with or without the leading `#`
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.trim_start_matches('#');
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };

        match path.trim_end_matches('/') {
            "" => Some(Route::Home),
            "/add" => {
                let nfc_id = query
                    .into_iter()
                    .flat_map(|q| form_urlencoded::parse(q.as_bytes()))
                    .find(|(key, _)| key == "nfc")
                    .map(|(_, value)| value.into_owned())
                    .filter(|value| !value.is_empty());
                Some(Route::CreateProfile { nfc_id })
            }
            other => {
                if let Some(id) = other.strip_prefix("/dog/") {
                    (!id.is_empty() && !id.contains('/')).then(|| Route::ProfileDetail { id: id.to_string() })
                } else if let Some(id) = other.strip_prefix("/edit/") {
                    (!id.is_empty() && !id.contains('/')).then(|| Route::EditProfile { id: id.to_string() })
                } else {
                    None
                }
            }
        }
    }
}

/// Structured input for a new vaccination entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccinationInput {
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub doctor_name: Option<String>,
}

/// Request body for creating or updating a dog profile
///
/// Optional fields left out keep their current value: the stored one on
/// update, the new-profile default on create. An empty `photoUrl` or `nfcId`
/// clears the photo or unlinks the tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProfileRequest {
    pub name: String,
    pub breed: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub nfc_id: Option<String>,
    /// Only used on create; vaccinations of an existing profile are managed
    /// through their own endpoints
    #[serde(default)]
    pub vaccinations: Vec<VaccinationInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub profile: DogProfile,
    /// Where the client should navigate next
    pub route: Route,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileListResponse {
    pub profiles: Vec<DogProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProfileResponse {
    pub deleted: bool,
    pub route: Route,
}

/// A tag identifier pushed by an NFC bridge device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagReadingRequest {
    pub tag_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveTagRequest {
    pub tag_id: String,
    /// The user's answer to "create a new profile for this tag?"
    #[serde(default)]
    pub confirm_create: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveTagResponse {
    pub tag_id: String,
    /// Owning profile, if the tag is already assigned
    pub profile: Option<DogProfile>,
    /// `None` means stay on the current view
    pub route: Option<Route>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfcStatusResponse {
    pub status: NfcScanStatus,
    /// Resolution of the most recent tag seen by the running scan
    pub last_resolution: Option<ResolveTagResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreedDetectionResponse {
    pub breed: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccinationAdviceResponse {
    pub breed: String,
    pub age_in_months: u32,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkResponse {
    pub base_url: String,
    pub qr_code_url: String,
    /// Deep link to a single profile, when one was requested
    pub profile_url: Option<String>,
}
