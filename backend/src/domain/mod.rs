//! # Domain Module
//!
//! Business logic for dog profiles and their NFC tags.
//!
//! Nothing in here knows about HTTP or the file system. Persistence, the tag
//! reader and the generative-AI collaborators are injected through traits.
//!
//! ## Module Organization
//!
//! - **profile_store**: The profile list, its invariants and its persistence
//! - **nfc_scan**: Scan session over a tag reader, with cancellable handles
//! - **scan_resolution**: What a scanned tag means (open a profile or offer to create one)
//! - **profile_editor**: Draft editing, photo-based breed detection and submit
//! - **assistant**: Breed detection and vaccination advice ports
//! - **share_link**: Links and QR codes for opening the app on another device
//!
//! ## Business Rules
//!
//! - A profile needs a non-empty name and breed
//! - A tag is linked to at most one profile
//! - Vaccinations belong to exactly one profile and are never edited in place

pub mod assistant;
pub mod errors;
pub mod nfc_scan;
pub mod profile_editor;
pub mod profile_store;
pub mod scan_resolution;
pub mod share_link;

pub use assistant::{BreedDetector, VaccinationAdviceService, VaccinationAdvisor, FALLBACK_VACCINATIONS};
pub use errors::{ExternalServiceError, ProfileError, ProfileValidationError, ScanError};
pub use nfc_scan::{NfcScanSession, ScanSubscription, TagReader, TagStream};
pub use profile_editor::{BreedDetectionOutcome, DraftField, ProfileEditor, PromptResponse};
pub use profile_store::{demo_profiles, ProfileStore};
pub use scan_resolution::{decide, resolve_tag, CreateProfilePrompt, ScanResolver, TagResolution};
pub use share_link::{profile_share_url, qr_code_url, shareable_base_url};
