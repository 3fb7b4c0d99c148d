//! Error types shared by the domain services.

use thiserror::Error;

/// Reasons a profile (or one of its parts) is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileValidationError {
    #[error("Dog name cannot be empty")]
    EmptyName,
    #[error("Breed cannot be empty")]
    EmptyBreed,
    #[error("Vaccination name cannot be empty")]
    EmptyVaccinationName,
    #[error("A profile with id {0} already exists")]
    DuplicateId(String),
    #[error("Tag {tag_id} is already assigned to profile {profile_id}")]
    TagAlreadyAssigned { tag_id: String, profile_id: String },
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Validation(#[from] ProfileValidationError),
    #[error("Profile not found: {0}")]
    NotFound(String),
    #[error("Vaccination not found: {0}")]
    VaccinationNotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Failures of the NFC scan session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("NFC is not supported on this device")]
    Unsupported,
    #[error("NFC permission denied: {0}")]
    PermissionDenied(String),
    #[error("NFC reader error: {0}")]
    Hardware(String),
    #[error("NFC scan was cancelled before the reader started")]
    Cancelled,
}

/// Failures of the generative-AI collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalServiceError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("{service} request failed: {message}")]
    RequestFailed { service: &'static str, message: String },
    #[error("{service} returned an unusable response: {message}")]
    InvalidResponse { service: &'static str, message: String },
}
