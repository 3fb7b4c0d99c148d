//! # REST API Interface Layer
//!
//! HTTP endpoints for the dog profile service. Handlers translate JSON
//! requests into domain calls and domain errors into status codes:
//!
//! | error                          | status |
//! |--------------------------------|--------|
//! | validation                     | 400    |
//! | profile not found              | 404    |
//! | NFC not supported              | 501    |
//! | NFC scan could not start       | 409    |
//! | assistant not configured       | 503    |
//! | assistant request failed       | 502    |
//! | storage                        | 500    |
//!
//! Error bodies are plain text.

pub mod assistant_apis;
pub mod nfc_apis;
pub mod profile_apis;
pub mod share_apis;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::domain::{ExternalServiceError, ProfileError, ScanError};

pub(crate) fn profile_error_response(e: ProfileError) -> Response {
    let status = match &e {
        ProfileError::Validation(_) => StatusCode::BAD_REQUEST,
        ProfileError::NotFound(_) | ProfileError::VaccinationNotFound(_) => StatusCode::NOT_FOUND,
        ProfileError::Storage(_) => {
            error!("Storage failure: {:#}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Error saving profiles").into_response();
        }
    };
    (status, e.to_string()).into_response()
}

pub(crate) fn scan_error_response(e: ScanError) -> Response {
    let status = match e {
        ScanError::Unsupported => StatusCode::NOT_IMPLEMENTED,
        ScanError::PermissionDenied(_) | ScanError::Hardware(_) | ScanError::Cancelled => StatusCode::CONFLICT,
    };
    (status, e.to_string()).into_response()
}

pub(crate) fn external_error_response(e: ExternalServiceError) -> Response {
    let status = match e {
        ExternalServiceError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        ExternalServiceError::RequestFailed { .. } | ExternalServiceError::InvalidResponse { .. } => {
            StatusCode::BAD_GATEWAY
        }
    };
    (status, e.to_string()).into_response()
}
