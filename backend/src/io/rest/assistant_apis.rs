//! # REST API for Breed Detection
//!
//! Accepts a raw photo body and answers with the detected breed.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use shared::BreedDetectionResponse;
use tracing::{error, info};

use super::external_error_response;
use crate::domain::ExternalServiceError;
use crate::AppState;

/// Largest photo accepted for breed detection
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_MIME_TYPE: &str = "image/jpeg";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(detect_breed))
        .layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES))
}

pub async fn detect_breed(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let mime_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| value.starts_with("image/"))
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string();
    info!("POST /api/breed-detection - {} bytes of {}", body.len(), mime_type);

    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, "Photo cannot be empty").into_response();
    }

    let Some(detector) = state.breed_detector.clone() else {
        return external_error_response(ExternalServiceError::NotConfigured("breed detection"));
    };

    match detector.detect_breed(&body, &mime_type).await {
        Ok(breed) => (StatusCode::OK, Json(BreedDetectionResponse { breed })).into_response(),
        Err(e) => {
            error!("Breed detection failed: {}", e);
            external_error_response(e)
        }
    }
}
