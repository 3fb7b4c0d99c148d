//! Error types for the Gemini API client.

use serde::Deserialize;
use thiserror::Error;

use crate::domain::ExternalServiceError;

/// Errors that can occur when talking to the Gemini API
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API key cannot be sent as a header value
    #[error("invalid API key: {0}")]
    InvalidApiKey(String),

    #[error("API error ({status}): {message}")]
    Api { status: String, message: String },

    #[error("rate limited")]
    RateLimited,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("parse error: {0}")]
    Parse(String),

    /// The model answered without any text
    #[error("empty response")]
    EmptyResponse,
}

impl GeminiError {
    /// Map to the domain error for the named collaborator
    pub fn into_external(self, service: &'static str) -> ExternalServiceError {
        match self {
            GeminiError::Parse(message) => ExternalServiceError::InvalidResponse { service, message },
            GeminiError::EmptyResponse => ExternalServiceError::InvalidResponse {
                service,
                message: "empty response".to_string(),
            },
            other => ExternalServiceError::RequestFailed {
                service,
                message: other.to_string(),
            },
        }
    }
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub status: String,
}
