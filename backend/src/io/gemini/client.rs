//! Gemini API client for breed detection and vaccination advice.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::{debug, instrument};

use crate::config::GeminiConfig;
use crate::domain::{BreedDetector, ExternalServiceError, VaccinationAdvisor};

use super::error::{ApiErrorResponse, GeminiError};
use super::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part, VaccinationAdvice};

const BREED_PROMPT: &str = "Identify the breed of the dog in this photo. Answer with the breed name only.";

/// Answer used when the model recognises no breed
pub const UNKNOWN_BREED: &str = "Unknown breed";

/// Gemini API client
#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl GeminiClient {
    /// Create a client for the configured model
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(config: &GeminiConfig) -> Result<Self, GeminiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|e| GeminiError::InvalidApiKey(e.to_string()))?;
        api_key.set_sensitive(true);
        headers.insert("x-goog-api-key", api_key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            inner: Arc::new(GeminiClientInner {
                client,
                endpoint,
                model: config.model.clone(),
            }),
        })
    }

    /// Name the breed of the dog in `image`
    #[instrument(skip(self, image), fields(model = %self.inner.model, bytes = image.len()))]
    pub async fn identify_breed(&self, image: &[u8], mime_type: &str) -> Result<String, GeminiError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::inline_data(mime_type, STANDARD.encode(image)),
                    Part::text(BREED_PROMPT),
                ],
            }],
            generation_config: None,
        };

        let text = self.generate(&request).await?;
        let breed = text.trim();
        if breed.is_empty() {
            return Ok(UNKNOWN_BREED.to_string());
        }
        Ok(breed.to_string())
    }

    /// Ordered list of vaccines recommended for a dog
    #[instrument(skip(self), fields(model = %self.inner.model))]
    pub async fn vaccination_advice(&self, breed: &str, age_in_months: u32) -> Result<Vec<String>, GeminiError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(format!(
                    "For a dog of breed {} aged {} months, list the recommended vaccinations as JSON.",
                    breed, age_in_months
                ))],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: json!({
                    "type": "OBJECT",
                    "properties": {
                        "recommendations": {
                            "type": "ARRAY",
                            "items": { "type": "STRING" }
                        }
                    },
                    "required": ["recommendations"]
                }),
            }),
        };

        let text = self.generate(&request).await?;
        let advice: VaccinationAdvice = serde_json::from_str(&text)
            .map_err(|e| GeminiError::Parse(format!("Failed to parse advice: {e}")))?;

        Ok(advice
            .recommendations
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect())
    }

    /// Send a request and return the answer text
    async fn generate(&self, request: &GenerateContentRequest) -> Result<String, GeminiError> {
        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_status(status, response).await);
        }

        let body = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| GeminiError::Parse(format!("Failed to parse response: {e}")))?;

        debug!("Gemini answered with {} candidates", parsed.candidates.len());
        parsed.text().ok_or(GeminiError::EmptyResponse)
    }
}

async fn handle_error_status(status: reqwest::StatusCode, response: reqwest::Response) -> GeminiError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return GeminiError::RateLimited;
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return GeminiError::Unauthorized("API key rejected".to_string());
    }

    match response.text().await {
        Ok(body) => match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_error) => GeminiError::Api {
                status: api_error.error.status,
                message: api_error.error.message,
            },
            Err(_) => GeminiError::Api {
                status: status.to_string(),
                message: body,
            },
        },
        Err(e) => GeminiError::Http(e),
    }
}

#[async_trait]
impl BreedDetector for GeminiClient {
    async fn detect_breed(&self, image: &[u8], mime_type: &str) -> Result<String, ExternalServiceError> {
        self.identify_breed(image, mime_type)
            .await
            .map_err(|e| e.into_external("breed detection"))
    }
}

#[async_trait]
impl VaccinationAdvisor for GeminiClient {
    async fn recommend_vaccinations(&self, breed: &str, age_in_months: u32) -> Result<Vec<String>, ExternalServiceError> {
        self.vaccination_advice(breed, age_in_months)
            .await
            .map_err(|e| e.into_external("vaccination advice"))
    }
}
