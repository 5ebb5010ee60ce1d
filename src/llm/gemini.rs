//! Gemini `generateContent` client.
//!
//! One client wraps exactly one credential; execution units never share one.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::classify::{classify_api_error, parse_duration_literal};
use super::TextGenerator;
use crate::credentials::Credential;
use crate::error::GenerationError;

/// Default Generative Language API endpoint.
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Type tag of the retry hint inside `error.details`.
const RETRY_INFO_TYPE: &str = "type.googleapis.com/google.rpc.RetryInfo";

/// Type tag of the machine-readable error reason inside `error.details`.
const ERROR_INFO_TYPE: &str = "type.googleapis.com/google.rpc.ErrorInfo";

/// Client for a single Gemini credential.
pub struct GeminiClient {
    http_client: Client,
    credential: Credential,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Creates a client for `credential` using `model`.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Transient` if the HTTP client cannot be built.
    pub fn new(
        credential: Credential,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Transient(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            credential,
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Overrides the API base URL (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the masked credential.
    pub fn credential_masked(&self) -> String {
        self.credential.masked()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Request body of `generateContent`.
#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    contents: Vec<ApiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiContent<'a> {
    parts: Vec<ApiRequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiRequestPart<'a> {
    text: &'a str,
}

impl<'a> ApiRequest<'a> {
    fn from_prompt(prompt: &'a str) -> Self {
        Self {
            contents: vec![ApiContent {
                parts: vec![ApiRequestPart { text: prompt }],
            }],
        }
    }
}

/// Response body of `generateContent`.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidateContent {
    #[serde(default)]
    parts: Vec<ApiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ApiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl ApiResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

impl ApiErrorDetail {
    /// String field `field` of the first detail tagged `type_url`.
    fn detail_field(&self, type_url: &str, field: &str) -> Option<&str> {
        self.details
            .iter()
            .filter(|d| d.get("@type").and_then(|t| t.as_str()) == Some(type_url))
            .find_map(|d| d.get(field).and_then(|v| v.as_str()))
    }

    /// Retry delay from a `google.rpc.RetryInfo` detail, if present.
    fn retry_delay(&self) -> Option<Duration> {
        self.detail_field(RETRY_INFO_TYPE, "retryDelay")
            .and_then(parse_duration_literal)
    }

    /// Reason from a `google.rpc.ErrorInfo` detail, e.g. `API_KEY_INVALID`.
    fn reason(&self) -> Option<&str> {
        self.detail_field(ERROR_INFO_TYPE, "reason")
    }
}

/// Maps a non-2xx response body to a classified error.
fn classify_error_body(status_code: u16, body: &str) -> GenerationError {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => {
            let retry_after = parsed.error.retry_delay();
            classify_api_error(
                status_code,
                parsed.error.status.as_deref(),
                parsed.error.reason(),
                &parsed.error.message,
                retry_after,
            )
        }
        Err(_) => classify_api_error(status_code, None, None, body, None),
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let http_response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", self.credential.expose())
            .json(&ApiRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(|e| GenerationError::Transient(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(classify_error_body(status.as_u16(), &error_text));
        }

        let api_response: ApiResponse = http_response.json().await.map_err(|e| {
            GenerationError::Transient(format!("Failed to parse API response: {}", e))
        })?;

        Ok(api_response.text())
    }
}
