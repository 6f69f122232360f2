//! Google Gemini provider implementation.
//!
//! Sends one `generateContent` request carrying the prompt text and the
//! problem image as base64 inline data. No streaming.
//!
//! ## Security
//!
//! Keys live in a [`CredentialPool`]; only the current key is exposed, and
//! only while building the request header.

use super::{
    factory::ProviderFactory,
    secrets::{CredentialPool, GEMINI_API_KEY_ENV},
    CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage, VisionRequest,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Default API root.
pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini vision provider with key rotation.
pub struct GeminiProvider {
    credentials: CredentialPool,
    base_url: String,
    #[cfg(feature = "gemini")]
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(credentials: CredentialPool) -> Self {
        Self {
            credentials,
            base_url: GEMINI_DEFAULT_BASE_URL.to_string(),
            #[cfg(feature = "gemini")]
            client: reqwest::Client::new(),
        }
    }

    /// Create from JSON configuration with environment fallback.
    ///
    /// Recognized keys: `api_key`, `api_keys`, `base_url`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credentials = CredentialPool::from_config_or_env(config)?;
        let mut provider = Self::new(credentials);
        if let Some(url) = config["base_url"].as_str() {
            provider.base_url = url.trim_end_matches('/').to_string();
        }
        Ok(provider)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

/// Gemini API request format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

fn build_request(request: &VisionRequest, config: &CompletionConfig) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![
                Part::Text {
                    text: request.prompt.clone(),
                },
                Part::Inline {
                    inline_data: InlineData {
                        mime_type: request.image.mime_type(),
                        data: request.image.to_base64(),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
        },
    }
}

/// Gemini API response format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

fn into_completion(
    body: GenerateResponse,
    config: &CompletionConfig,
) -> Result<CompletionResponse, ProviderError> {
    let usage = body
        .usage_metadata
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    let Some(candidate) = body.candidates.into_iter().next() else {
        let detail = body
            .prompt_feedback
            .map(|f| f.to_string())
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(ProviderError::EmptyResponse(detail));
    };

    let content = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(ProviderError::EmptyResponse(
            candidate
                .finish_reason
                .unwrap_or_else(|| "empty candidate".to_string()),
        ));
    }

    Ok(CompletionResponse {
        content,
        usage,
        model: body.model_version.unwrap_or_else(|| config.model.clone()),
        finish_reason: candidate.finish_reason,
    })
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    #[cfg(feature = "gemini")]
    async fn complete(
        &self,
        request: &VisionRequest,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = build_request(request, config);

        let response = self
            .client
            .post(self.endpoint(&config.model))
            .header("x-goog-api-key", self.credentials.current().expose())
            .header("content-type", "application/json")
            .timeout(config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(std::time::Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        into_completion(body, config)
    }

    #[cfg(not(feature = "gemini"))]
    async fn complete(
        &self,
        _request: &VisionRequest,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Gemini provider requires 'gemini' feature".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn rotate_credential(&self) -> usize {
        self.credentials.advance()
    }

    fn credential_count(&self) -> usize {
        self.credentials.len()
    }
}

/// Factory for creating Gemini providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_keys": ["AIza...", "AIza..."],   // Optional, falls back to GEMINI_API_KEY_1..N
///   "api_key": "AIza...",                 // Optional single key
///   "base_url": "https://..."             // Optional, custom API root
/// }
/// ```
pub struct GeminiProviderFactory;

impl ProviderFactory for GeminiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "gemini"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(GeminiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !CredentialPool::is_available(config) {
            return Err(ProviderError::NotConfigured(format!(
                "Gemini API key required: set 'api_keys' in config or {}_1..N / {} env",
                GEMINI_API_KEY_ENV, GEMINI_API_KEY_ENV
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }
}
