//! Vision-model provider abstractions.
//!
//! This module defines the trait every hosted-model backend implements and
//! the one concrete backend, Gemini.
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for credential handling.
//! See [`ApiCredential`] and [`CredentialPool`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
mod gemini;
pub mod secrets;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use gemini::{GeminiProvider, GeminiProviderFactory, GEMINI_DEFAULT_BASE_URL};
pub use secrets::{ApiCredential, CredentialPool, CredentialSource};

use crate::config::duration_str;
use crate::image::ImageInput;

/// Errors from model providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Model returned no text: {0}")]
    EmptyResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Whether another attempt (usually with the next credential) may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::NotConfigured(_))
    }
}

/// Generation settings for one completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_output_tokens: u32,

    pub temperature: f32,

    pub top_p: f32,

    pub top_k: u32,

    /// Per-attempt request timeout
    #[serde(with = "duration_str")]
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            max_output_tokens: 8192,
            temperature: 0.05,
            top_p: 0.95,
            top_k: 40,
            timeout: Duration::from_secs(180),
        }
    }
}

/// One prompt plus one image.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,
    pub image: ImageInput,
}

impl VisionRequest {
    pub fn new(prompt: impl Into<String>, image: ImageInput) -> Self {
        Self {
            prompt: prompt.into(),
            image,
        }
    }
}

/// Response from a completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated text
    pub content: String,

    pub usage: TokenUsage,

    /// Model version reported by the API
    pub model: String,

    pub finish_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction allows swapping model backends.
///
/// This is the only place where network calls to a model are made.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute one vision completion.
    async fn complete(
        &self,
        request: &VisionRequest,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Get provider name for logs.
    fn name(&self) -> &str;

    /// Switch to the next credential, if the provider holds more than one.
    ///
    /// Returns the index now in use.
    fn rotate_credential(&self) -> usize {
        0
    }

    /// Number of credentials available for rotation.
    fn credential_count(&self) -> usize {
        1
    }
}
