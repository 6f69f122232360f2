//! Runtime configuration.
//!
//! Loaded from YAML. Every field has a default, so an empty file (or no
//! file at all) gives a working local setup. Durations are written the
//! human way: `90s`, `2m`, `500ms`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::providers::CompletionConfig;

/// Upper bound on model attempts regardless of pool size.
pub const MAX_ATTEMPTS_CAP: usize = 5;

/// Errors loading runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which provider to build and with what settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Registered provider type, e.g. "gemini"
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Provider-specific settings passed to its factory
    #[serde(default = "empty_settings")]
    pub settings: JsonValue,
}

fn default_provider_type() -> String {
    "gemini".to_string()
}

fn empty_settings() -> JsonValue {
    serde_json::json!({})
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            settings: empty_settings(),
        }
    }
}

/// Which compiler backend to use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CompilerSettings {
    /// Local `pdflatex` subprocess
    Local {
        #[serde(default = "default_program")]
        program: String,

        /// Per-pass timeout
        #[serde(default = "default_pass_timeout", with = "duration_str")]
        pass_timeout: Duration,
    },
    /// HTTP compile service
    Remote {
        endpoint: String,

        #[serde(default = "default_remote_timeout", with = "duration_str")]
        timeout: Duration,
    },
}

fn default_program() -> String {
    "pdflatex".to_string()
}

fn default_pass_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_remote_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for CompilerSettings {
    fn default() -> Self {
        CompilerSettings::Local {
            program: default_program(),
            pass_timeout: default_pass_timeout(),
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: ProviderSettings,

    /// Generation settings
    pub model: CompletionConfig,

    pub compiler: CompilerSettings,

    /// Where `.tex` and `.pdf` files are written
    pub output_dir: PathBuf,

    /// Keep `<job>.debug.tex` next to the PDF
    pub keep_debug_source: bool,

    /// Model attempts per request; defaults to the credential count
    pub max_attempts: Option<usize>,

    /// Pause between model attempts
    #[serde(with = "duration_str")]
    pub retry_delay: Duration,

    /// Replacement knowledge-base YAML
    pub knowledge: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderSettings::default(),
            model: CompletionConfig::default(),
            compiler: CompilerSettings::default(),
            output_dir: std::env::temp_dir().join("trisolve"),
            keep_debug_source: false,
            max_attempts: None,
            retry_delay: Duration::from_secs(2),
            knowledge: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".to_string()));
        }
        if self.model.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model.model must not be empty".to_string()));
        }
        if let CompilerSettings::Remote { endpoint, .. } = &self.compiler {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::Invalid(
                    "compiler.endpoint must start with http:// or https://".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Attempts for a provider holding `credentials` keys.
    pub fn attempts_for(&self, credentials: usize) -> usize {
        self.max_attempts
            .unwrap_or(credentials)
            .clamp(1, MAX_ATTEMPTS_CAP)
    }
}

/// Serde adapter for human-readable durations.
pub(crate) mod duration_str {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(D::Error::custom)
    }
}
