//! Named provider lookup.
//!
//! The runtime config names its provider by string (`provider.type`) and
//! carries free-form JSON settings. A [`ProviderRegistry`] maps that name to
//! a [`ProviderFactory`], which checks the settings and builds the provider.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! registry.validate("gemini", &settings)?;
//! let provider = registry.create("gemini", &settings)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{GeminiProviderFactory, LlmProvider, ProviderError};

/// Builds one kind of provider from JSON settings.
pub trait ProviderFactory: Send + Sync {
    /// Name used in `provider.type`, e.g. "gemini".
    fn provider_type(&self) -> &'static str;

    /// Reject settings that can never produce a working provider.
    fn validate_config(&self, settings: &JsonValue) -> Result<(), ProviderError>;

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;
}

/// Provider factories keyed by type name.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the Gemini factory.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GeminiProviderFactory));
        registry
    }

    /// Add a factory; a later one with the same type wins.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(factory.provider_type(), factory);
    }

    pub fn available_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn validate(&self, provider_type: &str, settings: &JsonValue) -> Result<(), ProviderError> {
        self.lookup(provider_type)?.validate_config(settings)
    }

    pub fn create(
        &self,
        provider_type: &str,
        settings: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.lookup(provider_type)?.create(settings)
    }

    fn lookup(&self, provider_type: &str) -> Result<&dyn ProviderFactory, ProviderError> {
        self.factories
            .get(provider_type)
            .map(|factory| factory.as_ref())
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "Unknown provider type '{}' (available: {})",
                    provider_type,
                    self.available_types().join(", ")
                ))
            })
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}
