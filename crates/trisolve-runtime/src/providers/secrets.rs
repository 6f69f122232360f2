//! Credential handling for model providers.
//!
//! Using this module ensures:
//!
//! - **No accidental logging**: credentials cannot appear in Debug/Display output
//! - **Explicit exposure**: the raw key is only read at the point of use
//! - **Rotation**: a [`CredentialPool`] cycles through several keys
//!
//! ## Usage
//!
//! ```ignore
//! use crate::providers::secrets::CredentialPool;
//!
//! // GEMINI_API_KEY_1..N, or GEMINI_API_KEY
//! let pool = CredentialPool::from_env()?;
//!
//! request.header("x-goog-api-key", pool.current().expose());
//! pool.advance();
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::ProviderError;

/// Environment variable used when no numbered keys are set.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Prefix of the numbered key variables (`GEMINI_API_KEY_1`, ...).
pub const GEMINI_API_KEY_PREFIX: &str = "GEMINI_API_KEY_";

/// Highest numbered key variable that is scanned.
pub const MAX_NUMBERED_KEYS: usize = 16;

const CREDENTIAL_NAME: &str = "Gemini API key";

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from configuration file/JSON
    Config,
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// `Debug` and `Display` show `[REDACTED]`; the value is only reachable
/// through [`ApiCredential::expose`].
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Expose the credential value for use in API calls.
    ///
    /// Only call this where the credential is actually needed, such as
    /// setting an HTTP header. Never store the exposed value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().trim().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

/// An ordered set of credentials with a shared rotation index.
///
/// The index is the only mutable state shared between concurrent requests.
/// [`CredentialPool::advance`] wraps around, so rotation never runs out.
pub struct CredentialPool {
    credentials: Vec<ApiCredential>,
    index: AtomicUsize,
}

impl CredentialPool {
    /// Build a pool, dropping empty credentials.
    pub fn new(credentials: Vec<ApiCredential>) -> Result<Self, ProviderError> {
        let credentials: Vec<_> = credentials.into_iter().filter(|c| !c.is_empty()).collect();
        if credentials.is_empty() {
            return Err(ProviderError::NotConfigured(format!(
                "{} required: set {}1..{}{} or {}",
                CREDENTIAL_NAME,
                GEMINI_API_KEY_PREFIX,
                GEMINI_API_KEY_PREFIX,
                MAX_NUMBERED_KEYS,
                GEMINI_API_KEY_ENV
            )));
        }
        Ok(Self {
            credentials,
            index: AtomicUsize::new(0),
        })
    }

    /// A pool with a single programmatic key.
    pub fn single(key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(vec![ApiCredential::new(
            key,
            CredentialSource::Programmatic,
            CREDENTIAL_NAME,
        )])
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load numbered keys through `lookup`, falling back to the unnumbered one.
    ///
    /// Gaps are allowed: `_1` and `_3` without `_2` yields two keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProviderError> {
        let mut credentials: Vec<ApiCredential> = (1..=MAX_NUMBERED_KEYS)
            .filter_map(|n| lookup(&format!("{}{}", GEMINI_API_KEY_PREFIX, n)))
            .map(|v| ApiCredential::new(v, CredentialSource::Environment, CREDENTIAL_NAME))
            .filter(|c| !c.is_empty())
            .collect();

        if credentials.is_empty() {
            if let Some(v) = lookup(GEMINI_API_KEY_ENV) {
                credentials.push(ApiCredential::new(
                    v,
                    CredentialSource::Environment,
                    CREDENTIAL_NAME,
                ));
            }
        }

        Self::new(credentials)
    }

    /// Load from JSON config (`api_keys` list or `api_key` string),
    /// falling back to the environment.
    pub fn from_config_or_env(config: &JsonValue) -> Result<Self, ProviderError> {
        let mut configured: Vec<ApiCredential> = config["api_keys"]
            .as_array()
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| k.as_str())
                    .map(|k| ApiCredential::new(k, CredentialSource::Config, CREDENTIAL_NAME))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(key) = config["api_key"].as_str() {
            configured.push(ApiCredential::new(key, CredentialSource::Config, CREDENTIAL_NAME));
        }

        if configured.iter().any(|c| !c.is_empty()) {
            return Self::new(configured);
        }

        Self::from_env()
    }

    /// Check whether any credential is available without loading it.
    pub fn is_available(config: &JsonValue) -> bool {
        config["api_key"].as_str().is_some()
            || config["api_keys"].as_array().is_some_and(|a| !a.is_empty())
            || std::env::var(GEMINI_API_KEY_ENV).is_ok()
            || (1..=MAX_NUMBERED_KEYS)
                .any(|n| std::env::var(format!("{}{}", GEMINI_API_KEY_PREFIX, n)).is_ok())
    }

    /// The credential currently in use.
    pub fn current(&self) -> &ApiCredential {
        &self.credentials[self.current_index()]
    }

    pub fn current_index(&self) -> usize {
        self.index.load(Ordering::Acquire) % self.credentials.len()
    }

    /// Move to the next credential, wrapping around. Returns the new index.
    pub fn advance(&self) -> usize {
        let len = self.credentials.len();
        let previous = self
            .index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
            .unwrap_or_else(|i| i);
        (previous + 1) % len
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("credentials", &self.credentials.len())
            .field("current", &self.current_index())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn test_credential_redacted_in_debug() {
        let secret = "AIza-super-secret-key-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Programmatic, "Test API key");

        let debug = format!("{:?}", cred);
        assert!(!debug.contains(secret), "Secret exposed in Debug!");
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_credential_redacted_in_display() {
        let secret = "AIza-super-secret-key-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Config, "Test API key");

        let display = format!("{}", cred);
        assert!(!display.contains(secret), "Secret exposed in Display!");
        assert!(display.contains("Test API key"));
        assert!(display.contains("config"));
    }

    #[test]
    fn test_credential_expose() {
        let cred = ApiCredential::new("k", CredentialSource::Programmatic, "Test");
        assert_eq!(cred.expose(), "k");
        assert_eq!(cred.source(), CredentialSource::Programmatic);
    }

    #[test]
    fn test_pool_numbered_keys_skip_gaps_and_empties() {
        let pool = CredentialPool::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY_1", "one"),
            ("GEMINI_API_KEY_2", "  "),
            ("GEMINI_API_KEY_4", "four"),
            ("GEMINI_API_KEY", "plain"),
        ]))
        .unwrap();

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.current().expose(), "one");
        pool.advance();
        assert_eq!(pool.current().expose(), "four");
    }

    #[test]
    fn test_pool_falls_back_to_plain_key() {
        let pool = CredentialPool::from_lookup(lookup_from(&[("GEMINI_API_KEY", "plain")])).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.current().expose(), "plain");
    }

    #[test]
    fn test_pool_empty_is_not_configured() {
        let result = CredentialPool::from_lookup(lookup_from(&[("GEMINI_API_KEY_1", "")]));
        match result {
            Err(ProviderError::NotConfigured(msg)) => assert!(msg.contains("GEMINI_API_KEY")),
            other => panic!("Expected NotConfigured, got {:?}", other),
        }
    }

    #[test]
    fn test_pool_advance_wraps() {
        let pool = CredentialPool::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY_1", "a"),
            ("GEMINI_API_KEY_2", "b"),
            ("GEMINI_API_KEY_3", "c"),
        ]))
        .unwrap();

        assert_eq!(pool.advance(), 1);
        assert_eq!(pool.advance(), 2);
        assert_eq!(pool.advance(), 0);
        assert_eq!(pool.current().expose(), "a");
    }

    #[test]
    fn test_pool_from_config_prefers_config() {
        let config = serde_json::json!({ "api_keys": ["x", "", "y"] });
        let pool = CredentialPool::from_config_or_env(&config).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.current().source(), CredentialSource::Config);
    }

    #[test]
    fn test_pool_debug_hides_keys() {
        let pool = CredentialPool::single("AIza-secret").unwrap();
        let debug = format!("{:?}", pool);
        assert!(!debug.contains("AIza-secret"));
        assert!(debug.contains("credentials: 1"));
    }

    #[test]
    fn test_concurrent_advance_stays_in_range() {
        let pool = std::sync::Arc::new(
            CredentialPool::new(
                ["a", "b", "c"]
                    .iter()
                    .map(|k| ApiCredential::new(*k, CredentialSource::Programmatic, "k"))
                    .collect(),
            )
            .unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        assert!(pool.advance() < 3);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // 800 advances from 0 lands on 800 % 3
        assert_eq!(pool.current_index(), 800 % 3);
    }
}
