//! Configuration types for invoice analysis.
//!
//! All analysis behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. The API credential is not read from ambient
//! state by the pipeline: it is loaded once into [`Secrets`] at startup and
//! passed to the builder explicitly.

use crate::backend::CompletionBackend;
use crate::error::AnalyzerError;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Environment variable consulted when the secrets file has no API key.
pub const API_KEY_ENV: &str = "INVOICE_ANALYZER_API_KEY";

/// Default location of the secrets file.
pub const DEFAULT_SECRETS_PATH: &str = ".invoice-analyzer/secrets.toml";

/// Configuration for one invoice analysis.
///
/// # Example
/// ```rust
/// use invoice_analyzer::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .model("gpt-4o-mini")
///     .temperature(0.1)
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Model identifier, e.g. "gpt-4o-mini". If None, uses the backend default.
    pub model: Option<String>,

    /// LLM provider name for the provider chain (e.g. "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed backend. Takes precedence over everything else.
    pub backend: Option<Arc<dyn CompletionBackend>>,

    /// API key for the OpenAI-compatible HTTP backend.
    ///
    /// When set, the HTTP backend is used instead of the provider chain.
    pub api_key: Option<String>,

    /// Base URL for the HTTP backend. Default: OpenAI's public API.
    pub base_url: Option<String>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Classification and ledger synthesis should be near-deterministic, so
    /// the default stays low. Repeated calls may still differ.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2048.
    pub max_tokens: usize,

    /// Retries after a transient failure (transport error or timeout). Default: 1.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-attempt timeout for the completion call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom system prompt. If None, uses [`crate::prompts::SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Largest accepted upload in bytes. Default: 20 MiB.
    pub max_upload_bytes: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            backend: None,
            api_key: None,
            base_url: None,
            temperature: 0.1,
            max_tokens: 2048,
            max_retries: 1,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            system_prompt: None,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|b| b.label()))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Apply every credential field present in `secrets`.
    pub fn secrets(mut self, secrets: &Secrets) -> Self {
        if let Some(ref key) = secrets.api_key {
            self.config.api_key = Some(key.clone());
        }
        if let Some(ref url) = secrets.base_url {
            self.config.base_url = Some(url.clone());
        }
        if self.config.model.is_none() {
            self.config.model = secrets.model.clone();
        }
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalyzerError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        if matches!(c.api_key.as_deref(), Some(k) if k.trim().is_empty()) {
            return Err(AnalyzerError::InvalidConfig("API key is empty".into()));
        }
        Ok(self.config)
    }
}

// ── Secrets ──────────────────────────────────────────────────────────────

/// Credentials read once at process start.
///
/// ```toml
/// api_key  = "sk-..."
/// base_url = "https://api.openai.com/v1"   # optional
/// model    = "gpt-4o-mini"                 # optional
/// ```
#[derive(Default, Clone, Deserialize)]
pub struct Secrets {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl Secrets {
    /// Parse a secrets file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalyzerError::InvalidConfig(format!("cannot read '{}': {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            AnalyzerError::InvalidConfig(format!("invalid secrets file '{}': {e}", path.display()))
        })
    }

    /// Load `path` if it exists, then fall back to [`API_KEY_ENV`] for the key.
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        let mut secrets = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        if secrets.api_key.is_none() {
            secrets.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }
        Ok(secrets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let c = AnalysisConfig::default();
        assert_eq!(c.temperature, 0.1);
        assert_eq!(c.max_retries, 1);
        assert_eq!(c.api_timeout_secs, 60);
        assert_eq!(c.max_upload_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn temperature_is_clamped() {
        let c = AnalysisConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = AnalysisConfig::builder().api_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidConfig(_)));
    }

    #[test]
    fn empty_api_key_rejected() {
        assert!(AnalysisConfig::builder().api_key("  ").build().is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let c = AnalysisConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn secrets_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_key = \"sk-test\"\nmodel = \"gpt-4o\"").unwrap();

        let secrets = Secrets::load(file.path()).unwrap();
        assert_eq!(secrets.api_key.as_deref(), Some("sk-test"));
        assert_eq!(secrets.base_url, None);

        let c = AnalysisConfig::builder().secrets(&secrets).build().unwrap();
        assert_eq!(c.api_key.as_deref(), Some("sk-test"));
        assert_eq!(c.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn explicit_model_wins_over_secrets() {
        let secrets = Secrets {
            model: Some("from-secrets".into()),
            ..Default::default()
        };
        let c = AnalysisConfig::builder()
            .model("explicit")
            .secrets(&secrets)
            .build()
            .unwrap();
        assert_eq!(c.model.as_deref(), Some("explicit"));
    }

    #[test]
    fn malformed_secrets_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_key = ").unwrap();
        assert!(matches!(
            Secrets::load(file.path()),
            Err(AnalyzerError::InvalidConfig(_))
        ));
    }
}
