//! Analysis entry points.
//!
//! [`AnalysisClient`] is built once at process start: it resolves the
//! completion backend from the configuration and is then shared (by `Arc`)
//! with every request. Two entry points cover the two user actions:
//!
//! * [`AnalysisClient::analyze_pdf`]: upload: extract text, then analyse.
//! * [`AnalysisClient::analyze_text`]: reprocess: analyse already-extracted
//!   text without touching the PDF again.

use crate::backend::{
    Completion, CompletionBackend, HttpBackend, ProviderBackend, DEFAULT_BASE_URL, DEFAULT_MODEL,
};
use crate::config::AnalysisConfig;
use crate::error::AnalyzerError;
use crate::pipeline::{extract, llm, payload};
use crate::prompts::build_analysis_prompt;
use crate::record::InvoiceRecord;
use edgequake_llm::ProviderFactory;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Counters for one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub text_chars: usize,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub retries: u32,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A successful analysis.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub record: InvoiceRecord,
    /// The raw model reply the record was recovered from.
    pub reply: String,
    pub stats: AnalysisStats,
}

/// Result of an upload: the extracted text survives even when the model
/// step fails, so the caller can offer a reprocess.
#[derive(Debug)]
pub struct PdfAnalysis {
    pub text: String,
    pub outcome: Result<AnalysisOutput, AnalyzerError>,
}

/// Configuration-bound analysis service.
pub struct AnalysisClient {
    backend: Arc<dyn CompletionBackend>,
    config: AnalysisConfig,
}

impl fmt::Debug for AnalysisClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisClient")
            .field("backend", &self.backend.label())
            .field("config", &self.config)
            .finish()
    }
}

impl AnalysisClient {
    /// Resolve the backend described by `config`.
    pub fn from_config(config: AnalysisConfig) -> Result<Self, AnalyzerError> {
        let backend = resolve_backend(&config)?;
        info!(backend = %backend.label(), "Completion backend ready");
        Ok(Self { backend, config })
    }

    /// Use an already-constructed backend.
    pub fn with_backend(backend: Arc<dyn CompletionBackend>, config: AnalysisConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn backend_label(&self) -> String {
        self.backend.label()
    }

    /// Extract the text of `bytes` and analyse it.
    ///
    /// Document errors are returned as `Err`; model-side errors are kept in
    /// [`PdfAnalysis::outcome`] next to the text that was extracted.
    pub async fn analyze_pdf(&self, bytes: Vec<u8>) -> Result<PdfAnalysis, AnalyzerError> {
        if bytes.len() > self.config.max_upload_bytes {
            return Err(AnalyzerError::UploadTooLarge {
                size: bytes.len(),
                limit: self.config.max_upload_bytes,
            });
        }
        let text = extract::extract_text(bytes).await?;
        if text.trim().is_empty() {
            warn!("PDF yielded no text; the model will see an empty invoice");
        }
        let outcome = self.analyze_text(&text).await;
        Ok(PdfAnalysis { text, outcome })
    }

    /// Send an already-built prompt under the timeout and retry policy and
    /// return the first choice.
    pub async fn complete(&self, prompt: &str) -> Result<Completion, AnalyzerError> {
        llm::request_completion(self.backend.as_ref(), prompt, &self.config)
            .await
            .map(|reply| reply.completion)
    }

    /// Build the prompt for `text`, call the model and recover the record.
    pub async fn analyze_text(&self, text: &str) -> Result<AnalysisOutput, AnalyzerError> {
        let start = Instant::now();
        let prompt = build_analysis_prompt(text);

        let reply = llm::request_completion(self.backend.as_ref(), &prompt, &self.config).await?;
        let record = payload::parse_record(&reply.completion.content)?;

        let stats = AnalysisStats {
            text_chars: text.chars().count(),
            prompt_tokens: reply.completion.prompt_tokens,
            completion_tokens: reply.completion.completion_tokens,
            retries: reply.retries,
            llm_duration_ms: reply.duration_ms,
            total_duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            fields = record.len(),
            retries = stats.retries,
            duration_ms = stats.total_duration_ms,
            "Invoice analysed"
        );

        Ok(AnalysisOutput {
            record,
            reply: reply.completion.content,
            stats,
        })
    }
}

// ── Backend resolution ───────────────────────────────────────────────────

/// Resolve the completion backend, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`): used as-is; this is how
///    tests and embedding applications inject their own.
/// 2. **Explicit credential** (`config.api_key`, usually from the secrets
///    file): an [`HttpBackend`] against `config.base_url` or OpenAI.
/// 3. **Named provider** (`config.provider_name`): built by
///    `ProviderFactory`, which reads that provider's API key variable.
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **`OPENAI_API_KEY`**: OpenAI with the configured or default model.
/// 6. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_backend(config: &AnalysisConfig) -> Result<Arc<dyn CompletionBackend>, AnalyzerError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref key) = config.api_key {
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        return Ok(Arc::new(HttpBackend::new(base_url, key.as_str(), model)?));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider_backend(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider_backend(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider_backend("openai", model);
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalyzerError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Put api_key in the secrets file, set INVOICE_ANALYZER_API_KEY or OPENAI_API_KEY.\n\
                Error: {e}"
            ),
        })?;

    Ok(Arc::new(ProviderBackend::new(provider, "auto")))
}

fn create_provider_backend(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn CompletionBackend>, AnalyzerError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalyzerError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(ProviderBackend::new(
        provider,
        format!("{provider_name}/{model}"),
    )))
}
