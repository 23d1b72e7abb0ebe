//! Chat-completion backends.
//!
//! The pipeline talks to the model through [`CompletionBackend`]: one system
//! message, one user message, a temperature, and the first choice's text
//! back. Two implementations ship with the crate:
//!
//! * [`ProviderBackend`] wraps any `edgequake_llm` provider, resolved from
//!   the environment the same way for OpenAI, Anthropic, Gemini or Ollama.
//! * [`HttpBackend`] speaks the OpenAI-compatible `/chat/completions` wire
//!   format directly with an API key injected at construction time.
//!
//! Retry and timeout policy do not live here; see [`crate::pipeline::llm`].

use crate::error::AnalyzerError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default base URL of the OpenAI-compatible API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when neither the caller nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// One chat-completion request: a system turn and a user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// The first choice of a completion plus usage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// A chat-completion service.
///
/// Implementations perform exactly one network call per `complete` and map
/// their failures onto [`AnalyzerError::Transport`], [`AnalyzerError::Auth`]
/// or [`AnalyzerError::EmptyReply`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short label used in logs, e.g. `"openai/gpt-4o-mini"`.
    fn label(&self) -> String;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AnalyzerError>;
}

// ── edgequake-llm provider ───────────────────────────────────────────────

/// Backend over an `edgequake_llm` provider.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

impl fmt::Debug for ProviderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBackend")
            .field("label", &self.label)
            .field("provider", &"<dyn LLMProvider>")
            .finish()
    }
}

#[async_trait]
impl CompletionBackend for ProviderBackend {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AnalyzerError> {
        let messages = vec![
            ChatMessage::system(request.system.as_str()),
            ChatMessage::user(request.user.as_str()),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_provider_error(&e.to_string()))?;

        if response.content.trim().is_empty() {
            return Err(AnalyzerError::EmptyReply);
        }

        Ok(Completion {
            content: response.content,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }
}

/// A 401/403 written as a status, e.g. `status: 401`, `HTTP 403`,
/// `status code 401`. Bare digits elsewhere in a message do not count.
static RE_AUTH_STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:status(?:\s+code)?|http(?:/[\d.]+)?)\s*[:=]?\s*(?:401|403)\b").unwrap()
});

const AUTH_PHRASES: &[&str] = &[
    "unauthorized",
    "forbidden",
    "invalid api key",
    "incorrect api key",
    "invalid_api_key",
    "authentication failed",
    "authentication error",
];

/// Provider errors arrive as opaque values; sort them by their message so
/// that credential problems are not retried.
fn classify_provider_error(message: &str) -> AnalyzerError {
    let lower = message.to_ascii_lowercase();
    let is_auth =
        RE_AUTH_STATUS.is_match(message) || AUTH_PHRASES.iter().any(|p| lower.contains(p));
    if is_auth {
        AnalyzerError::Auth {
            message: message.to_string(),
        }
    } else {
        AnalyzerError::Transport {
            message: message.to_string(),
        }
    }
}

// ── OpenAI-compatible HTTP ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 2],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// OpenAI-compatible `/chat/completions` client with an injected API key.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, AnalyzerError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AnalyzerError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    fn label(&self) -> String {
        format!("{}/{}", self.base_url, self.model)
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AnalyzerError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalyzerError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| AnalyzerError::Transport {
            message: format!("undecodable completion response: {e}"),
        })?;
        debug!(choices = parsed.choices.len(), "Completion response received");

        into_completion(parsed)
    }
}

/// The first non-blank choice of `parsed`, with usage counters.
fn into_completion(parsed: ChatResponse) -> Result<Completion, AnalyzerError> {
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(AnalyzerError::EmptyReply)?;
    let usage = parsed.usage.unwrap_or(Usage {
        prompt_tokens: 0,
        completion_tokens: 0,
    });

    Ok(Completion {
        content,
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
    })
}

fn status_error(status: StatusCode, body: &str) -> AnalyzerError {
    let message = format!("HTTP {status}: {}", crate::pipeline::payload::truncate(body, 300));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AnalyzerError::Auth { message },
        _ => AnalyzerError::Transport { message },
    }
}
