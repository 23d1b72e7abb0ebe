//! Model interaction: one prompt in, one raw reply out.
//!
//! All prompt wording lives in [`crate::prompts`]; this module owns the
//! latency and failure policy around the network call.
//!
//! ## Timeout and retry
//!
//! Every attempt is bounded by `api_timeout_secs`. Transport errors and
//! timeouts are retried up to `max_retries` times with exponential backoff
//! (`retry_backoff_ms`, doubled for each further retry): with the defaults (1 retry, 500 ms) a
//! stalled service costs at most two timeouts plus half a second. Credential
//! errors and empty replies are returned immediately.

use crate::backend::{Completion, CompletionBackend, CompletionRequest};
use crate::config::AnalysisConfig;
use crate::error::AnalyzerError;
use crate::prompts::SYSTEM_PROMPT;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Result of a successful completion, with attempt bookkeeping.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub completion: Completion,
    pub duration_ms: u64,
    pub retries: u32,
}

/// Build the request for `prompt` from the configuration.
pub fn build_request(prompt: &str, config: &AnalysisConfig) -> CompletionRequest {
    CompletionRequest {
        system: config
            .system_prompt
            .clone()
            .unwrap_or_else(|| SYSTEM_PROMPT.to_string()),
        user: prompt.to_string(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// Send `prompt` to the backend, honouring the timeout and retry policy.
pub async fn request_completion(
    backend: &dyn CompletionBackend,
    prompt: &str,
    config: &AnalysisConfig,
) -> Result<ModelReply, AnalyzerError> {
    let request = build_request(prompt, config);
    let limit = Duration::from_secs(config.api_timeout_secs);
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                attempt,
                max_retries = config.max_retries,
                backoff_ms = backoff,
                "Retrying completion"
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let outcome = match timeout(limit, backend.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(AnalyzerError::Timeout {
                secs: config.api_timeout_secs,
            }),
        };

        match outcome {
            Ok(completion) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                debug!(
                    backend = %backend.label(),
                    prompt_tokens = completion.prompt_tokens,
                    completion_tokens = completion.completion_tokens,
                    duration_ms,
                    retries = attempt,
                    "Completion received"
                );
                return Ok(ModelReply {
                    completion,
                    duration_ms,
                    retries: attempt,
                });
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                warn!(attempt = attempt + 1, error = %e, "Completion attempt failed");
                attempt += 1;
            }
            Err(e) => {
                warn!(attempt = attempt + 1, error = %e, "Completion failed");
                return Err(e);
            }
        }
    }
}
