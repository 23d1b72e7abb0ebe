//! Web server binary for invoice-analyzer.
//!
//! Maps CLI flags to `AnalysisConfig` and `ServerConfig`, resolves the
//! completion backend once, then serves the upload UI.

use anyhow::{Context, Result};
use clap::Parser;
use invoice_analyzer::config::DEFAULT_SECRETS_PATH;
use invoice_analyzer::server::{serve, AppState, ServerConfig};
use invoice_analyzer::{AnalysisClient, AnalysisConfig, Secrets};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default address (http://127.0.0.1:8080)
  invoice-analyzer

  # Listen on all interfaces with a specific model
  invoice-analyzer --host 0.0.0.0 --port 3000 --model gpt-4o

  # Use a provider detected by edgequake-llm instead of the secrets file
  invoice-analyzer --provider anthropic --model claude-sonnet-4-20250514

SECRETS FILE (.invoice-analyzer/secrets.toml):
  api_key  = "sk-..."
  base_url = "https://api.openai.com/v1"   # optional, any OpenAI-compatible endpoint
  model    = "gpt-4o-mini"                 # optional

ENVIRONMENT VARIABLES:
  INVOICE_ANALYZER_API_KEY  API key when no secrets file is present
  OPENAI_API_KEY            OpenAI API key (provider auto-detection)
  ANTHROPIC_API_KEY         Anthropic API key
  GEMINI_API_KEY            Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER    Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL           Override model ID
  RUST_LOG                  Log filter, e.g. invoice_analyzer=debug,tower_http=debug
"#;

/// Analyse PDF invoices with an LLM and serve the results as a web dashboard.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-analyzer",
    version,
    about = "Analyse PDF invoices with an LLM and serve the results as a web dashboard",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "INVOICE_ANALYZER_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "INVOICE_ANALYZER_PORT", default_value_t = 8080)]
    port: u16,

    /// TOML file holding the API key, base URL and model.
    #[arg(long, env = "INVOICE_ANALYZER_SECRETS", default_value = DEFAULT_SECRETS_PATH)]
    secrets: PathBuf,

    /// LLM model ID. Overrides the model in the secrets file.
    #[arg(long, env = "INVOICE_ANALYZER_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "INVOICE_ANALYZER_PROVIDER")]
    provider: Option<String>,

    /// OpenAI-compatible endpoint. Overrides the secrets file.
    #[arg(long, env = "INVOICE_ANALYZER_BASE_URL")]
    base_url: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "INVOICE_ANALYZER_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "INVOICE_ANALYZER_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "INVOICE_ANALYZER_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Extra attempts after a transient LLM failure.
    #[arg(long, env = "INVOICE_ANALYZER_MAX_RETRIES", default_value_t = 1)]
    max_retries: u32,

    /// LLM call timeout in seconds.
    #[arg(long, env = "INVOICE_ANALYZER_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Largest accepted upload, in MiB.
    #[arg(long, env = "INVOICE_ANALYZER_MAX_UPLOAD_MB", default_value_t = 20,
          value_parser = clap::value_parser!(u64).range(1..=512))]
    max_upload_mb: u64,

    /// Sessions kept in memory before the oldest is evicted.
    #[arg(long, env = "INVOICE_ANALYZER_MAX_SESSIONS", default_value_t = 256)]
    max_sessions: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE_ANALYZER_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let secrets = Secrets::resolve(&cli.secrets)
        .with_context(|| format!("Failed to load secrets from {}", cli.secrets.display()))?;

    let config = build_config(&cli, &secrets)?;
    let client = AnalysisClient::from_config(config).context("Failed to set up the LLM backend")?;

    let server = ServerConfig {
        host: cli.host,
        port: cli.port,
        max_sessions: cli.max_sessions,
    };
    info!(backend = %client.backend_label(), max_sessions = server.max_sessions, "Starting");

    let state = AppState::new(client, server.max_sessions);
    serve(&server.addr(), state)
        .await
        .with_context(|| format!("Server on {} failed", server.addr()))
}

fn build_config(cli: &Cli, secrets: &Secrets) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder();

    // Flags are applied before the secrets so an explicit model wins.
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    builder = builder.secrets(secrets);
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read system prompt from {}", path.display()))?;
        builder = builder.system_prompt(prompt);
    }

    builder
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .max_upload_bytes((cli.max_upload_mb * 1024 * 1024) as usize)
        .build()
        .context("Invalid configuration")
}
