//! # invoice-analyzer
//!
//! Upload a PDF invoice, let a chat model classify it and write its Spanish
//! PGC accounting entry, and present the result as a dashboard with a
//! spreadsheet export.
//!
//! The model does all of the document understanding. This crate reads the
//! PDF, builds the prompt, calls the model under a timeout/retry policy,
//! recovers the JSON object from the reply, and renders it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF upload
//!  │
//!  ├─ 1. Extract  page text in page order (lopdf, spawn_blocking)
//!  ├─ 2. Prompt   fixed Spanish template + extracted text
//!  ├─ 3. Model    one chat completion (timeout + bounded retry)
//!  ├─ 4. Payload  first `{` … last `}` → strict JSON object
//!  └─ 5. Present  HTML dashboard, proportion chart, .xlsx download
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_analyzer::{AnalysisClient, AnalysisConfig, Secrets};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let secrets = Secrets::resolve(".invoice-analyzer/secrets.toml")?;
//!     let config = AnalysisConfig::builder().secrets(&secrets).build()?;
//!     let client = AnalysisClient::from_config(config)?;
//!
//!     let bytes = std::fs::read("factura.pdf")?;
//!     let analysis = client.analyze_pdf(bytes).await?;
//!     let output = analysis.outcome?;
//!     println!("{}", output.record.view().service_type_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum web UI and the `invoice-analyzer` binary |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod prompts;
pub mod record;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{AnalysisClient, AnalysisOutput, AnalysisStats, PdfAnalysis};
pub use backend::{Completion, CompletionBackend, CompletionRequest, HttpBackend, ProviderBackend};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, Secrets};
pub use error::AnalyzerError;
pub use export::{record_to_xlsx, EXPORT_FILENAME, XLSX_MIME};
pub use pipeline::payload::{extract_payload, parse_record};
pub use record::{ChartData, InvoiceRecord, InvoiceView, PLACEHOLDER};
