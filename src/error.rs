//! Error types for the invoice-analyzer library.
//!
//! Every failure of the analysis pipeline is an [`AnalyzerError`]. The
//! variants are grouped by the stage that produces them:
//!
//! * **Document**: the upload is missing, too large, not a PDF, or a PDF
//!   whose object tree cannot be read.
//! * **Transport**: the chat-completion backend failed, timed out, rejected
//!   the credential, or could not be configured at all.
//! * **Payload**: the model answered, but no JSON object could be recovered
//!   from its reply.
//!
//! None of these are allowed to escape the web layer: handlers log them and
//! render [`AnalyzerError::user_message`] inline.

use thiserror::Error;

/// All errors returned by the invoice-analyzer library.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    // ── Document errors ──────────────────────────────────────────────────
    /// The multipart request carried no file field.
    #[error("No file was uploaded")]
    MissingUpload,

    /// The upload exceeds the configured size limit.
    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    UploadTooLarge { size: usize, limit: usize },

    /// The buffer does not start with the `%PDF` magic bytes.
    #[error("Upload is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { magic: Vec<u8> },

    /// The PDF header is present but the document cannot be parsed.
    #[error("PDF could not be read: {detail}")]
    DocumentRead { detail: String },

    // ── Transport errors ─────────────────────────────────────────────────
    /// No completion backend could be built (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Network or API failure talking to the completion service.
    #[error("Completion service error: {message}")]
    Transport { message: String },

    /// The service rejected the credential (401/403). Retrying will not help.
    #[error("Authentication error from completion service: {message}")]
    Auth { message: String },

    /// A single completion attempt exceeded the configured timeout.
    #[error("Completion call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered with no choices.
    #[error("Completion service returned no choices")]
    EmptyReply,

    // ── Payload errors ───────────────────────────────────────────────────
    /// The reply contains no `{`…`}` span.
    #[error("No JSON object found in the model reply")]
    PayloadNotFound,

    /// A span was found but is not valid JSON.
    #[error("Model reply is not valid JSON (line {line}, column {column}): {detail}")]
    JsonDecode {
        line: usize,
        column: usize,
        detail: String,
        payload: String,
    },

    // ── Config / export errors ───────────────────────────────────────────
    /// Builder or secrets validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The spreadsheet could not be produced.
    #[error("Spreadsheet export failed: {0}")]
    Export(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalyzerError {
    /// Whether a completion attempt that failed with this error may be retried.
    ///
    /// Only transient transport failures qualify. Authentication errors and
    /// payload errors are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalyzerError::Transport { .. } | AnalyzerError::Timeout { .. }
        )
    }

    /// Whether the error originates from reading the uploaded document.
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            AnalyzerError::MissingUpload
                | AnalyzerError::UploadTooLarge { .. }
                | AnalyzerError::NotAPdf { .. }
                | AnalyzerError::DocumentRead { .. }
        )
    }

    /// Short message shown inline on the dashboard.
    pub fn user_message(&self) -> String {
        match self {
            AnalyzerError::MissingUpload => "Selecciona un archivo PDF para analizar.".to_string(),
            AnalyzerError::UploadTooLarge { limit, .. } => format!(
                "El archivo es demasiado grande (máximo {} MB).",
                limit / (1024 * 1024)
            ),
            AnalyzerError::NotAPdf { .. } | AnalyzerError::DocumentRead { .. } => {
                "No se pudo leer el PDF. Comprueba que el archivo no esté dañado.".to_string()
            }
            AnalyzerError::Timeout { secs } => format!(
                "El servicio de análisis no respondió en {secs} s. Vuelve a procesar la factura."
            ),
            AnalyzerError::PayloadNotFound | AnalyzerError::JsonDecode { .. } => {
                "La respuesta del modelo no contenía un JSON válido. No hay resultado.".to_string()
            }
            AnalyzerError::Export(_) => "No se pudo generar la hoja de cálculo.".to_string(),
            _ => "No se pudo generar el análisis. Vuelve a procesar la factura.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display() {
        let e = AnalyzerError::Timeout { secs: 60 };
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn json_decode_display_carries_position() {
        let e = AnalyzerError::JsonDecode {
            line: 1,
            column: 7,
            detail: "expected value".into(),
            payload: "{\"a\": }".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("line 1"), "got: {msg}");
        assert!(msg.contains("column 7"), "got: {msg}");
    }

    #[test]
    fn only_transient_errors_retry() {
        assert!(AnalyzerError::Transport { message: "503".into() }.is_retryable());
        assert!(AnalyzerError::Timeout { secs: 1 }.is_retryable());
        assert!(!AnalyzerError::Auth { message: "bad key".into() }.is_retryable());
        assert!(!AnalyzerError::PayloadNotFound.is_retryable());
        assert!(!AnalyzerError::EmptyReply.is_retryable());
    }

    #[test]
    fn document_errors_are_grouped() {
        assert!(AnalyzerError::NotAPdf { magic: b"abcd".to_vec() }.is_document_error());
        assert!(AnalyzerError::DocumentRead { detail: "xref".into() }.is_document_error());
        assert!(!AnalyzerError::PayloadNotFound.is_document_error());
    }

    #[test]
    fn upload_limit_message_in_megabytes() {
        let e = AnalyzerError::UploadTooLarge {
            size: 30 * 1024 * 1024,
            limit: 20 * 1024 * 1024,
        };
        assert!(e.user_message().contains("20 MB"));
    }
}
