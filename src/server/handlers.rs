//! HTTP request handlers.

use super::{page, session::Session, AppState};
use crate::analyze::AnalysisOutput;
use crate::error::AnalyzerError;
use crate::export::{record_to_xlsx, EXPORT_FILENAME, XLSX_MIME};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

const UPLOAD_FIELD: &str = "file";
const DEFAULT_FILE_NAME: &str = "factura.pdf";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Upload form.
pub async fn index() -> Html<String> {
    Html(page::upload_page(None))
}

/// Analyse an uploaded PDF and open a session for it.
///
/// Document errors re-render the upload form with an inline message. Once
/// text has been extracted a session always exists, even when the model step
/// fails, so the dashboard can offer a reprocess.
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            warn!(error = %rejection, "Analyze request is not a multipart upload");
            return upload_error(AnalyzerError::MissingUpload);
        }
    };
    let limit = state.client.config().max_upload_bytes;
    let upload = match read_upload(&mut multipart, limit).await {
        Ok(upload) => upload,
        Err(e) => return upload_error(e),
    };
    info!(file = %upload.file_name, bytes = upload.bytes.len(), "Upload received");

    let analysis = match state.client.analyze_pdf(upload.bytes).await {
        Ok(analysis) => analysis,
        Err(e) => return upload_error(e),
    };

    let mut session = Session::new(upload.file_name, analysis.text);
    apply_outcome(&mut session, analysis.outcome);
    state.sessions.insert(session.clone()).await;

    Html(page::dashboard_page(&session)).into_response()
}

/// Re-run the model on a session's stored text.
pub async fn reprocess(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, (StatusCode, String)> {
    let Some(session) = state.sessions.get(&id).await else {
        return Err(session_not_found(&id));
    };
    info!(session = %id, "Reprocessing");

    let outcome = state.client.analyze_text(&session.text).await;
    let updated = state
        .sessions
        .update(&id, |s| apply_outcome(s, outcome))
        .await
        .ok_or_else(|| session_not_found(&id))?;

    Ok(Html(page::dashboard_page(&updated)).into_response())
}

/// Download the session's record as a spreadsheet.
pub async fn export_xlsx(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, (StatusCode, String)> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| session_not_found(&id))?;
    let record = session.record.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            "No hay resultado para exportar.".to_string(),
        )
    })?;

    let bytes = record_to_xlsx(&record).map_err(|e| {
        error!(session = %id, "Export failed: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, e.user_message())
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILENAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

// ── Helpers ──────────────────────────────────────────────────────────────

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

async fn read_upload(multipart: &mut Multipart, limit: usize) -> Result<Upload, AnalyzerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        // Browsers send an empty part when no file was chosen.
        if bytes.is_empty() {
            return Err(AnalyzerError::MissingUpload);
        }
        return Ok(Upload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }
    Err(AnalyzerError::MissingUpload)
}

fn multipart_error(e: MultipartError, limit: usize) -> AnalyzerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AnalyzerError::UploadTooLarge {
            size: limit.saturating_add(1),
            limit,
        }
    } else {
        AnalyzerError::DocumentRead {
            detail: e.body_text(),
        }
    }
}

fn upload_error(e: AnalyzerError) -> Response {
    warn!("Upload rejected: {e}");
    let status = match &e {
        AnalyzerError::MissingUpload => StatusCode::BAD_REQUEST,
        AnalyzerError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ if e.is_document_error() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Html(page::upload_page(Some(&e.user_message())))).into_response()
}

/// Store the result of an analysis run on the session.
///
/// A failed run clears the previous record: the dashboard only ever shows
/// the outcome of the latest attempt.
fn apply_outcome(session: &mut Session, outcome: Result<AnalysisOutput, AnalyzerError>) {
    match outcome {
        Ok(output) => {
            session.record = Some(output.record);
            session.stats = Some(output.stats);
            session.message = None;
        }
        Err(e) => {
            error!(session = %session.id, "Analysis failed: {e}");
            session.record = None;
            session.stats = None;
            session.message = Some(e.user_message());
        }
    }
}

fn session_not_found(id: &Uuid) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Session not found: {id}"))
}
