//! Web front end.
//!
//! One axum router serves the upload page, runs the analysis on submit and
//! keeps each upload's extracted text in a [`SessionStore`] so it can be
//! re-analysed or exported later.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET  | `/` | upload form |
//! | POST | `/analyze` | multipart upload (field `file`) |
//! | POST | `/sessions/{id}/reprocess` | re-run the model on stored text |
//! | GET  | `/sessions/{id}/export.xlsx` | spreadsheet download |
//! | GET  | `/health` | liveness check |

mod handlers;
pub mod page;
pub mod session;

pub use handlers::*;
pub use session::{Session, SessionStore};

use crate::analyze::AnalysisClient;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Listener and session-store settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Sessions kept in memory before the oldest is evicted.
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_sessions: 256,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<AnalysisClient>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(client: AnalysisClient, max_sessions: usize) -> Self {
        Self {
            client: Arc::new(client),
            sessions: Arc::new(SessionStore::new(max_sessions)),
        }
    }
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .client
        .config()
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/analyze", post(analyze))
        .route("/sessions/{id}/reprocess", post(reprocess))
        .route("/sessions/{id}/export.xlsx", get(export_xlsx))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> Result<(), std::io::Error> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local: SocketAddr = listener.local_addr()?;
    info!("Listening on http://{local}");

    axum::serve(listener, app).await
}
