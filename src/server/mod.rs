//! HTTP service: photo upload → analysis, analysis → PDF download.
//!
//! Routes:
//! - `POST /analyze` multipart upload (field `image`) → `{"result", "image"}`
//! - `POST /download` (alias `/generate-report`) JSON `{"result", "image"}` → PDF
//! - `GET /health` → `ok`
//!
//! Failures answer with a non-2xx status and `{"error": "<message>"}`.

mod handlers;
mod routes;

pub use handlers::{status_for, ApiError, ReportRequest, IMAGE_FIELD, REPORT_WARNING_HEADER};
pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::error::PlantReportError;
use crate::pipeline::analyze::{ImageAnalyzer, LlmAnalyzer};

/// Default listening port, overridden by `PORT`.
pub const DEFAULT_PORT: u16 = 5001;

/// Shared, read-only state for all requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub analyzer: Arc<dyn ImageAnalyzer>,
}

impl AppState {
    pub fn new(config: ServiceConfig, analyzer: Arc<dyn ImageAnalyzer>) -> Self {
        Self {
            config: Arc::new(config),
            analyzer,
        }
    }

    /// Build state with the vision provider resolved from `config` and the
    /// environment.
    pub fn from_config(config: ServiceConfig) -> Result<Self, PlantReportError> {
        let analyzer = LlmAnalyzer::from_config(&config)?;
        Ok(Self::new(config, Arc::new(analyzer)))
    }
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), PlantReportError> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| PlantReportError::Internal(format!("bind {addr}: {e}")))?;
    tracing::info!("Server is running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PlantReportError::Internal(format!("server: {e}")))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
