//! Router configuration for the HTTP service.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Headroom on top of the image limit for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes as usize + MULTIPART_OVERHEAD;
    let json_limit = state.config.max_json_bytes as usize;

    Router::new()
        .route(
            "/analyze",
            post(handlers::analyze_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // /generate-report is the older name of /download
        .route(
            "/download",
            post(handlers::download_report).layer(DefaultBodyLimit::max(json_limit)),
        )
        .route(
            "/generate-report",
            post(handlers::download_report).layer(DefaultBodyLimit::max(json_limit)),
        )
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
