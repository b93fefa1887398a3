//! HTTP handlers and the error-to-response mapping.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Multipart, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{debug, error, warn};

use super::AppState;
use crate::error::PlantReportError;
use crate::generate::{analyze_upload, generate_report};
use crate::pipeline::analyze::AnalysisResult;
use crate::pipeline::ingest::ingest;

/// Multipart field carrying the photo.
pub const IMAGE_FIELD: &str = "image";

/// Set on report responses whose image could not be embedded.
pub const REPORT_WARNING_HEADER: &str = "x-report-warning";

/// A failed request: status plus a caller-safe message, sent as `{"error"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// HTTP status for a pipeline error.
pub fn status_for(err: &PlantReportError) -> StatusCode {
    match err {
        PlantReportError::MissingFile => StatusCode::BAD_REQUEST,
        PlantReportError::UnsupportedMedia { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        PlantReportError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        PlantReportError::UpstreamFailure { .. } => StatusCode::BAD_GATEWAY,
        PlantReportError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        PlantReportError::ProviderNotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
        PlantReportError::RenderFailure { .. }
        | PlantReportError::OutputWriteFailed { .. }
        | PlantReportError::Staging { .. }
        | PlantReportError::InvalidConfig(_)
        | PlantReportError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PlantReportError> for ApiError {
    fn from(err: PlantReportError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, err);
        } else {
            warn!("Request rejected ({}): {}", status, err);
        }
        Self {
            status,
            message: err.public_message(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        warn!("Malformed multipart body: {}", err);
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        warn!("Rejected multipart request: {}", rejection);
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected report request: {}", rejection);
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// `POST /analyze`: multipart upload, field `image`.
pub async fn analyze_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let mut multipart = multipart?;
    let limits = state.config.upload_limits();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        debug!(
            "Receiving upload {:?} ({})",
            field.file_name().unwrap_or("<unnamed>"),
            mime_type
        );

        let upload = ingest(Some(field), &mime_type, None, &limits).await?;
        let result = analyze_upload(upload, state.analyzer.as_ref()).await?;
        return Ok(Json(result));
    }

    Err(PlantReportError::MissingFile.into())
}

/// Body of `POST /download` and `POST /generate-report`.
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub result: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// `POST /download`: render the analysis (and image) as a PDF attachment.
pub async fn download_report(
    State(state): State<AppState>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let report = generate_report(
        &request.result,
        request.image.as_deref(),
        &state.config.report,
    )
    .await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    let disposition = format!("attachment; filename=\"{}\"", report.filename);
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .map_err(|e| PlantReportError::Internal(format!("content-disposition: {e}")))?,
    );
    if report.image_omitted() {
        headers.insert(
            REPORT_WARNING_HEADER,
            HeaderValue::from_static("image-omitted"),
        );
    }

    Ok((StatusCode::OK, headers, report.bytes).into_response())
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(status_for(&PlantReportError::MissingFile), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&PlantReportError::UnsupportedMedia {
                mime_type: "text/plain".into()
            }),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            status_for(&PlantReportError::PayloadTooLarge { size: 2, limit: 1 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_for(&PlantReportError::UpstreamFailure {
                reason: "x".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&PlantReportError::UpstreamTimeout { secs: 60 }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&PlantReportError::RenderFailure {
                detail: "x".into()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn api_error_hides_detail() {
        let err: ApiError = PlantReportError::UpstreamFailure {
            reason: "API key sk-123 rejected".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert!(!err.message.contains("sk-123"));
    }
}
