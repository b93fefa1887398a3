//! End-to-end entry points: upload → analysis, and analysis → PDF report.
//!
//! These are the functions the HTTP handlers and the CLI call. Each wires
//! the pipeline stages together and owns the async/blocking boundary:
//! analysis is I/O-bound and stays on the runtime, rendering is CPU-bound
//! and runs on the blocking pool.

use crate::config::ReportStyle;
use crate::error::{ImageEmbedError, PlantReportError};
use crate::pipeline::analyze::{analyze, AnalysisResult, ImageAnalyzer};
use crate::pipeline::compose::ReportComposer;
use crate::pipeline::ingest::UploadedImage;
use crate::pipeline::pdf::PdfBackend;
use crate::pipeline::render::{DocumentInfo, DocumentRenderer};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// A rendered report ready to be sent or saved.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    /// The complete PDF document.
    pub bytes: Vec<u8>,
    /// Suggested download name, `plant_analysis_report_<unix-millis>.pdf`.
    pub filename: String,
    /// Non-fatal problems; non-empty when the image had to be left out.
    pub warnings: Vec<ImageEmbedError>,
}

impl GeneratedReport {
    pub fn image_omitted(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// `plant_analysis_report_<unix-millis>.pdf`
pub fn report_filename(now: DateTime<Utc>) -> String {
    format!("plant_analysis_report_{}.pdf", now.timestamp_millis())
}

/// Encode a staged upload and analyse it.
///
/// The staged temp file is released before the model is called, so it never
/// outlives the request even when the call fails.
pub async fn analyze_upload(
    upload: UploadedImage,
    analyzer: &dyn ImageAnalyzer,
) -> Result<AnalysisResult, PlantReportError> {
    info!(
        "Analyzing {} upload ({} bytes)",
        upload.mime_type(),
        upload.size_bytes()
    );
    let encoded = upload.encode().await?;
    analyze(analyzer, encoded).await
}

/// Compose and render a report for `result_text` and an optional image data URI.
///
/// An image that cannot be embedded is left out and recorded in
/// [`GeneratedReport::warnings`]; the report itself still succeeds.
pub async fn generate_report(
    result_text: &str,
    image_data_uri: Option<&str>,
    style: &ReportStyle,
) -> Result<GeneratedReport, PlantReportError> {
    let start = Instant::now();
    let text = result_text.to_string();
    let image = image_data_uri.map(str::to_string);
    let style = style.clone();

    let (bytes, warnings) = tokio::task::spawn_blocking(move || {
        render_blocking(&text, image.as_deref(), &style)
    })
    .await
    .map_err(|e| PlantReportError::Internal(format!("Render task panicked: {}", e)))??;

    let report = GeneratedReport {
        bytes,
        filename: report_filename(Utc::now()),
        warnings,
    };
    info!(
        "Generated {} ({} bytes) in {}ms",
        report.filename,
        report.bytes.len(),
        start.elapsed().as_millis()
    );
    Ok(report)
}

fn render_blocking(
    text: &str,
    image: Option<&str>,
    style: &ReportStyle,
) -> Result<(Vec<u8>, Vec<ImageEmbedError>), PlantReportError> {
    let plan = ReportComposer::new(style.clone()).compose(text, image);
    debug!(
        "Plan: {} sections, {} planned pages",
        plan.sections.len(),
        plan.pages.len()
    );
    let bytes = DocumentRenderer::new(style.clone()).render(
        &plan,
        &PdfBackend::new(style),
        &DocumentInfo::new(&style.title),
    )?;
    Ok((bytes, plan.warnings))
}

/// Generate a report and write it to `path`.
///
/// The PDF is staged in a uniquely named temp file beside `path` and renamed
/// into place, so a partial PDF never appears at `path` and concurrent
/// writers to the same path do not share a staging file. The temp file is
/// removed on every failure.
pub async fn generate_report_to_file(
    result_text: &str,
    image_data_uri: Option<&str>,
    style: &ReportStyle,
    path: impl AsRef<Path>,
) -> Result<GeneratedReport, PlantReportError> {
    let report = generate_report(result_text, image_data_uri, style).await?;
    let path = path.as_ref();
    let write_err = |e: std::io::Error| PlantReportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
            parent
        }
        None => Path::new("."),
    };

    let staged = tempfile::Builder::new()
        .prefix(".plant-report-")
        .suffix(".pdf.tmp")
        .tempfile_in(parent)
        .map_err(write_err)?;
    let mut sink = staged
        .as_file()
        .try_clone()
        .map(tokio::fs::File::from_std)
        .map_err(write_err)?;
    sink.write_all(&report.bytes).await.map_err(write_err)?;
    sink.sync_all().await.map_err(write_err)?;
    drop(sink);

    // On failure the returned `NamedTempFile` is dropped, deleting it.
    staged.persist(path).map_err(|e| write_err(e.error))?;

    info!("Report written to {}", path.display());
    Ok(report)
}
