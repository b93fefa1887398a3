//! Error types for the plant-report library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PlantReportError`]: **Fatal**: the request cannot proceed at all
//!   (no upload, wrong media type, the vision model failed, the PDF could not
//!   be written). Returned as `Err(PlantReportError)` and mapped to a non-2xx
//!   HTTP status at the request boundary.
//!
//! * [`ImageEmbedError`]: **Non-fatal**: the image attached to a report
//!   request could not be decoded. The report is still produced without its
//!   image page; the error is logged and kept in
//!   [`crate::pipeline::compose::LayoutPlan::warnings`].

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of every failure the pipeline can produce.
///
/// Public messages are chosen from the kind, never from the variant's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingFile,
    UnsupportedMedia,
    PayloadTooLarge,
    UpstreamFailure,
    ImageEmbedFailure,
    RenderFailure,
    Internal,
}

/// All fatal errors returned by the plant-report library.
#[derive(Debug, Error)]
pub enum PlantReportError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// The request carried no image payload (or an empty one).
    #[error("No image file uploaded")]
    MissingFile,

    /// The declared content type is not `image/*`.
    #[error("Unsupported media type '{mime_type}': only image uploads are accepted")]
    UnsupportedMedia { mime_type: String },

    /// The upload is larger than `ServiceConfig::max_upload_bytes`.
    #[error("Upload of {size} bytes exceeds the {limit}-byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// The upload could not be staged to, or read back from, temporary storage.
    #[error("Failed to stage uploaded image: {source}")]
    Staging {
        #[source]
        source: std::io::Error,
    },

    // ── Analysis errors ───────────────────────────────────────────────────
    /// The vision model returned an error or an unusable response.
    #[error("Image analysis failed: {reason}")]
    UpstreamFailure { reason: String },

    /// The vision model did not answer within `api_timeout_secs`.
    #[error("Image analysis timed out after {secs}s")]
    UpstreamTimeout { secs: u64 },

    /// No vision provider could be built (missing API key etc.).
    #[error("Analysis provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Report errors ─────────────────────────────────────────────────────
    /// Serialising the laid-out pages to PDF failed.
    #[error("Report rendering failed: {detail}")]
    RenderFailure { detail: String },

    /// Could not create or write the output PDF file.
    #[error("Failed to write report file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlantReportError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlantReportError::MissingFile => ErrorKind::MissingFile,
            PlantReportError::UnsupportedMedia { .. } => ErrorKind::UnsupportedMedia,
            PlantReportError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            PlantReportError::UpstreamFailure { .. }
            | PlantReportError::UpstreamTimeout { .. }
            | PlantReportError::ProviderNotConfigured { .. } => ErrorKind::UpstreamFailure,
            PlantReportError::RenderFailure { .. }
            | PlantReportError::OutputWriteFailed { .. } => ErrorKind::RenderFailure,
            PlantReportError::Staging { .. }
            | PlantReportError::InvalidConfig(_)
            | PlantReportError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message that is safe to show to a remote caller.
    ///
    /// Upload errors echo their own text; everything else collapses to a
    /// generic sentence so provider replies, paths and I/O details stay in
    /// the server log.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::MissingFile | ErrorKind::UnsupportedMedia | ErrorKind::PayloadTooLarge => {
                self.to_string()
            }
            ErrorKind::UpstreamFailure => {
                "An error occurred while analyzing the image".to_string()
            }
            ErrorKind::ImageEmbedFailure | ErrorKind::RenderFailure => {
                "An error occurred while generating the PDF report".to_string()
            }
            ErrorKind::Internal => "An internal error occurred".to_string(),
        }
    }
}

/// A non-fatal failure to embed the report image.
///
/// Stored in the layout plan when the image is dropped; the rest of the
/// report renders normally.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageEmbedError {
    /// The string is a `data:` URI but not a base64 image one.
    #[error("image is not a base64 image data URI: {detail}")]
    InvalidDataUri { detail: String },

    /// The payload is not valid base64.
    #[error("image payload is not valid base64: {detail}")]
    InvalidBase64 { detail: String },

    /// The bytes decoded but are not an image format we can read.
    #[error("image bytes could not be decoded: {detail}")]
    Undecodable { detail: String },
}

impl ImageEmbedError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ImageEmbedFailure
    }
}
