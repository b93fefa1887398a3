//! Upload ingestion: validate an uploaded image and stage it to disk.
//!
//! ## Why stage to a temp file?
//!
//! Uploads arrive as a chunked multipart stream and may be several megabytes.
//! Writing them to a [`NamedTempFile`] keeps request memory flat while the
//! body is still arriving, and ties the file's lifetime to the
//! [`UploadedImage`] value: the file is deleted when the value is dropped,
//! whether the request succeeds, fails, or panics. [`UploadedImage::encode`]
//! consumes the value, so the temp file cannot be used after encoding.
//!
//! The media type is validated from the declared `Content-Type` before a
//! single byte is written, so rejected uploads never touch the disk.

use crate::config::UploadLimits;
use crate::error::PlantReportError;
use crate::pipeline::encode::EncodedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::fmt::Display;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// An uploaded image staged to a scoped temporary file.
#[derive(Debug)]
pub struct UploadedImage {
    file: NamedTempFile,
    mime_type: String,
    size_bytes: u64,
}

impl UploadedImage {
    /// Location of the staged bytes. Only valid while `self` is alive.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Read the staged content once and base64-encode it.
    ///
    /// The temporary file is released on every path out of this function:
    /// it is closed explicitly after the read, and dropped (which deletes it)
    /// if anything before that fails.
    pub async fn encode(self) -> Result<EncodedImage, PlantReportError> {
        let UploadedImage {
            file,
            mime_type,
            size_bytes,
        } = self;

        let read = tokio::fs::read(file.path()).await;

        let path = file.path().to_path_buf();
        if let Err(e) = file.close() {
            warn!("Failed to remove staged upload {}: {}", path.display(), e);
        }

        let bytes = read.map_err(|source| PlantReportError::Staging { source })?;
        if bytes.len() as u64 != size_bytes {
            warn!(
                "Staged upload changed size: expected {} bytes, read {}",
                size_bytes,
                bytes.len()
            );
        }

        let data = STANDARD.encode(&bytes);
        debug!("Encoded {} byte upload → {} bytes base64", bytes.len(), data.len());

        Ok(EncodedImage { data, mime_type })
    }
}

/// Returns true if `mime_type` declares an image (`image/*`).
pub fn is_image_mime(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence
        .strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty())
}

/// Validate and stage an uploaded image.
///
/// # Arguments
/// * `stream`: the upload body chunks, or `None` when the request carried no file
/// * `mime_type`: the declared content type of the upload
/// * `size_bytes`: the declared size, if the transport provides one
/// * `limits`: size ceiling and staging directory
///
/// # Errors
/// - [`PlantReportError::MissingFile`]: no stream, or zero bytes received
/// - [`PlantReportError::UnsupportedMedia`]: `mime_type` is not `image/*`
/// - [`PlantReportError::PayloadTooLarge`]: declared or received size over the limit
/// - [`PlantReportError::Staging`]: the temp file could not be written, or the
///   body stream failed mid-upload
pub async fn ingest<S, E>(
    stream: Option<S>,
    mime_type: &str,
    size_bytes: Option<u64>,
    limits: &UploadLimits,
) -> Result<UploadedImage, PlantReportError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let Some(stream) = stream else {
        return Err(PlantReportError::MissingFile);
    };

    if !is_image_mime(mime_type) {
        return Err(PlantReportError::UnsupportedMedia {
            mime_type: mime_type.to_string(),
        });
    }

    if let Some(size) = size_bytes {
        if size > limits.max_bytes {
            return Err(PlantReportError::PayloadTooLarge {
                size,
                limit: limits.max_bytes,
            });
        }
    }

    let file = create_staging_file(limits)?;
    let mut sink = file
        .as_file()
        .try_clone()
        .map(tokio::fs::File::from_std)
        .map_err(|source| PlantReportError::Staging { source })?;
    let mut written: u64 = 0;
    let mut stream = std::pin::pin!(stream);

    // `file` is dropped (and deleted) on every early return below.
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PlantReportError::Staging {
            source: std::io::Error::other(format!("upload stream failed: {e}")),
        })?;

        written += chunk.len() as u64;
        if written > limits.max_bytes {
            return Err(PlantReportError::PayloadTooLarge {
                size: written,
                limit: limits.max_bytes,
            });
        }

        sink.write_all(&chunk)
            .await
            .map_err(|source| PlantReportError::Staging { source })?;
    }

    if written == 0 {
        return Err(PlantReportError::MissingFile);
    }

    sink.flush()
        .await
        .map_err(|source| PlantReportError::Staging { source })?;
    drop(sink);

    debug!(
        "Staged {} byte {} upload at {}",
        written,
        mime_type,
        file.path().display()
    );

    Ok(UploadedImage {
        file,
        mime_type: mime_type.to_string(),
        size_bytes: written,
    })
}

/// Stage an in-memory image (CLI and tests).
pub async fn ingest_bytes(
    bytes: impl Into<Bytes>,
    mime_type: &str,
    limits: &UploadLimits,
) -> Result<UploadedImage, PlantReportError> {
    let bytes = bytes.into();
    let size = bytes.len() as u64;
    let stream = futures::stream::once(async move { Ok::<_, std::convert::Infallible>(bytes) });
    ingest(Some(stream), mime_type, Some(size), limits).await
}

fn create_staging_file(limits: &UploadLimits) -> Result<NamedTempFile, PlantReportError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("plant-upload-");
    let file = match limits.staging_dir {
        Some(ref dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    };
    file.map_err(|source| PlantReportError::Staging { source })
}
