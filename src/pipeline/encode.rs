//! Image encoding: staged bytes → base64, and data URIs back to pixels.
//!
//! Vision APIs take images as base64 in the JSON request body, and the
//! browser gets the same base64 back as a `data:` URI so it can send the
//! image again with the report request without a second upload. This module
//! owns both directions so the two formats can never drift apart.

use crate::error::ImageEmbedError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static DATA_URI_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:(image/[A-Za-z0-9.+-]+);base64,").expect("valid data URI regex")
});

/// A base64-encoded image and its declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Standard (padded) base64 of the original bytes.
    pub data: String,
    pub mime_type: String,
}

impl EncodedImage {
    /// `data:<mime>;base64,<data>`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Wrap as an inline image attachment for the vision provider.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.data.clone(), self.mime_type.clone())
    }
}

/// The parts of an image data URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    /// Media type from the URI header; `None` when the input was bare base64.
    pub mime_type: Option<&'a str>,
    /// The base64 payload.
    pub data: &'a str,
}

/// Split an image data URI into media type and payload.
///
/// Bare base64 (no `data:` header) is accepted as-is; a `data:` URI that is
/// not a base64 image is rejected.
pub fn parse_data_uri(input: &str) -> Result<DataUri<'_>, ImageEmbedError> {
    let input = input.trim();
    if let Some(caps) = DATA_URI_PREFIX.captures(input) {
        let header = caps.get(0).map(|m| m.end()).unwrap_or(0);
        return Ok(DataUri {
            mime_type: caps.get(1).map(|m| m.as_str()),
            data: &input[header..],
        });
    }

    if input.starts_with("data:") {
        let header: String = input.chars().take_while(|&c| c != ',').take(64).collect();
        return Err(ImageEmbedError::InvalidDataUri { detail: header });
    }

    Ok(DataUri {
        mime_type: None,
        data: input,
    })
}

/// Decode a base64 payload, ignoring embedded whitespace and line breaks.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, ImageEmbedError> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ImageEmbedError::InvalidBase64 {
            detail: e.to_string(),
        })
}

/// Decode an image data URI (or bare base64) all the way to pixels.
pub fn decode_data_uri(input: &str) -> Result<DynamicImage, ImageEmbedError> {
    let uri = parse_data_uri(input)?;
    let bytes = decode_base64(uri.data)?;

    if let (Some(declared), Ok(actual)) = (
        uri.mime_type.and_then(ImageFormat::from_mime_type),
        image::guess_format(&bytes),
    ) {
        if declared != actual {
            debug!(
                "Data URI declares {:?} but content looks like {:?}; decoding by content",
                declared, actual
            );
        }
    }

    let img = image::load_from_memory(&bytes).map_err(|e| ImageEmbedError::Undecodable {
        detail: e.to_string(),
    })?;
    debug!(
        "Decoded {} byte image → {}x{} px",
        bytes.len(),
        img.width(),
        img.height()
    );
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_base64(w: u32, h: u32) -> String {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 128, 0, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        STANDARD.encode(&buf)
    }

    #[test]
    fn data_uri_format() {
        let encoded = EncodedImage {
            data: "AAAA".into(),
            mime_type: "image/jpeg".into(),
        };
        assert_eq!(encoded.to_data_uri(), "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn image_data_carries_mime() {
        let encoded = EncodedImage {
            data: "AAAA".into(),
            mime_type: "image/png".into(),
        };
        let data = encoded.to_image_data();
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(data.data, "AAAA");
    }

    #[test]
    fn parse_image_data_uri() {
        let uri = parse_data_uri("data:image/svg+xml;base64,PHN2Zz4=").unwrap();
        assert_eq!(uri.mime_type, Some("image/svg+xml"));
        assert_eq!(uri.data, "PHN2Zz4=");
    }

    #[test]
    fn parse_bare_base64() {
        let uri = parse_data_uri("iVBORw0KGgo=").unwrap();
        assert_eq!(uri.mime_type, None);
        assert_eq!(uri.data, "iVBORw0KGgo=");
    }

    #[test]
    fn reject_non_image_data_uri() {
        let err = parse_data_uri("data:text/plain;base64,aGVsbG8=").unwrap_err();
        assert!(matches!(err, ImageEmbedError::InvalidDataUri { .. }));
    }

    #[test]
    fn reject_bad_base64() {
        let err = decode_data_uri("data:image/png;base64,@@not-base64@@").unwrap_err();
        assert!(matches!(err, ImageEmbedError::InvalidBase64 { .. }));
    }

    #[test]
    fn reject_undecodable_bytes() {
        let payload = STANDARD.encode(b"definitely not an image");
        let err = decode_data_uri(&format!("data:image/png;base64,{payload}")).unwrap_err();
        assert!(matches!(err, ImageEmbedError::Undecodable { .. }));
    }

    #[test]
    fn decode_png_data_uri() {
        let uri = format!("data:image/png;base64,{}", png_base64(12, 7));
        let img = decode_data_uri(&uri).expect("decodes");
        assert_eq!((img.width(), img.height()), (12, 7));
    }

    #[test]
    fn decode_tolerates_line_breaks() {
        let b64 = png_base64(3, 3);
        let (a, b) = b64.split_at(b64.len() / 2);
        let wrapped = format!("data:image/png;base64,{a}\r\n{b}");
        assert!(decode_data_uri(&wrapped).is_ok());
    }
}
