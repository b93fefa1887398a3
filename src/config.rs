//! Configuration types for plant analysis and report generation.
//!
//! Everything the service can be tuned with lives in [`ServiceConfig`],
//! built via its [`ServiceConfigBuilder`]. The configuration is read-only
//! after startup and shared between requests behind an `Arc`, so it holds
//! no per-request state.
//!
//! Report typography and page setup are grouped separately in
//! [`ReportStyle`] because they are all a report-generation request needs;
//! the composer and renderer never see provider credentials.

use crate::error::PlantReportError;
use chrono::format::{Item, StrftimeItems};
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default vision model when the Gemini key is picked up from the environment.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Report date format, `M/D/YYYY` without zero padding.
pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";

/// Configuration for the analysis service.
///
/// Built via [`ServiceConfig::builder()`] or using
/// [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use plant_report::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .provider_name("gemini")
///     .model("gemini-1.5-flash")
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// LLM model identifier, e.g. "gemini-1.5-flash", "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the analysis. Default: 0.4.
    pub temperature: f32,

    /// Maximum tokens the model may generate for one analysis. Default: 2048.
    pub max_tokens: usize,

    /// Timeout for one analysis call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Largest accepted image upload in bytes. Default: 20 MiB.
    pub max_upload_bytes: u64,

    /// Largest accepted JSON body for report generation. Default: 50 MiB.
    ///
    /// Report requests carry the image back as a base64 data URI, which is
    /// a third larger than the upload itself.
    pub max_json_bytes: u64,

    /// Directory uploads are staged in. If None, the system temp directory.
    pub upload_dir: Option<PathBuf>,

    /// Report typography and page setup.
    pub report: ReportStyle,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.4,
            max_tokens: 2048,
            api_timeout_secs: 60,
            max_upload_bytes: 20 * 1024 * 1024,
            max_json_bytes: 50 * 1024 * 1024,
            upload_dir: None,
            report: ReportStyle::default(),
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_json_bytes", &self.max_json_bytes)
            .field("upload_dir", &self.upload_dir)
            .field("report", &self.report)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Upload limits derived from this configuration.
    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_bytes: self.max_upload_bytes,
            staging_dir: self.upload_dir.clone(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn max_json_bytes(mut self, bytes: u64) -> Self {
        self.config.max_json_bytes = bytes;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = Some(dir.into());
        self
    }

    pub fn report(mut self, style: ReportStyle) -> Self {
        self.config.report = style;
        self
    }

    pub fn footer(mut self, footer: FooterStyle) -> Self {
        self.config.report.footer = footer;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, PlantReportError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(PlantReportError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(PlantReportError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(PlantReportError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        c.report.validate()?;
        Ok(self.config)
    }
}

/// Limits applied while an upload is staged.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_bytes: u64,
    pub staging_dir: Option<PathBuf>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        ServiceConfig::default().upload_limits()
    }
}

// ── Report style ─────────────────────────────────────────────────────────

/// Typography, wording and page setup of the generated PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStyle {
    /// Heading at the top of the first page.
    pub title: String,
    /// Underlined heading above the analysis sections.
    pub results_heading: String,
    /// Centred heading of the image page.
    pub image_heading: String,
    /// `chrono` format string for the `Date:` line. Default: `%-m/%-d/%Y`.
    pub date_format: String,
    /// Box the image is fitted into, in points (width, height).
    pub image_box: (f32, f32),
    /// Background gradient colour at the top of each page.
    pub gradient_top: Rgb,
    /// Background gradient colour at the bottom of each page.
    pub gradient_bottom: Rgb,
    /// Footer wording.
    pub footer: FooterStyle,
    /// Page size and margins.
    pub page: PageGeometry,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self {
            title: "Plant Analysis Report".to_string(),
            results_heading: "Analysis Result".to_string(),
            image_heading: "Analyzed Plant Image".to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            image_box: (400.0, 400.0),
            gradient_top: Rgb::from_hex(0xa8e063),
            gradient_bottom: Rgb::from_hex(0x56ab2f),
            footer: FooterStyle::default(),
            page: PageGeometry::a4(),
        }
    }
}

impl ReportStyle {
    fn validate(&self) -> Result<(), PlantReportError> {
        let (w, h) = self.image_box;
        if w <= 0.0 || h <= 0.0 {
            return Err(PlantReportError::InvalidConfig(format!(
                "Image box must be positive, got {w}×{h}"
            )));
        }
        if self.page.content_width() <= 0.0 || self.page.content_bottom() <= self.page.margin_top {
            return Err(PlantReportError::InvalidConfig(
                "Page margins leave no printable area".into(),
            ));
        }
        if !is_valid_date_format(&self.date_format) {
            return Err(PlantReportError::InvalidConfig(format!(
                "Invalid date format {:?}",
                self.date_format
            )));
        }
        Ok(())
    }
}

/// True when every strftime item in `format` is recognised by chrono.
pub fn is_valid_date_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

// ── Enums & small value types ────────────────────────────────────────────

/// How the page footer is worded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FooterStyle {
    /// "Page 3". (default)
    #[default]
    PageNumber,
    /// "Page 3 of 5".
    PageOfTotal,
}

impl FooterStyle {
    /// Render the footer text for a 1-indexed page of `total`.
    pub fn render(&self, page_num: usize, total: usize) -> String {
        match self {
            FooterStyle::PageNumber => format!("Page {}", page_num),
            FooterStyle::PageOfTotal => format!("Page {} of {}", page_num, total),
        }
    }
}

/// An sRGB colour with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// `0xa8e063` → `Rgb(0xa8, 0xe0, 0x63)`.
    pub const fn from_hex(hex: u32) -> Self {
        Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    /// Channels scaled to 0.0–1.0, the form PDF colour operators take.
    pub fn unit(&self) -> [f32; 3] {
        [
            self.0 as f32 / 255.0,
            self.1 as f32 / 255.0,
            self.2 as f32 / 255.0,
        ]
    }
}

/// Page size and margins in PDF points (1/72 inch), origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
}

impl PageGeometry {
    /// A4 portrait with one-inch margins.
    pub fn a4() -> Self {
        Self {
            width: 595.28,
            height: 841.89,
            margin_top: 72.0,
            margin_right: 72.0,
            margin_bottom: 72.0,
            margin_left: 72.0,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    /// Lowest y (from the top) content may reach before overflowing.
    pub fn content_bottom(&self) -> f32 {
        self.height - self.margin_bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = ServiceConfig::builder().build().expect("defaults are valid");
        assert_eq!(config.api_timeout_secs, 60);
        assert_eq!(config.report.image_box, (400.0, 400.0));
        assert_eq!(config.report.footer, FooterStyle::PageNumber);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = ServiceConfig::builder().api_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, PlantReportError::InvalidConfig(_)));
    }

    #[test]
    fn temperature_is_clamped() {
        let config = ServiceConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn degenerate_margins_rejected() {
        let mut style = ReportStyle::default();
        style.page.margin_left = 400.0;
        style.page.margin_right = 400.0;
        let err = ServiceConfig::builder().report(style).build().unwrap_err();
        assert!(err.to_string().contains("printable"));
    }

    #[test]
    fn unknown_date_specifier_rejected() {
        let style = ReportStyle {
            date_format: "%Q".to_string(),
            ..ReportStyle::default()
        };
        let err = ServiceConfig::builder().report(style).build().unwrap_err();
        assert!(matches!(err, PlantReportError::InvalidConfig(_)));
        assert!(err.to_string().contains("%Q"), "got: {err}");
    }

    #[test]
    fn date_format_check() {
        assert!(is_valid_date_format(DEFAULT_DATE_FORMAT));
        assert!(is_valid_date_format("%Y-%m-%d"));
        assert!(!is_valid_date_format("%Q"));
    }

    #[test]
    fn footer_wording() {
        assert_eq!(FooterStyle::PageNumber.render(2, 5), "Page 2");
        assert_eq!(FooterStyle::PageOfTotal.render(2, 5), "Page 2 of 5");
    }

    #[test]
    fn rgb_from_hex() {
        assert_eq!(Rgb::from_hex(0x56ab2f), Rgb(0x56, 0xab, 0x2f));
        assert_eq!(Rgb::BLACK.unit(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn a4_printable_area() {
        let page = PageGeometry::a4();
        assert!((page.content_width() - 451.28).abs() < 0.01);
        assert!((page.content_bottom() - 769.89).abs() < 0.01);
    }
}
