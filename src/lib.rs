//! # plant-report
//!
//! Identify a plant from a photo with a Vision Language Model and turn the
//! answer into a printable PDF report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo
//!  │
//!  ├─ 1. Ingest   validate the upload, stage it in a scoped temp file
//!  ├─ 2. Encode   bytes → base64 (and back to a data URI for the browser)
//!  ├─ 3. Analyze  one call to gemini / openai / claude / … with a fixed prompt
//!  │
//!  │   analysis text (+ data URI)
//!  │
//!  ├─ 4. Compose  split into titled sections, plan the pages
//!  ├─ 5. Layout   wrap, justify, overflow onto extra pages
//!  ├─ 6. Render   number pages, stamp footers (spawn_blocking)
//!  └─ 7. PDF      serialise with lopdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plant_report::{analyze_upload, generate_report, ingest_bytes, LlmAnalyzer, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = ServiceConfig::default();
//!     let analyzer = LlmAnalyzer::from_config(&config)?;
//!
//!     let bytes = std::fs::read("leaf.jpg")?;
//!     let upload = ingest_bytes(bytes, "image/jpeg", &config.upload_limits()).await?;
//!     let analysis = analyze_upload(upload, &analyzer).await?;
//!
//!     let report = generate_report(&analysis.text, Some(&analysis.image_data_uri), &config.report).await?;
//!     std::fs::write(&report.filename, &report.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | The axum HTTP service ([`server`]) |
//! | `cli`    | on      | The `plant-report` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable both when using only the library:
//! ```toml
//! plant-report = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    FooterStyle, PageGeometry, ReportStyle, Rgb, ServiceConfig, ServiceConfigBuilder,
    UploadLimits, DEFAULT_DATE_FORMAT, DEFAULT_GEMINI_MODEL,
};
pub use error::{ErrorKind, ImageEmbedError, PlantReportError};
pub use generate::{
    analyze_upload, generate_report, generate_report_to_file, report_filename, GeneratedReport,
};
pub use pipeline::analyze::{analyze, AnalysisRequest, AnalysisResult, ImageAnalyzer, LlmAnalyzer};
pub use pipeline::compose::{split_sections, LayoutPlan, ReportComposer, ReportSection};
pub use pipeline::encode::EncodedImage;
pub use pipeline::ingest::{ingest, ingest_bytes, UploadedImage};
pub use prompts::ANALYSIS_PROMPT;
