//! Pipeline stages for plant analysis and report generation.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested on its own and the two external capabilities (the vision model
//! and the PDF writer) sit behind narrow traits that tests replace with
//! fakes.
//!
//! ## Data Flow
//!
//! ```text
//! analysis:  ingest ──▶ encode ──▶ analyze
//!            (tempfile)  (base64)   (VLM)
//!
//! report:    compose ──▶ layout ──▶ render ──▶ pdf
//!            (plan)      (flow)     (footers)  (lopdf)
//! ```
//!
//! 1. [`ingest`] : validate the upload and stage it to a scoped temp file
//! 2. [`encode`] : base64 and data-URI conversions in both directions
//! 3. [`analyze`]: one call to the vision model behind [`analyze::ImageAnalyzer`]
//! 4. [`compose`]: split the answer into sections and plan the pages
//! 5. [`layout`] : wrap, justify and paginate text into positioned drawing ops
//! 6. [`render`] : flow the plan, then stamp page footers once the count is known
//! 7. [`pdf`]    : serialise the flowed pages with `lopdf`

pub mod analyze;
pub mod compose;
pub mod encode;
pub mod fonts;
pub mod ingest;
pub mod layout;
pub mod pdf;
pub mod render;
