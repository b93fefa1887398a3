//! Report rendering: [`LayoutPlan`] → flowed pages → document bytes.
//!
//! Rendering runs in two passes:
//!
//! 1. **Flow.** Every planned page is laid out with the [`Flow`] engine.
//!    Text that does not fit spills onto overflow pages, so the final page
//!    count is only known once this pass finishes.
//! 2. **Stamp.** With the count known, every page gets its 1-based number
//!    and every decorated page its footer.
//!
//! The stamped document is handed to a [`DocumentBackend`] for
//! serialisation. [`crate::pipeline::pdf::PdfBackend`] writes PDF; tests
//! use a recording backend to inspect pages without parsing PDF.
//!
//! Rendering is synchronous and CPU-bound; async callers wrap it in
//! `spawn_blocking` (see [`crate::generate::generate_report`]).

use crate::config::{ReportStyle, Rgb};
use crate::error::PlantReportError;
use crate::pipeline::compose::{ContentBlock, LayoutPlan};
use crate::pipeline::fonts::FontFace;
use crate::pipeline::layout::{DrawOp, Flow, FlowedDocument};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Distance from the top of the footer line to the bottom page edge.
pub const FOOTER_OFFSET: f32 = 50.0;

const FOOTER_SIZE: f32 = 10.0;

/// Document-level metadata written alongside the pages.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub title: String,
    pub producer: String,
    pub created: DateTime<Utc>,
}

impl DocumentInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            producer: concat!("plant-report ", env!("CARGO_PKG_VERSION")).to_string(),
            created: Utc::now(),
        }
    }
}

/// Serialises a flowed, stamped document.
pub trait DocumentBackend {
    fn write(&self, doc: &FlowedDocument<'_>, info: &DocumentInfo)
        -> Result<Vec<u8>, PlantReportError>;
}

/// Lays out and stamps [`LayoutPlan`]s in a [`ReportStyle`].
#[derive(Debug, Clone, Default)]
pub struct DocumentRenderer {
    style: ReportStyle,
}

impl DocumentRenderer {
    pub fn new(style: ReportStyle) -> Self {
        Self { style }
    }

    /// First pass: place every block, adding overflow pages as needed.
    pub fn flow<'a>(&self, plan: &'a LayoutPlan) -> FlowedDocument<'a> {
        let mut flow = Flow::new(self.style.page);
        for page in &plan.pages {
            flow.begin_page(page.decorated);
            for block in &page.blocks {
                match block {
                    ContentBlock::Text(text) => flow.text(text),
                    ContentBlock::Gap(points) => flow.gap(*points),
                    ContentBlock::Image(image) => flow.image(image),
                }
            }
        }
        flow.finish()
    }

    /// Second pass: number pages 1..=N and add footers to decorated pages.
    pub fn stamp_footers(&self, doc: &mut FlowedDocument<'_>) {
        let total = doc.pages.len();
        let geometry = doc.geometry;

        for (i, page) in doc.pages.iter_mut().enumerate() {
            let number = i + 1;
            page.number = Some(number);
            if !page.decorated {
                continue;
            }
            let text = self.style.footer.render(number, total);
            let width = FontFace::Regular.text_width(&text, FOOTER_SIZE);
            page.ops.push(DrawOp::Text {
                x: (geometry.width - width) / 2.0,
                top: geometry.height - FOOTER_OFFSET,
                text,
                face: FontFace::Regular,
                size: FOOTER_SIZE,
                color: Rgb::BLACK,
                word_spacing: 0.0,
            });
        }
    }

    /// Flow, stamp and serialise `plan`.
    pub fn render(
        &self,
        plan: &LayoutPlan,
        backend: &dyn DocumentBackend,
        info: &DocumentInfo,
    ) -> Result<Vec<u8>, PlantReportError> {
        let mut doc = self.flow(plan);
        self.stamp_footers(&mut doc);
        debug!(
            "Rendering {} planned pages as {} pages",
            plan.pages.len(),
            doc.pages.len()
        );
        backend.write(&doc, info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FooterStyle;
    use crate::pipeline::compose::ReportComposer;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    /// Captures page texts instead of writing bytes.
    #[derive(Default)]
    struct Recording {
        pages: Mutex<Vec<Vec<String>>>,
    }

    impl DocumentBackend for Recording {
        fn write(
            &self,
            doc: &FlowedDocument<'_>,
            _info: &DocumentInfo,
        ) -> Result<Vec<u8>, PlantReportError> {
            let pages = doc
                .pages
                .iter()
                .map(|p| p.text_lines().map(str::to_string).collect())
                .collect();
            *self.pages.lock().unwrap() = pages;
            Ok(b"recorded".to_vec())
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    fn long_analysis(sections: usize) -> String {
        (1..=sections)
            .map(|i| {
                format!(
                    "Topic {i}\n{}",
                    "The leaves are broad, glossy and arranged alternately along the stem. "
                        .repeat(8)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn rose_renders_one_page_with_footer() {
        let plan = ReportComposer::default().compose_on(
            date(),
            "Rose\nA red flower.\n\nCare\nWater daily.",
            None,
        );
        let renderer = DocumentRenderer::default();
        let backend = Recording::default();
        let bytes = renderer
            .render(&plan, &backend, &DocumentInfo::new("Plant Analysis Report"))
            .unwrap();
        assert_eq!(bytes, b"recorded");

        let pages = backend.pages.lock().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].last().map(String::as_str), Some("Page 1"));
        assert!(pages[0].contains(&"Water daily.".to_string()));
    }

    #[test]
    fn overflow_pages_are_numbered_in_order() {
        let plan = ReportComposer::default().compose_on(date(), &long_analysis(12), None);
        let renderer = DocumentRenderer::default();
        let mut doc = renderer.flow(&plan);
        renderer.stamp_footers(&mut doc);

        assert!(doc.pages.len() > 1, "expected overflow");
        for (i, page) in doc.pages.iter().enumerate() {
            assert_eq!(page.number, Some(i + 1));
            let footer = page.text_lines().last().unwrap();
            assert_eq!(footer, format!("Page {}", i + 1));
        }
    }

    #[test]
    fn image_page_follows_overflowed_text() {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        use image::{DynamicImage, ImageFormat, RgbImage};
        use std::io::Cursor;

        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(30, 20))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(&buf));

        let plan = ReportComposer::default().compose_on(date(), &long_analysis(12), Some(&uri));
        let renderer = DocumentRenderer::default();
        let mut doc = renderer.flow(&plan);
        renderer.stamp_footers(&mut doc);

        let last = doc.pages.last().unwrap();
        assert!(!last.overflow);
        assert!(last.ops.iter().any(|op| matches!(op, DrawOp::Image { .. })));
        assert_eq!(doc.images.len(), 1);
        assert!(doc.pages[..doc.pages.len() - 1]
            .iter()
            .all(|p| !p.ops.iter().any(|op| matches!(op, DrawOp::Image { .. }))));
    }

    #[test]
    fn bad_image_renders_like_no_image() {
        let composer = ReportComposer::default();
        let text = "Rose\nA red flower.";
        let bad = composer.compose_on(date(), text, Some("data:image/jpeg;base64,!!!"));
        let none = composer.compose_on(date(), text, None);

        let renderer = DocumentRenderer::default();
        let mut a = renderer.flow(&bad);
        let mut b = renderer.flow(&none);
        renderer.stamp_footers(&mut a);
        renderer.stamp_footers(&mut b);
        assert_eq!(a.pages, b.pages);
    }

    #[test]
    fn page_of_total_footer() {
        let style = ReportStyle {
            footer: FooterStyle::PageOfTotal,
            ..ReportStyle::default()
        };
        let plan = ReportComposer::new(style.clone()).compose_on(date(), &long_analysis(12), None);
        let renderer = DocumentRenderer::new(style);
        let mut doc = renderer.flow(&plan);
        renderer.stamp_footers(&mut doc);

        let total = doc.pages.len();
        let first = doc.pages[0].text_lines().last().unwrap().to_string();
        assert_eq!(first, format!("Page 1 of {total}"));
    }

    #[test]
    fn footer_is_centred_near_bottom() {
        let plan = ReportComposer::default().compose_on(date(), "A\nb", None);
        let renderer = DocumentRenderer::default();
        let mut doc = renderer.flow(&plan);
        renderer.stamp_footers(&mut doc);

        let g = doc.geometry;
        let Some(DrawOp::Text { x, top, text, size, .. }) = doc.pages[0].ops.last() else {
            panic!("footer should be the last op");
        };
        assert_eq!(*top, g.height - FOOTER_OFFSET);
        let width = FontFace::Regular.text_width(text, *size);
        assert!(((x + width / 2.0) - g.width / 2.0).abs() < 1e-3);
    }
}
