//! Report composition: analysis text + optional image → [`LayoutPlan`].
//!
//! The plan is an ordered, renderer-agnostic list of pages and content
//! blocks. It fixes *what* goes on each planned page and in which typeface,
//! but not *where*: line wrapping, overflow onto extra pages, and footer
//! numbering are the renderer's job, because they depend on font metrics
//! and on how many pages the text actually fills.
//!
//! ## Section splitting
//!
//! The model is prompted to answer in plain paragraphs separated by blank
//! lines, each starting with a short title line. Splitting on blank lines
//! therefore recovers the topics; the first line of each block becomes the
//! section heading and the remaining lines its justified body.

use crate::config::{is_valid_date_format, ReportStyle, Rgb, DEFAULT_DATE_FORMAT};
use crate::error::ImageEmbedError;
use crate::pipeline::encode::decode_data_uri;
use crate::pipeline::fonts::{FontFace, LINE_HEIGHT};
use chrono::{Local, NaiveDate};
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

static BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid blank-line regex"));

/// Top of the report heading, measured from the top edge of the page.
///
/// Sits inside the top margin so the heading reads as a banner.
pub const HEADING_TOP: f32 = 50.0;

/// One titled block of the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub body: String,
}

/// Horizontal alignment of a text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Align {
    Left,
    Center,
    Right,
    Justify,
}

/// A run of text in one face, size and alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub face: FontFace,
    pub size: f32,
    pub align: Align,
    pub underline: bool,
    pub color: Rgb,
    /// Absolute top of the block from the page's top edge; `None` continues
    /// from the current cursor.
    pub top: Option<f32>,
}

impl TextBlock {
    fn new(text: impl Into<String>, face: FontFace, size: f32) -> Self {
        Self {
            text: text.into(),
            face,
            size,
            align: Align::Left,
            underline: false,
            color: Rgb::BLACK,
            top: None,
        }
    }

    fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    fn underline(mut self) -> Self {
        self.underline = true;
        self
    }

    fn at_top(mut self, top: f32) -> Self {
        self.top = Some(top);
        self
    }
}

/// A decoded image, fitted into `fit` points and centred horizontally.
#[derive(Clone, PartialEq)]
pub struct ImageBlock {
    pub image: Arc<DynamicImage>,
    pub fit: (f32, f32),
}

impl ImageBlock {
    /// Display size after fitting into the box, aspect ratio preserved.
    pub fn display_size(&self) -> (f32, f32) {
        let (w, h) = (self.image.width() as f32, self.image.height() as f32);
        if w <= 0.0 || h <= 0.0 {
            return (0.0, 0.0);
        }
        let scale = (self.fit.0 / w).min(self.fit.1 / h);
        (w * scale, h * scale)
    }
}

impl fmt::Debug for ImageBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlock")
            .field("width_px", &self.image.width())
            .field("height_px", &self.image.height())
            .field("fit", &self.fit)
            .finish()
    }
}

/// One layout instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(TextBlock),
    /// Vertical space in points.
    Gap(f32),
    Image(ImageBlock),
}

/// A page the composer explicitly asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDescriptor {
    pub blocks: Vec<ContentBlock>,
    /// Paint the background gradient and the page-number footer.
    pub decorated: bool,
}

impl PageDescriptor {
    fn decorated(blocks: Vec<ContentBlock>) -> Self {
        Self {
            blocks,
            decorated: true,
        }
    }

    pub fn has_image(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| matches!(b, ContentBlock::Image(_)))
    }
}

/// The complete plan for one report.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    pub pages: Vec<PageDescriptor>,
    pub sections: Vec<ReportSection>,
    /// Non-fatal problems; currently only a dropped image.
    pub warnings: Vec<ImageEmbedError>,
}

impl LayoutPlan {
    pub fn has_image_page(&self) -> bool {
        self.pages.iter().any(PageDescriptor::has_image)
    }

    /// True if an image was supplied but could not be embedded.
    pub fn image_dropped(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Split analysis text into titled sections.
///
/// Blocks are separated by one or more blank (or whitespace-only) lines.
/// Empty blocks are skipped; order is preserved.
pub fn split_sections(text: &str) -> Vec<ReportSection> {
    let normalised = text.replace("\r\n", "\n").replace('\r', "\n");

    BLANK_LINES
        .split(&normalised)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| {
            let mut lines = block.lines();
            let title = lines.next().unwrap_or_default().trim().to_string();
            let body = lines
                .map(str::trim_end)
                .collect::<Vec<_>>()
                .join("\n");
            ReportSection { title, body }
        })
        .collect()
}

/// Builds [`LayoutPlan`]s in the configured [`ReportStyle`].
#[derive(Debug, Clone, Default)]
pub struct ReportComposer {
    style: ReportStyle,
}

impl ReportComposer {
    pub fn new(style: ReportStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &ReportStyle {
        &self.style
    }

    /// Compose a report dated today (local time).
    pub fn compose(&self, result_text: &str, image_data_uri: Option<&str>) -> LayoutPlan {
        self.compose_on(Local::now().date_naive(), result_text, image_data_uri)
    }

    /// Compose a report with an explicit generation date.
    ///
    /// Pure: equal inputs give equal plans.
    pub fn compose_on(
        &self,
        date: NaiveDate,
        result_text: &str,
        image_data_uri: Option<&str>,
    ) -> LayoutPlan {
        let sections = split_sections(result_text);
        debug!("Composing report with {} sections", sections.len());

        let mut pages = vec![self.text_page(date, &sections)];
        let mut warnings = Vec::new();

        match image_data_uri.map(str::trim).filter(|s| !s.is_empty()) {
            None => {}
            Some(uri) => match decode_data_uri(uri) {
                Ok(img) => pages.push(self.image_page(img)),
                Err(e) => {
                    warn!("Error adding image to report, continuing without it: {}", e);
                    warnings.push(e);
                }
            },
        }

        LayoutPlan {
            pages,
            sections,
            warnings,
        }
    }

    /// The style's date format, or the default when chrono cannot render it.
    fn date_format(&self) -> &str {
        if is_valid_date_format(&self.style.date_format) {
            &self.style.date_format
        } else {
            warn!(
                "Unrenderable date format {:?}, using {:?}",
                self.style.date_format, DEFAULT_DATE_FORMAT
            );
            DEFAULT_DATE_FORMAT
        }
    }

    fn text_page(&self, date: NaiveDate, sections: &[ReportSection]) -> PageDescriptor {
        let style = &self.style;
        let mut blocks = vec![
            ContentBlock::Text(TextBlock::new(&style.title, FontFace::Bold, 24.0).at_top(HEADING_TOP)),
            lines(2.0, 24.0),
            ContentBlock::Text(
                TextBlock::new(
                    format!("Date: {}", date.format(self.date_format())),
                    FontFace::Regular,
                    12.0,
                )
                .align(Align::Right),
            ),
            lines(2.0, 12.0),
            ContentBlock::Text(
                TextBlock::new(&style.results_heading, FontFace::Bold, 18.0).underline(),
            ),
            lines(1.0, 18.0),
        ];

        for (i, section) in sections.iter().enumerate() {
            blocks.push(ContentBlock::Text(TextBlock::new(
                &section.title,
                FontFace::Bold,
                14.0,
            )));
            blocks.push(lines(0.5, 14.0));
            if !section.body.is_empty() {
                blocks.push(ContentBlock::Text(
                    TextBlock::new(&section.body, FontFace::Regular, 12.0).align(Align::Justify),
                ));
            }
            if i + 1 < sections.len() {
                blocks.push(lines(1.5, 12.0));
            }
        }

        PageDescriptor::decorated(blocks)
    }

    fn image_page(&self, img: DynamicImage) -> PageDescriptor {
        PageDescriptor::decorated(vec![
            ContentBlock::Text(
                TextBlock::new(&self.style.image_heading, FontFace::Bold, 18.0).align(Align::Center),
            ),
            lines(1.0, 18.0),
            ContentBlock::Image(ImageBlock {
                image: Arc::new(img),
                fit: self.style.image_box,
            }),
        ])
    }
}

/// `n` text lines of `size` points, as vertical space.
fn lines(n: f32, size: f32) -> ContentBlock {
    ContentBlock::Gap(n * size * LINE_HEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use image::{ImageFormat, Rgb as Px, RgbImage};
    use std::io::Cursor;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    fn png_uri(w: u32, h: u32) -> String {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Px([34, 139, 34])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(&buf))
    }

    fn texts(page: &PageDescriptor) -> Vec<&str> {
        page.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn split_two_sections() {
        let sections = split_sections("Rose\nA red flower.\n\nCare\nWater daily.");
        assert_eq!(
            sections,
            vec![
                ReportSection {
                    title: "Rose".into(),
                    body: "A red flower.".into()
                },
                ReportSection {
                    title: "Care".into(),
                    body: "Water daily.".into()
                },
            ]
        );
    }

    #[test]
    fn split_skips_empty_blocks_and_normalises_crlf() {
        let text = "\r\n\r\nName\r\nTulsi\r\n\r\n\r\n   \r\n\r\nHealth\r\nGood\r\n\r\n";
        let sections = split_sections(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Name");
        assert_eq!(sections[1].body, "Good");
    }

    #[test]
    fn split_keeps_multiline_bodies() {
        let sections = split_sections("Care\nWater weekly.\nFull sun.  ");
        assert_eq!(sections[0].body, "Water weekly.\nFull sun.");
    }

    #[test]
    fn split_title_only_block() {
        let sections = split_sections("Interesting Facts");
        assert_eq!(sections[0].title, "Interesting Facts");
        assert!(sections[0].body.is_empty());
    }

    #[test]
    fn split_counts_blocks() {
        let text = (1..=7)
            .map(|i| format!("Title {i}\nBody {i}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let sections = split_sections(&text);
        assert_eq!(sections.len(), 7);
        for (i, s) in sections.iter().enumerate() {
            assert_eq!(s.title, format!("Title {}", i + 1));
        }
    }

    #[test]
    fn scenario_rose_without_image() {
        let composer = ReportComposer::default();
        let plan = composer.compose_on(date(), "Rose\nA red flower.\n\nCare\nWater daily.", None);

        assert_eq!(plan.pages.len(), 1);
        assert_eq!(plan.sections.len(), 2);
        assert!(!plan.has_image_page());
        assert!(plan.warnings.is_empty());
        assert!(plan.pages[0].decorated);
        assert_eq!(
            texts(&plan.pages[0]),
            vec![
                "Plant Analysis Report",
                "Date: 3/7/2024",
                "Analysis Result",
                "Rose",
                "A red flower.",
                "Care",
                "Water daily.",
            ]
        );
    }

    #[test]
    fn heading_and_date_styles() {
        let plan = ReportComposer::default().compose_on(date(), "A\nb", None);
        let blocks = &plan.pages[0].blocks;
        let ContentBlock::Text(title) = &blocks[0] else {
            panic!("first block should be the title");
        };
        assert_eq!(title.top, Some(HEADING_TOP));
        assert_eq!(title.face, FontFace::Bold);
        let ContentBlock::Text(date_line) = &blocks[2] else {
            panic!("third block should be the date");
        };
        assert_eq!(date_line.align, Align::Right);
        let ContentBlock::Text(results) = &blocks[4] else {
            panic!("fifth block should be the results heading");
        };
        assert!(results.underline);
    }

    #[test]
    fn unrenderable_date_format_falls_back() {
        let style = ReportStyle {
            date_format: "%Q".to_string(),
            ..ReportStyle::default()
        };
        let plan = ReportComposer::new(style).compose_on(date(), "A\nb", None);
        let ContentBlock::Text(date_line) = &plan.pages[0].blocks[2] else {
            panic!("third block should be the date");
        };
        let expected = format!("Date: {}", date().format(DEFAULT_DATE_FORMAT));
        assert_eq!(date_line.text, expected);
    }

    #[test]
    fn body_is_justified() {
        let plan = ReportComposer::default().compose_on(date(), "Care\nWater daily.", None);
        let body = plan.pages[0]
            .blocks
            .iter()
            .find_map(|b| match b {
                ContentBlock::Text(t) if t.text == "Water daily." => Some(t),
                _ => None,
            })
            .unwrap();
        assert_eq!(body.align, Align::Justify);
        assert_eq!(body.face, FontFace::Regular);
    }

    #[test]
    fn composition_is_idempotent() {
        let composer = ReportComposer::default();
        let text = "Neem\nAzadirachta indica.\n\nHealth\nLeaves look healthy.";
        let uri = png_uri(8, 4);
        let a = composer.compose_on(date(), text, Some(&uri));
        let b = composer.compose_on(date(), text, Some(&uri));
        assert_eq!(a, b);
    }

    #[test]
    fn image_page_appended() {
        let plan = ReportComposer::default().compose_on(date(), "A\nb", Some(&png_uri(800, 400)));
        assert_eq!(plan.pages.len(), 2);
        assert!(plan.pages[1].has_image());
        assert_eq!(texts(&plan.pages[1]), vec!["Analyzed Plant Image"]);

        let ContentBlock::Image(img) = plan.pages[1].blocks.last().unwrap() else {
            panic!("last block should be the image");
        };
        assert_eq!(img.display_size(), (400.0, 200.0));
    }

    #[test]
    fn small_images_are_scaled_up_to_the_box() {
        let block = ImageBlock {
            image: Arc::new(DynamicImage::ImageRgb8(RgbImage::new(50, 100))),
            fit: (400.0, 400.0),
        };
        assert_eq!(block.display_size(), (200.0, 400.0));
    }

    #[test]
    fn undecodable_image_is_dropped_not_fatal() {
        let composer = ReportComposer::default();
        let text = "Rose\nA red flower.";
        let with_bad = composer.compose_on(date(), text, Some("data:image/png;base64,bm9wZQ=="));
        let without = composer.compose_on(date(), text, None);

        assert_eq!(with_bad.pages, without.pages);
        assert!(with_bad.image_dropped());
        assert!(!without.image_dropped());
    }

    #[test]
    fn empty_image_string_means_no_image() {
        let plan = ReportComposer::default().compose_on(date(), "A\nb", Some("  "));
        assert_eq!(plan.pages.len(), 1);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn empty_text_still_has_header() {
        let plan = ReportComposer::default().compose_on(date(), "", None);
        assert!(plan.sections.is_empty());
        assert_eq!(
            texts(&plan.pages[0]),
            vec!["Plant Analysis Report", "Date: 3/7/2024", "Analysis Result"]
        );
    }
}
