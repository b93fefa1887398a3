//! Text flow: turn content blocks into positioned drawing operations.
//!
//! This is the layout engine the renderer drives. It keeps a cursor on the
//! current page, wraps text to the printable width, justifies where asked,
//! and starts a new page whenever the next line or image would cross the
//! bottom margin. Pages created that way are *overflow* pages: they were
//! never requested by the composer, but they inherit the decoration of the
//! page they continue, so background and footer treatment stays uniform.
//!
//! All coordinates are PDF points measured from the page's top-left corner;
//! the PDF backend flips them into PDF's bottom-left space.

use crate::config::{PageGeometry, Rgb};
use crate::pipeline::compose::{Align, ImageBlock, TextBlock};
use crate::pipeline::fonts::{FontFace, ASCENT, LINE_HEIGHT};
use image::DynamicImage;

/// One positioned drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// A single line of text; `top` is the top of the line box.
    Text {
        x: f32,
        top: f32,
        text: String,
        face: FontFace,
        size: f32,
        color: Rgb,
        /// Extra space added to every space character (justification).
        word_spacing: f32,
    },
    /// A filled horizontal bar (underlines).
    Rule {
        x: f32,
        top: f32,
        width: f32,
        thickness: f32,
        color: Rgb,
    },
    /// An image from [`FlowedDocument::images`], scaled to `width` × `height`.
    Image {
        index: usize,
        x: f32,
        top: f32,
        width: f32,
        height: f32,
    },
}

/// A page produced by the flow phase.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowedPage {
    pub ops: Vec<DrawOp>,
    /// Paint background and footer.
    pub decorated: bool,
    /// Created automatically because content overflowed the previous page.
    pub overflow: bool,
    /// 1-based page number; `None` until footers are stamped.
    pub number: Option<usize>,
}

impl FlowedPage {
    fn new(decorated: bool, overflow: bool) -> Self {
        Self {
            ops: Vec::new(),
            decorated,
            overflow,
            number: None,
        }
    }

    /// Text of every text op on the page, in drawing order.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// All pages of a report after flowing, plus the images they reference.
#[derive(Debug, Clone)]
pub struct FlowedDocument<'a> {
    pub pages: Vec<FlowedPage>,
    pub images: Vec<&'a DynamicImage>,
    pub geometry: PageGeometry,
}

/// A wrapped line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub width: f32,
    /// Last line of its paragraph (never justified).
    pub last: bool,
}

impl Line {
    fn new(text: String, face: FontFace, size: f32, last: bool) -> Self {
        let width = face.text_width(&text, size);
        Self { text, width, last }
    }
}

/// Greedy word wrap.
///
/// Explicit newlines end a paragraph; a blank paragraph yields an empty
/// line. A single word wider than `max_width` is broken between characters.
pub fn wrap(text: &str, face: FontFace, size: f32, max_width: f32) -> Vec<Line> {
    let space = face.text_width(" ", size);
    let mut out = Vec::new();

    for paragraph in text.split('\n') {
        if paragraph.trim().is_empty() {
            out.push(Line::new(String::new(), face, size, true));
            continue;
        }

        let mut current = String::new();
        let mut current_width = 0.0_f32;

        for word in paragraph.split_whitespace() {
            let word_width = face.text_width(word, size);

            if word_width > max_width {
                if !current.is_empty() {
                    out.push(Line::new(std::mem::take(&mut current), face, size, false));
                }
                let mut pieces = break_word(word, face, size, max_width);
                let tail = pieces.pop().unwrap_or_default();
                out.extend(pieces.into_iter().map(|p| Line::new(p, face, size, false)));
                current_width = face.text_width(&tail, size);
                current = tail;
                continue;
            }

            if current.is_empty() {
                current.push_str(word);
                current_width = word_width;
            } else if current_width + space + word_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width += space + word_width;
            } else {
                out.push(Line::new(std::mem::take(&mut current), face, size, false));
                current.push_str(word);
                current_width = word_width;
            }
        }

        out.push(Line::new(current, face, size, true));
    }

    out
}

fn break_word(word: &str, face: FontFace, size: f32, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for c in word.chars() {
        let mut candidate = piece.clone();
        candidate.push(c);
        if !piece.is_empty() && face.text_width(&candidate, size) > max_width {
            pieces.push(std::mem::take(&mut piece));
            piece.push(c);
        } else {
            piece = candidate;
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Cursor-based flow over a growing list of pages.
pub struct Flow<'a> {
    geometry: PageGeometry,
    pages: Vec<FlowedPage>,
    images: Vec<&'a DynamicImage>,
    y: f32,
}

impl<'a> Flow<'a> {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pages: Vec::new(),
            images: Vec::new(),
            y: geometry.margin_top,
        }
    }

    /// Start a page the composer asked for.
    pub fn begin_page(&mut self, decorated: bool) {
        self.push_page(decorated, false);
    }

    /// Start an overflow page continuing the current one.
    fn overflow(&mut self) {
        let decorated = self.pages.last().map(|p| p.decorated).unwrap_or(true);
        self.push_page(decorated, true);
    }

    fn push_page(&mut self, decorated: bool, overflow: bool) {
        self.pages.push(FlowedPage::new(decorated, overflow));
        self.y = self.geometry.margin_top;
    }

    fn current(&mut self) -> &mut FlowedPage {
        if self.pages.is_empty() {
            self.begin_page(true);
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Current cursor position from the top of the page.
    pub fn cursor(&self) -> f32 {
        self.y
    }

    pub fn gap(&mut self, points: f32) {
        self.y += points;
    }

    pub fn text(&mut self, block: &TextBlock) {
        if let Some(top) = block.top {
            self.y = top;
        }

        let g = self.geometry;
        let line_height = block.size * LINE_HEIGHT;
        let available = g.content_width();

        for line in wrap(&block.text, block.face, block.size, available) {
            if self.y + line_height > g.content_bottom() {
                self.overflow();
            }

            let x = match block.align {
                Align::Left | Align::Justify => g.margin_left,
                Align::Center => g.margin_left + (available - line.width) / 2.0,
                Align::Right => g.margin_left + available - line.width,
            };

            let spaces = line.text.matches(' ').count();
            let word_spacing = if block.align == Align::Justify && !line.last && spaces > 0 {
                (available - line.width) / spaces as f32
            } else {
                0.0
            };

            let top = self.y;
            let width = if word_spacing > 0.0 { available } else { line.width };
            let page = self.current();
            if !line.text.is_empty() {
                page.ops.push(DrawOp::Text {
                    x,
                    top,
                    text: line.text,
                    face: block.face,
                    size: block.size,
                    color: block.color,
                    word_spacing,
                });
                if block.underline {
                    let thickness = (block.size / 20.0).max(0.5);
                    page.ops.push(DrawOp::Rule {
                        x,
                        top: top + block.size * (ASCENT + 0.1),
                        width,
                        thickness,
                        color: block.color,
                    });
                }
            }

            self.y += line_height;
        }
    }

    pub fn image(&mut self, block: &'a ImageBlock) {
        let g = self.geometry;
        let (width, height) = block.display_size();

        if self.y + height > g.content_bottom() && self.y > g.margin_top {
            self.overflow();
        }

        let index = self.images.len();
        self.images.push(&*block.image);

        let x = g.margin_left + (g.content_width() - width) / 2.0;
        let top = self.y;
        self.current().ops.push(DrawOp::Image {
            index,
            x,
            top,
            width,
            height,
        });
        self.y += height;
    }

    /// Finish flowing. Always yields at least one page.
    pub fn finish(mut self) -> FlowedDocument<'a> {
        if self.pages.is_empty() {
            self.begin_page(true);
        }
        FlowedDocument {
            pages: self.pages,
            images: self.images,
            geometry: self.geometry,
        }
    }
}
