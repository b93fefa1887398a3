//! Metrics and encoding for the two standard PDF fonts the report uses.
//!
//! Helvetica and Helvetica-Bold are among the 14 standard fonts every PDF
//! viewer ships, so nothing is embedded; but line wrapping and justification
//! still need each glyph's advance width. The tables below are the AFM
//! widths (thousandths of an em) for the printable ASCII range, plus the few
//! WinAnsi punctuation glyphs that language models like to emit.

/// Font faces available to the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FontFace {
    Regular,
    Bold,
}

impl FontFace {
    /// PDF BaseFont name.
    pub fn base_font(&self) -> &'static str {
        match self {
            FontFace::Regular => "Helvetica",
            FontFace::Bold => "Helvetica-Bold",
        }
    }

    /// Resource name used in page content streams.
    pub fn resource_name(&self) -> &'static str {
        match self {
            FontFace::Regular => "F1",
            FontFace::Bold => "F2",
        }
    }

    /// Advance width of one WinAnsi byte, in thousandths of an em.
    pub fn glyph_width(&self, byte: u8) -> u16 {
        let ascii = match self {
            FontFace::Regular => &HELVETICA_ASCII,
            FontFace::Bold => &HELVETICA_BOLD_ASCII,
        };
        match byte {
            0x20..=0x7e => ascii[(byte - 0x20) as usize],
            0x85 | 0x97 => 1000, // ellipsis, emdash
            0x91 | 0x92 => match self {
                FontFace::Regular => 222,
                FontFace::Bold => 278,
            },
            0x93 | 0x94 => match self {
                FontFace::Regular => 333,
                FontFace::Bold => 500,
            },
            0x95 => 350, // bullet
            0x96 => 556, // endash
            0xa0 => 278, // nbsp
            _ => 556,
        }
    }

    /// Width of already-encoded text at `size` points.
    pub fn measure(&self, encoded: &[u8], size: f32) -> f32 {
        let units: u32 = encoded.iter().map(|&b| self.glyph_width(b) as u32).sum();
        units as f32 * size / 1000.0
    }

    /// Width of `text` at `size` points.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        self.measure(&encode_win_ansi(text), size)
    }
}

/// Distance from the top of a line box to the baseline, per point of size.
pub const ASCENT: f32 = 0.718;

/// Line advance per point of size (ascender − descender + line gap).
pub const LINE_HEIGHT: f32 = 1.156;

/// Encode text for a WinAnsiEncoding simple font.
///
/// ASCII and Latin-1 map to themselves; typographic quotes, dashes, bullet
/// and ellipsis map to their WinAnsi slots; tabs become a space; anything
/// else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2026}' => 0x85,
            _ => b'?',
        })
        .collect()
}

#[rustfmt::skip]
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, //  !"#$%&'()*+,-./
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0-9 :;<=>?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @A-O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P-Z [\]^_
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `a-o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,      // p-z {|}~
];

#[rustfmt::skip]
const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];
