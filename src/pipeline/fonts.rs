//! Metrics and encoding for the two standard PDF fonts the renderer uses.
//!
//! Helvetica and Helvetica-Bold belong to the PDF standard-14 set, so every
//! viewer ships them and nothing has to be embedded. Line wrapping still
//! needs glyph advance widths; the tables below are the printable-ASCII
//! widths from the Adobe AFM files, in 1/1000 em.

use encoding_rs::WINDOWS_1252;

/// A font the renderer can draw with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Helvetica,
    HelveticaBold,
}

impl Font {
    /// PostScript name used as the PDF `BaseFont`.
    pub fn base_font(&self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Resource name used in page content streams.
    pub fn resource_name(&self) -> &'static str {
        match self {
            Font::Helvetica => "F1",
            Font::HelveticaBold => "F2",
        }
    }

    fn widths(&self) -> &'static [u16; 95] {
        match self {
            Font::Helvetica => &HELVETICA,
            Font::HelveticaBold => &HELVETICA_BOLD,
        }
    }

    /// Advance width of one character in 1/1000 em.
    pub fn char_width(&self, c: char) -> u16 {
        match c as u32 {
            code @ 0x20..=0x7E => self.widths()[(code - 0x20) as usize],
            // estimate outside printable ASCII
            _ => FALLBACK_WIDTH,
        }
    }

    /// Width of `text` set at `size` points.
    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        let units: u32 = text.chars().map(|c| self.char_width(c) as u32).sum();
        units as f64 * size / 1000.0
    }
}

const FALLBACK_WIDTH: u16 = 556;

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,                               // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015,                                             // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,                // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,                // 'N'..'Z'
    278, 278, 278, 469, 556, 333,                                                   // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,                // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,                // 'n'..'z'
    334, 260, 334, 584,                                                             // '{'..'~'
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

/// Encode text for a `WinAnsiEncoding` simple font.
///
/// Characters outside Windows-1252 become `?`; control characters become a
/// space so they never upset the content stream.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for c in text.chars() {
        if c.is_control() {
            out.push(b' ');
            continue;
        }
        let (bytes, _, unmappable) = WINDOWS_1252.encode(c.encode_utf8(&mut buf));
        if unmappable {
            out.push(b'?');
        } else {
            out.extend_from_slice(&bytes);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_widths() {
        assert_eq!(Font::Helvetica.char_width(' '), 278);
        assert_eq!(Font::Helvetica.char_width('W'), 944);
        assert_eq!(Font::Helvetica.char_width('i'), 222);
        assert_eq!(Font::Helvetica.char_width('~'), 584);
        assert_eq!(Font::HelveticaBold.char_width('i'), 278);
        assert_eq!(Font::HelveticaBold.char_width('@'), 975);
    }

    #[test]
    fn bold_is_never_narrower_for_letters() {
        for c in ('a'..='z').chain('A'..='Z') {
            assert!(
                Font::HelveticaBold.char_width(c) >= Font::Helvetica.char_width(c),
                "{c}"
            );
        }
    }

    #[test]
    fn text_width_scales_with_size() {
        let w8 = Font::Helvetica.text_width("hello", 8.0);
        let w16 = Font::Helvetica.text_width("hello", 16.0);
        assert!((w16 - 2.0 * w8).abs() < 1e-9);
        assert!((w8 - (556.0 + 556.0 + 222.0 + 222.0 + 556.0) * 8.0 / 1000.0).abs() < 1e-9);
    }

    #[test]
    fn win_ansi_encoding() {
        assert_eq!(encode_win_ansi("abc"), b"abc");
        assert_eq!(encode_win_ansi("café"), b"caf\xE9");
        assert_eq!(encode_win_ansi("€"), b"\x80");
        assert_eq!(encode_win_ansi("日本"), b"??");
        assert_eq!(encode_win_ansi("a\tb"), b"a b");
    }
}
