//! Standard 14 fonts used by the PDF exporter.
//!
//! Text is set in WinAnsi-encoded single-byte strings, so widths come
//! from the Adobe font metrics for the printable ASCII range plus a few
//! punctuation marks from the upper half of the code page.

/// Fonts referenced from page content streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Regular,
    Bold,
    Italic,
    BoldItalic,
    Mono,
}

impl Font {
    pub const ALL: [Font; 5] = [
        Font::Regular,
        Font::Bold,
        Font::Italic,
        Font::BoldItalic,
        Font::Mono,
    ];

    /// Name of the font in the page resource dictionary.
    pub fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
            Font::BoldItalic => "F4",
            Font::Mono => "F5",
        }
    }

    pub fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Italic => "Helvetica-Oblique",
            Font::BoldItalic => "Helvetica-BoldOblique",
            Font::Mono => "Courier",
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, Font::Bold | Font::BoldItalic)
    }

    /// Pick the face for a combination of inline styles.
    pub fn select(bold: bool, italic: bool, code: bool) -> Font {
        match (code, bold, italic) {
            (true, _, _) => Font::Mono,
            (false, true, true) => Font::BoldItalic,
            (false, true, false) => Font::Bold,
            (false, false, true) => Font::Italic,
            (false, false, false) => Font::Regular,
        }
    }

    /// Advance width of a WinAnsi byte in 1/1000 em.
    pub fn width(self, byte: u8) -> u16 {
        match self {
            Font::Mono => 600,
            Font::Regular | Font::Italic => char_width(&HELVETICA, byte, false),
            Font::Bold | Font::BoldItalic => char_width(&HELVETICA_BOLD, byte, true),
        }
    }

    /// Width of an encoded string in points.
    pub fn text_width(self, bytes: &[u8], size: f32) -> f32 {
        let units: u32 = bytes.iter().map(|&b| u32::from(self.width(b))).sum();
        units as f32 * size / 1000.0
    }
}

fn char_width(table: &[u16; 95], byte: u8, bold: bool) -> u16 {
    match byte {
        32..=126 => table[(byte - 32) as usize],
        0x85 | 0x89 | 0x97 => 1000,
        0x95 => 350,
        0x80 | 0x96 => 556,
        0x91 | 0x92 => {
            if bold {
                278
            } else {
                222
            }
        }
        0x93 | 0x94 => {
            if bold {
                500
            } else {
                333
            }
        }
        0xA0 => 278,
        _ => {
            if bold {
                611
            } else {
                556
            }
        }
    }
}

/// Encode one character as a WinAnsi (Windows-1252) byte.
///
/// Characters outside the code page become `?`.
pub fn encode_winansi(c: char) -> u8 {
    if (' '..='~').contains(&c) {
        return c as u8;
    }
    if c.is_control() {
        return b'?';
    }

    let mut buf = [0u8; 4];
    let (bytes, _, unmappable) = encoding_rs::WINDOWS_1252.encode(c.encode_utf8(&mut buf));
    match bytes.as_ref() {
        [byte] if !unmappable => *byte,
        _ => b'?',
    }
}

/// Encode a string for a WinAnsi font.
pub fn encode_str(text: &str) -> Vec<u8> {
    text.chars().map(encode_winansi).collect()
}

/// Helvetica widths for ASCII 32..=126.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,      // p..~
];

/// Helvetica-Bold widths for ASCII 32..=126.
#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(Font::Regular.width(b' '), 278);
        assert_eq!(Font::Regular.width(b'W'), 944);
        assert_eq!(Font::Regular.width(b'i'), 222);
        assert_eq!(Font::Bold.width(b'i'), 278);
        assert_eq!(Font::Italic.width(b'm'), Font::Regular.width(b'm'));
        assert_eq!(Font::Mono.width(b'i'), 600);
        assert_eq!(Font::Regular.width(b'~'), 584);
    }

    #[test]
    fn test_text_width() {
        let w = Font::Mono.text_width(b"abcd", 10.0);
        assert!((w - 24.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_encode_winansi() {
        assert_eq!(encode_winansi('A'), b'A');
        assert_eq!(encode_winansi('é'), 0xE9);
        assert_eq!(encode_winansi('•'), 0x95);
        assert_eq!(encode_winansi('—'), 0x97);
        assert_eq!(encode_winansi('€'), 0x80);
        assert_eq!(encode_winansi('日'), b'?');
        assert_eq!(encode_winansi('\t'), b'?');
    }

    #[test]
    fn test_select() {
        assert_eq!(Font::select(true, true, true), Font::Mono);
        assert_eq!(Font::select(true, true, false), Font::BoldItalic);
        assert_eq!(Font::select(false, true, false), Font::Italic);
        assert!(Font::select(true, false, false).is_bold());
    }
}
