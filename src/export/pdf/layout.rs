//! Line breaking and page layout.
//!
//! The layout turns block markup into positioned drawing operations on
//! US-Letter pages. Text is broken greedily at spaces; words wider than a
//! line are split. Preformatted text is never reflowed, only wrapped at
//! the column limit.

use super::fonts::{Font, encode_str, encode_winansi};

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
pub const MARGIN: f32 = 54.0;

const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const TOP: f32 = PAGE_HEIGHT - MARGIN;
const BOTTOM: f32 = MARGIN;

/// Courier advance as a fraction of the font size.
const MONO_ADVANCE: f32 = 0.6;
const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);

    pub const fn hex(value: u32) -> Rgb {
        Rgb(
            ((value >> 16) & 0xFF) as f32 / 255.0,
            ((value >> 8) & 0xFF) as f32 / 255.0,
            (value & 0xFF) as f32 / 255.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Justify,
}

/// How a block of flowing text is set.
#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    /// Face for unstyled text; `Font::Bold` makes the whole block bold.
    pub font: Font,
    pub size: f32,
    pub leading: f32,
    pub color: Rgb,
    pub space_before: f32,
    pub space_after: f32,
    pub indent: f32,
    pub align: Align,
}

/// How preformatted text is set.
#[derive(Debug, Clone, Copy)]
pub struct CodeStyle {
    pub size: f32,
    pub leading: f32,
    pub color: Rgb,
    pub background: Rgb,
    pub space_before: f32,
    pub space_after: f32,
    /// Left and right inset of the background box.
    pub indent: f32,
    pub padding: f32,
}

/// A stretch of text in one font.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub font: Font,
    pub bytes: Vec<u8>,
}

/// A drawing operation on a page.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Text {
        x: f32,
        y: f32,
        size: f32,
        color: Rgb,
        word_spacing: f32,
        spans: Vec<Span>,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgb,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

/// Pages of drawing operations, filled top to bottom.
#[derive(Debug, Default)]
pub struct Layout {
    pages: Vec<Vec<Op>>,
    y: f32,
    break_pending: bool,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = TOP;
        self.break_pending = false;
    }

    fn ensure_page(&mut self) {
        if self.pages.is_empty() || self.break_pending {
            self.new_page();
        }
    }

    fn at_top(&self) -> bool {
        self.y >= TOP
    }

    fn push(&mut self, op: Op) {
        if let Some(page) = self.pages.last_mut() {
            page.push(op);
        }
    }

    /// Vertical space; space running past the bottom margin ends the page.
    pub fn space(&mut self, height: f32) {
        self.ensure_page();
        self.y -= height;
        if self.y < BOTTOM {
            self.break_pending = true;
        }
    }

    /// Start the next block on a fresh page. Does nothing on an empty page.
    pub fn page_break(&mut self) {
        if !self.pages.is_empty() {
            self.break_pending = true;
        }
    }

    /// Set a block of inline markup as wrapped lines.
    pub fn text(&mut self, markup: &str, style: &TextStyle) {
        self.prefixed_text("", markup, style);
    }

    /// Like [`Layout::text`], with a prefix (such as a bullet) before the
    /// first line and subsequent lines aligned after it.
    pub fn prefixed_text(&mut self, prefix: &str, markup: &str, style: &TextStyle) {
        self.ensure_page();
        if !self.at_top() {
            self.y -= style.space_before;
        }

        let prefix_bytes = encode_str(prefix);
        let prefix_width = style.font.text_width(&prefix_bytes, style.size);
        let x = MARGIN + style.indent + prefix_width;
        let available = CONTENT_WIDTH - style.indent - prefix_width;

        let items = tokenize(markup, style.font);
        let lines = break_lines(&items, available, style.size);
        let count = lines.len();

        for (i, line) in lines.into_iter().enumerate() {
            if self.y - style.leading < BOTTOM && !self.at_top() {
                self.new_page();
            }
            let baseline = self.y - style.size;

            let mut spans = line.spans;
            let mut line_x = match style.align {
                Align::Center => MARGIN + style.indent + (available - line.width) / 2.0,
                _ => x,
            };
            let word_spacing = if style.align == Align::Justify
                && i + 1 < count
                && !line.forced
                && line.spaces > 0
            {
                (available - line.width) / line.spaces as f32
            } else {
                0.0
            };

            if i == 0 && !prefix_bytes.is_empty() {
                spans.insert(
                    0,
                    Span {
                        font: style.font,
                        bytes: prefix_bytes.clone(),
                    },
                );
                line_x -= prefix_width;
            }

            self.push(Op::Text {
                x: line_x,
                y: baseline,
                size: style.size,
                color: style.color,
                word_spacing,
                spans,
            });
            self.y -= style.leading;
        }

        self.y -= style.space_after;
        if self.y < BOTTOM {
            self.break_pending = true;
        }
    }

    /// Set preformatted text on a shaded background, split across pages
    /// as needed.
    pub fn code(&mut self, text: &str, style: &CodeStyle) {
        self.ensure_page();
        if !self.at_top() {
            self.y -= style.space_before;
        }

        let box_width = CONTENT_WIDTH - 2.0 * style.indent;
        let columns = ((box_width - 2.0 * style.padding) / (MONO_ADVANCE * style.size))
            .floor()
            .max(1.0) as usize;
        let lines = wrap_preformatted(text, columns);

        let mut remaining = &lines[..];
        while !remaining.is_empty() {
            let capacity =
                ((self.y - BOTTOM - 2.0 * style.padding) / style.leading).floor().max(0.0) as usize;
            if capacity == 0 {
                if self.at_top() {
                    break;
                }
                self.new_page();
                continue;
            }

            let (chunk, rest) = remaining.split_at(capacity.min(remaining.len()));
            let height = chunk.len() as f32 * style.leading + 2.0 * style.padding;
            self.push(Op::Rect {
                x: MARGIN + style.indent,
                y: self.y - height,
                width: box_width,
                height,
                color: style.background,
            });

            let mut baseline = self.y - style.padding - style.size;
            for line in chunk {
                if !line.is_empty() {
                    self.push(Op::Text {
                        x: MARGIN + style.indent + style.padding,
                        y: baseline,
                        size: style.size,
                        color: style.color,
                        word_spacing: 0.0,
                        spans: vec![Span {
                            font: Font::Mono,
                            bytes: line.clone(),
                        }],
                    });
                }
                baseline -= style.leading;
            }

            self.y -= height;
            remaining = rest;
            if !remaining.is_empty() {
                self.new_page();
            }
        }

        self.y -= style.space_after;
        if self.y < BOTTOM {
            self.break_pending = true;
        }
    }

    /// Place an image centered horizontally.
    pub fn image(&mut self, width: f32, height: f32) {
        self.ensure_page();
        if self.y - height < BOTTOM && !self.at_top() {
            self.new_page();
        }
        self.push(Op::Image {
            x: MARGIN + (CONTENT_WIDTH - width) / 2.0,
            y: self.y - height,
            width,
            height,
        });
        self.y -= height;
    }

    /// Finished pages; always at least one.
    pub fn finish(mut self) -> Vec<Vec<Op>> {
        if self.pages.is_empty() {
            self.new_page();
        }
        self.pages
    }
}

/// A unit of line breaking.
#[derive(Debug, Clone, PartialEq)]
enum Item {
    /// Glyphs with no break opportunity inside, possibly in several fonts.
    Word(Vec<Span>),
    Space(Font),
    Break,
}

/// Parse inline markup into words, spaces and forced breaks.
fn tokenize(markup: &str, base: Font) -> Vec<Item> {
    let mut items = Vec::new();
    let (mut bold, mut italic, mut code) = (0u32, 0u32, 0u32);
    let base_bold = base.is_bold();
    let mut joinable = false;

    let mut rest = markup;
    while let Some(c) = rest.chars().next() {
        if c == '<'
            && let Some(end) = rest.find('>')
        {
            match &rest[1..end] {
                "b" => bold += 1,
                "/b" => bold = bold.saturating_sub(1),
                "i" => italic += 1,
                "/i" => italic = italic.saturating_sub(1),
                "code" => code += 1,
                "/code" => code = code.saturating_sub(1),
                "br/" => {
                    items.push(Item::Break);
                    joinable = false;
                }
                _ => {}
            }
            rest = &rest[end + 1..];
            continue;
        }

        let (ch, consumed) = if c == '&' {
            decode_entity(rest)
        } else {
            (c, c.len_utf8())
        };
        rest = &rest[consumed..];

        let font = Font::select(base_bold || bold > 0, italic > 0, code > 0);
        if ch.is_whitespace() && ch != '\u{a0}' {
            if !matches!(items.last(), Some(Item::Space(_)) | Some(Item::Break) | None) {
                items.push(Item::Space(font));
            }
            joinable = false;
            continue;
        }

        let byte = encode_winansi(ch);
        match items.last_mut() {
            Some(Item::Word(spans)) if joinable => match spans.last_mut() {
                Some(span) if span.font == font => span.bytes.push(byte),
                _ => spans.push(Span {
                    font,
                    bytes: vec![byte],
                }),
            },
            _ => items.push(Item::Word(vec![Span {
                font,
                bytes: vec![byte],
            }])),
        }
        joinable = true;
    }

    items
}

/// Decode the entity at the start of `s`; a bare `&` stands for itself.
fn decode_entity(s: &str) -> (char, usize) {
    let Some(end) = s.find(';').filter(|&end| end <= 8) else {
        return ('&', 1);
    };
    let ch = match &s[1..end] {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" | "#39" => '\'',
        _ => return ('&', 1),
    };
    (ch, end + 1)
}

#[derive(Debug, Default)]
struct Line {
    spans: Vec<Span>,
    width: f32,
    spaces: usize,
    /// Ended by an explicit break rather than running out of room.
    forced: bool,
}

impl Line {
    fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    fn push_span(&mut self, font: Font, bytes: &[u8], size: f32) {
        self.width += font.text_width(bytes, size);
        self.spaces += bytes.iter().filter(|&&b| b == b' ').count();
        match self.spans.last_mut() {
            Some(span) if span.font == font => span.bytes.extend_from_slice(bytes),
            _ => self.spans.push(Span {
                font,
                bytes: bytes.to_vec(),
            }),
        }
    }
}

fn word_width(spans: &[Span], size: f32) -> f32 {
    spans.iter().map(|s| s.font.text_width(&s.bytes, size)).sum()
}

/// Greedy line breaking.
fn break_lines(items: &[Item], available: f32, size: f32) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line = Line::default();
    let mut pending_space: Option<Font> = None;

    for item in items {
        match item {
            Item::Space(font) => {
                if !line.is_empty() {
                    pending_space = Some(*font);
                }
            }
            Item::Break => {
                line.forced = true;
                lines.push(std::mem::take(&mut line));
                pending_space = None;
            }
            Item::Word(spans) => {
                let width = word_width(spans, size);
                let space_width = pending_space
                    .map(|f| f.text_width(b" ", size))
                    .unwrap_or(0.0);

                if !line.is_empty() && line.width + space_width + width > available {
                    lines.push(std::mem::take(&mut line));
                    pending_space = None;
                } else if let Some(font) = pending_space.take() {
                    line.push_span(font, b" ", size);
                }

                if line.is_empty() && width > available {
                    split_word(spans, available, size, &mut line, &mut lines);
                } else {
                    for span in spans {
                        line.push_span(span.font, &span.bytes, size);
                    }
                }
            }
        }
    }

    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

/// Set an over-long word across as many lines as it needs.
fn split_word(
    spans: &[Span],
    available: f32,
    size: f32,
    line: &mut Line,
    lines: &mut Vec<Line>,
) {
    for span in spans {
        for &byte in &span.bytes {
            let width = span.font.text_width(&[byte], size);
            if !line.is_empty() && line.width + width > available {
                lines.push(std::mem::take(line));
            }
            line.push_span(span.font, &[byte], size);
        }
    }
}

/// Unescape preformatted markup and wrap it at `columns` characters.
fn wrap_preformatted(markup: &str, columns: usize) -> Vec<Vec<u8>> {
    let mut text = String::with_capacity(markup.len());
    let mut rest = markup;
    while let Some(c) = rest.chars().next() {
        let (ch, consumed) = if c == '&' {
            decode_entity(rest)
        } else {
            (c, c.len_utf8())
        };
        text.push(ch);
        rest = &rest[consumed..];
    }

    let mut lines = Vec::new();
    for raw in text.lines() {
        let mut line = Vec::new();
        for c in raw.chars() {
            if c == '\t' {
                let pad = TAB_WIDTH - line.len() % TAB_WIDTH;
                line.extend(std::iter::repeat_n(b' ', pad));
            } else {
                line.push(encode_winansi(c));
            }
        }
        if line.is_empty() {
            lines.push(line);
            continue;
        }
        for chunk in line.chunks(columns) {
            lines.push(chunk.to_vec());
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> TextStyle {
        TextStyle {
            font: Font::Regular,
            size: 11.0,
            leading: 16.0,
            color: Rgb::BLACK,
            space_before: 0.0,
            space_after: 8.0,
            indent: 0.0,
            align: Align::Justify,
        }
    }

    fn line_text(line: &Line) -> String {
        line.spans
            .iter()
            .map(|s| String::from_utf8_lossy(&s.bytes).into_owned())
            .collect()
    }

    #[test]
    fn test_tokenize_styles() {
        let items = tokenize("a <b>bold</b>ness &amp; <code>x&lt;y</code>", Font::Regular);
        assert_eq!(items.len(), 7);
        match &items[2] {
            Item::Word(spans) => {
                assert_eq!(spans.len(), 2);
                assert_eq!(spans[0].font, Font::Bold);
                assert_eq!(spans[0].bytes, b"bold");
                assert_eq!(spans[1].font, Font::Regular);
                assert_eq!(spans[1].bytes, b"ness");
            }
            other => panic!("unexpected item {other:?}"),
        }
        assert_eq!(
            items[4],
            Item::Word(vec![Span {
                font: Font::Regular,
                bytes: b"&".to_vec()
            }])
        );
        assert_eq!(
            items[6],
            Item::Word(vec![Span {
                font: Font::Mono,
                bytes: b"x<y".to_vec()
            }])
        );
    }

    #[test]
    fn test_break_lines_fits_width() {
        let items = tokenize("the quick brown fox jumps over the lazy dog", Font::Regular);
        let lines = break_lines(&items, 60.0, 11.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.width <= 60.0 + 0.01, "{} too wide", line_text(line));
        }
        let joined: Vec<_> = lines.iter().map(line_text).collect();
        assert_eq!(joined.join(" "), "the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn test_long_word_is_split() {
        let items = tokenize(&"x".repeat(200), Font::Regular);
        let lines = break_lines(&items, 100.0, 11.0);
        assert!(lines.len() > 1);
        let total: usize = lines.iter().map(|l| line_text(l).len()).sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn test_forced_break() {
        let items = tokenize("one<br/>two", Font::Regular);
        let lines = break_lines(&items, 500.0, 11.0);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].forced);
        assert_eq!(line_text(&lines[1]), "two");
    }

    #[test]
    fn test_text_flows_onto_new_pages() {
        let mut layout = Layout::new();
        let paragraph = "word ".repeat(400);
        for _ in 0..5 {
            layout.text(&paragraph, &body());
        }
        let pages = layout.finish();
        assert!(pages.len() > 1);
        for page in &pages {
            for op in page {
                if let Op::Text { y, .. } = op {
                    assert!(*y >= BOTTOM - 0.01 && *y <= TOP);
                }
            }
        }
    }

    #[test]
    fn test_page_break_is_lazy() {
        let mut layout = Layout::new();
        layout.text("a", &body());
        layout.page_break();
        layout.page_break();
        assert_eq!(layout.finish().len(), 1);

        let mut layout = Layout::new();
        layout.text("a", &body());
        layout.page_break();
        layout.text("b", &body());
        assert_eq!(layout.finish().len(), 2);
    }

    #[test]
    fn test_code_block_background_and_wrapping() {
        let style = CodeStyle {
            size: 9.0,
            leading: 12.0,
            color: Rgb::hex(0xe6edf3),
            background: Rgb::hex(0x21262d),
            space_before: 10.0,
            space_after: 10.0,
            indent: 20.0,
            padding: 6.0,
        };
        let mut layout = Layout::new();
        layout.code(&format!("{}\n\tx &lt; y", "a".repeat(120)), &style);
        let pages = layout.finish();

        assert!(matches!(pages[0][0], Op::Rect { .. }));
        let texts: Vec<_> = pages[0]
            .iter()
            .filter_map(|op| match op {
                Op::Text { spans, .. } => Some(spans[0].bytes.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[2], b"    x < y");
    }

    #[test]
    fn test_rgb_hex() {
        let c = Rgb::hex(0xff0000);
        assert_eq!(c, Rgb(1.0, 0.0, 0.0));
    }
}
