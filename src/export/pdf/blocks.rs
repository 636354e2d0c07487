//! Block extraction from rendered chapter HTML.
//!
//! A small state machine walks the HTML events and groups text into the
//! blocks the PDF layout knows how to set: headings, paragraphs,
//! preformatted code, and list items. Inline emphasis survives as a light
//! markup (`<b>`, `<i>`, `<code>`, `<br/>`) over escaped text.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};

/// Kind of block a piece of chapter text is set as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Heading level 1-3; deeper headings are folded into level 3.
    Heading(u8),
    Paragraph,
    Preformatted,
    ListItem,
}

/// One block of chapter text.
///
/// `markup` holds text with `&`, `<` and `>` escaped, plus the inline tags
/// `<b>`, `<i>`, `<code>` and `<br/>`. Preformatted blocks keep their
/// line breaks and contain no tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub markup: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Heading(u8),
    Paragraph,
    Preformatted,
    ListItem,
}

impl State {
    fn kind(self) -> Option<BlockKind> {
        match self {
            State::Idle => None,
            State::Heading(level) => Some(BlockKind::Heading(level)),
            State::Paragraph => Some(BlockKind::Paragraph),
            State::Preformatted => Some(BlockKind::Preformatted),
            State::ListItem => Some(BlockKind::ListItem),
        }
    }
}

struct Extractor {
    state: State,
    buf: String,
    has_text: bool,
    list_depth: usize,
    table_cells: usize,
    blocks: Vec<Block>,
}

impl Extractor {
    fn new() -> Self {
        Self {
            state: State::Idle,
            buf: String::new(),
            has_text: false,
            list_depth: 0,
            table_cells: 0,
            blocks: Vec::new(),
        }
    }

    /// Close the current block and move to `next`.
    fn transition(&mut self, next: State) {
        if let Some(kind) = self.state.kind()
            && self.has_text
        {
            let markup = if kind == BlockKind::Preformatted {
                self.buf.trim_end_matches(['\n', '\r']).to_string()
            } else {
                trim_markup(&self.buf)
            };
            self.blocks.push(Block { kind, markup });
        }
        self.buf.clear();
        self.has_text = false;
        self.state = next;
    }

    /// State to return to once a block inside a list closes.
    fn resting_state(&self) -> State {
        if self.list_depth > 0 {
            State::ListItem
        } else {
            State::Idle
        }
    }

    fn start(&mut self, name: &[u8]) {
        match name {
            b"h1" => self.transition(State::Heading(1)),
            b"h2" => self.transition(State::Heading(2)),
            b"h3" | b"h4" | b"h5" | b"h6" => self.transition(State::Heading(3)),
            b"p" | b"blockquote" | b"div" => {
                if self.state != State::ListItem {
                    self.transition(State::Paragraph);
                }
            }
            b"pre" => self.transition(State::Preformatted),
            b"li" => {
                self.list_depth += 1;
                self.transition(State::ListItem);
            }
            b"tr" => {
                self.table_cells = 0;
                self.transition(State::Paragraph);
            }
            b"td" | b"th" => {
                if self.table_cells > 0 {
                    let len = self.buf.trim_end().len();
                    self.buf.truncate(len);
                    self.buf.push_str(" | ");
                }
                self.table_cells += 1;
            }
            b"br" => self.line_break(),
            _ if self.state == State::Preformatted => {}
            b"strong" | b"b" => self.buf.push_str("<b>"),
            b"em" | b"i" => self.buf.push_str("<i>"),
            b"code" | b"kbd" | b"samp" => self.buf.push_str("<code>"),
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"h1" | b"h2" | b"h3" | b"h4" | b"h5" | b"h6" | b"pre" | b"tr" => {
                let next = self.resting_state();
                self.transition(next);
            }
            b"p" | b"blockquote" | b"div" => {
                if self.state != State::ListItem {
                    let next = self.resting_state();
                    self.transition(next);
                }
            }
            b"li" => {
                self.list_depth = self.list_depth.saturating_sub(1);
                let next = self.resting_state();
                self.transition(next);
            }
            _ if self.state == State::Preformatted => {}
            b"strong" | b"b" => self.buf.push_str("</b>"),
            b"em" | b"i" => self.buf.push_str("</i>"),
            b"code" | b"kbd" | b"samp" => self.buf.push_str("</code>"),
            _ => {}
        }
    }

    fn line_break(&mut self) {
        match self.state {
            State::Preformatted => self.buf.push('\n'),
            State::Idle => {}
            _ => self.buf.push_str("<br/>"),
        }
    }

    fn text(&mut self, text: &str) {
        if self.state == State::Idle {
            if text.trim().is_empty() {
                return;
            }
            self.state = State::Paragraph;
        }
        if !text.trim().is_empty() {
            self.has_text = true;
        }

        if self.state == State::Preformatted {
            escape_into(&mut self.buf, text);
            return;
        }

        let mut last_space = self.buf.ends_with(' ');
        for c in text.chars() {
            if c.is_whitespace() {
                if !last_space {
                    self.buf.push(' ');
                    last_space = true;
                }
            } else {
                push_escaped(&mut self.buf, c);
                last_space = false;
            }
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.transition(State::Idle);
        self.blocks
    }
}

/// Group chapter HTML into blocks.
///
/// Markup that is not well-formed XML (stray end tags, unclosed void
/// elements) is tolerated; malformed syntax is reported as a rendering
/// error.
pub fn extract_blocks(html: &str) -> Result<Vec<Block>> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut extractor = Extractor::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                extractor.start(&name.as_ref().to_ascii_lowercase());
            }
            Ok(Event::Empty(e)) => {
                let name = e.name().as_ref().to_ascii_lowercase();
                if name == b"br" {
                    extractor.line_break();
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                extractor.end(&name.as_ref().to_ascii_lowercase());
            }
            Ok(Event::Text(e)) => {
                extractor.text(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::CData(e)) => {
                extractor.text(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::GeneralRef(e)) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    extractor.text(&resolved);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Render(format!(
                    "chapter HTML error at position {}: {}",
                    reader.error_position(),
                    e
                )));
            }
        }
    }

    Ok(extractor.finish())
}

/// Resolve an entity reference to its text.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        "nbsp" => return Some("\u{a0}".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x").or(entity.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };
    code.and_then(char::from_u32).map(|c| c.to_string())
}

fn push_escaped(buf: &mut String, c: char) {
    match c {
        '&' => buf.push_str("&amp;"),
        '<' => buf.push_str("&lt;"),
        '>' => buf.push_str("&gt;"),
        _ => buf.push(c),
    }
}

fn escape_into(buf: &mut String, text: &str) {
    for c in text.chars() {
        push_escaped(buf, c);
    }
}

/// Trim whitespace around inline markup, including spaces next to a
/// leading or trailing `<br/>`.
fn trim_markup(markup: &str) -> String {
    let mut s = markup.trim();
    loop {
        let before = s.len();
        s = s.trim_start_matches("<br/>").trim_end_matches("<br/>").trim();
        if s.len() == before {
            break;
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::render_markdown;

    fn kinds(blocks: &[Block]) -> Vec<BlockKind> {
        blocks.iter().map(|b| b.kind).collect()
    }

    #[test]
    fn test_headings_paragraphs_and_code() {
        let html = render_markdown("# Title\n\nSome *soft* **bold** text.\n\n## Sub\n\n```\nlet x = 1;\n  indented\n```\n\n#### Deep\n");
        let blocks = extract_blocks(&html).unwrap();

        assert_eq!(
            kinds(&blocks),
            [
                BlockKind::Heading(1),
                BlockKind::Paragraph,
                BlockKind::Heading(2),
                BlockKind::Preformatted,
                BlockKind::Heading(3),
            ]
        );
        assert_eq!(blocks[0].markup, "Title");
        assert_eq!(blocks[1].markup, "Some <i>soft</i> <b>bold</b> text.");
        assert_eq!(blocks[3].markup, "let x = 1;\n  indented");
        assert_eq!(blocks[4].markup, "Deep");
    }

    #[test]
    fn test_text_is_escaped() {
        let html = render_markdown("Use `a < b && c` & more\n");
        let blocks = extract_blocks(&html).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0].markup,
            "Use <code>a &lt; b &amp;&amp; c</code> &amp; more"
        );
    }

    #[test]
    fn test_escaped_text_in_code_block() {
        let html = render_markdown("```\nif a < b && c > d {}\n```\n");
        let blocks = extract_blocks(&html).unwrap();
        assert_eq!(blocks[0].kind, BlockKind::Preformatted);
        assert_eq!(blocks[0].markup, "if a &lt; b &amp;&amp; c &gt; d {}");
    }

    #[test]
    fn test_list_items_tight_and_loose() {
        let html = render_markdown("- one\n- two\n\n1. first\n\n2. second\n");
        let blocks = extract_blocks(&html).unwrap();
        let items: Vec<_> = blocks
            .iter()
            .filter(|b| b.kind == BlockKind::ListItem)
            .map(|b| b.markup.as_str())
            .collect();
        assert_eq!(items, ["one", "two", "first", "second"]);
        assert_eq!(blocks.len(), 4);
    }

    #[test]
    fn test_nested_list_keeps_parent_text() {
        let html = "<ul><li>parent<ul><li>child</li></ul>tail</li></ul>";
        let blocks = extract_blocks(html).unwrap();
        let markups: Vec<_> = blocks.iter().map(|b| b.markup.as_str()).collect();
        assert_eq!(markups, ["parent", "child", "tail"]);
        assert!(blocks.iter().all(|b| b.kind == BlockKind::ListItem));
    }

    #[test]
    fn test_links_are_flattened() {
        let html = render_markdown("See [grammar](./02_grammar.md) now.\n");
        let blocks = extract_blocks(&html).unwrap();
        assert_eq!(blocks[0].markup, "See grammar now.");
    }

    #[test]
    fn test_table_rows_become_paragraphs() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n");
        let blocks = extract_blocks(&html).unwrap();
        let markups: Vec<_> = blocks.iter().map(|b| b.markup.as_str()).collect();
        assert_eq!(markups, ["a | b", "1 | 2"]);
    }

    #[test]
    fn test_line_breaks_and_entities() {
        let html = "<p>one<br />two &amp; &#x263A;</p><p>  </p>";
        let blocks = extract_blocks(html).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].markup, "one<br/>two &amp; \u{263A}");
    }

    #[test]
    fn test_tolerates_unclosed_void_elements() {
        let html = "<p>a<br>b</p><hr><p>c</p>";
        let blocks = extract_blocks(html).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].markup, "c");
    }
}
