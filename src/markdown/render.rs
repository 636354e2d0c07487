//! Markdown to HTML conversion.

use comrak::{Options, markdown_to_html};

/// Prefix of heading ids, keeping them apart from chapter anchors.
pub const HEADING_ID_PREFIX: &str = "h-";

/// Render a page's markdown to an HTML fragment.
///
/// Enables the extensions pages are written with: fenced code (core
/// CommonMark), tables, heading anchors, strikethrough, autolinks and task
/// lists. Raw HTML in a page is passed through.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.header_ids = Some(HEADING_ID_PREFIX.to_string());
    options.render.r#unsafe = true;

    markdown_to_html(markdown, &options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_code() {
        let html = render_markdown("```rust\nfn main() {}\n```\n");
        assert!(html.contains("<pre>"), "{html}");
        assert!(html.contains("fn main() {}"));
    }

    #[test]
    fn test_tables() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"), "{html}");
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn test_header_ids() {
        let html = render_markdown("# Verb Forms\n");
        assert!(html.contains("id=\"h-verb-forms\""), "{html}");
        assert!(!html.contains("id=\"verb-forms\""), "{html}");
    }

    #[test]
    fn test_text_is_escaped() {
        let html = render_markdown("a < b & c\n");
        assert!(html.contains("a &lt; b &amp; c"), "{html}");
    }
}
