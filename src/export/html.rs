//! Single-document HTML exporter.
//!
//! Every chapter becomes a `<section>` in one page, preceded by a table of
//! contents; intra-book links point at section anchors.

use std::io::{Seek, Write};

use crate::book::Manuscript;
use crate::error::Result;
use crate::markdown::{LinkStyle, build_chapters, encode_segment};

use super::{Exporter, escape_xml};

const STYLE: &str = "\
body { font-family: -apple-system, BlinkMacSystemFont, \"Segoe UI\", Helvetica, Arial, sans-serif; \
max-width: 48em; margin: 0 auto; padding: 1em 2em; line-height: 1.6; }
img.cover { display: block; max-width: 100%; margin: 1em auto; }
nav.toc ol { padding-left: 1.5em; }
section.chapter { margin-top: 3em; }
pre { background: #f6f8fa; padding: 0.75em; overflow-x: auto; }
code { font-family: Menlo, Consolas, monospace; font-size: 0.9em; }
table { border-collapse: collapse; }
th, td { border: 1px solid #d0d7de; padding: 0.3em 0.6em; }
";

/// HTML exporter producing a self-contained document.
#[derive(Debug, Default)]
pub struct HtmlExporter;

impl HtmlExporter {
    pub fn new() -> Self {
        Self
    }
}

impl Exporter for HtmlExporter {
    fn export<W: Write + Seek>(&self, book: &Manuscript, writer: &mut W) -> Result<()> {
        writer.write_all(render_document(book).as_bytes())?;
        Ok(())
    }
}

fn render_document(book: &Manuscript) -> String {
    let chapters = build_chapters(book, LinkStyle::Anchor);
    let title = escape_xml(&book.title);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", title));
    html.push_str(&format!("<style>\n{}</style>\n", STYLE));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1 class=\"book-title\">{}</h1>\n", title));

    if let Some(ref cover) = book.cover {
        html.push_str(&format!(
            "<img class=\"cover\" src=\"{}\" alt=\"Cover\">\n",
            cover.to_data_uri()
        ));
    }

    html.push_str("<nav class=\"toc\" id=\"toc\">\n<h2>Table of Contents</h2>\n<ol>\n");
    for chapter in &chapters {
        html.push_str(&format!(
            "<li><a href=\"#{}\">{}</a></li>\n",
            escape_xml(&encode_segment(&chapter.slug)),
            escape_xml(&chapter.title)
        ));
    }
    html.push_str("</ol>\n</nav>\n");

    for chapter in &chapters {
        html.push_str(&format!(
            "<section class=\"chapter\" id=\"{}\">\n{}</section>\n",
            escape_xml(&encode_segment(&chapter.slug)),
            chapter.html
        ));
    }

    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::Cover;

    #[test]
    fn test_sections_follow_toc_order() {
        let book = Manuscript::new("Notes & Things")
            .with_page("01_intro.md", "# Intro\nSee [g](./02_grammar.md)")
            .with_page("02_grammar.md", "# Grammar");
        let html = render_document(&book);

        assert!(html.contains("<title>Notes &amp; Things</title>"));
        let toc_intro = html.find("href=\"#01_intro\"").unwrap();
        let toc_grammar = html.find("href=\"#02_grammar\">02 Grammar").unwrap();
        assert!(toc_intro < toc_grammar);

        let sec_intro = html.find("id=\"01_intro\"").unwrap();
        let sec_grammar = html.find("id=\"02_grammar\"").unwrap();
        assert!(sec_intro < sec_grammar);
        assert!(html[sec_intro..sec_grammar].contains("href=\"#02_grammar\""));
    }

    #[test]
    fn test_cover_embedded_as_data_uri() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10];
        let cover = Cover::from_bytes(jpeg.to_vec()).unwrap();
        let book = Manuscript::new("T")
            .with_page("a.md", "x")
            .with_cover(Some(cover));
        let html = render_document(&book);
        assert!(html.contains("src=\"data:image/jpeg;base64,"));
    }
}
