//! End-to-end compilation of manuscripts into each artifact format.

use std::io::{Cursor, Read};

use jugaadpress::export::{Format, book_identifier, compile};
use jugaadpress::{Error, Manuscript};
use proptest::prelude::*;

fn sample_book() -> Manuscript {
    let mut book = Manuscript::new("Japanese")
        .with_page("02_grammar.md", "# Particles\n\n- wa\n- ga\n\nBack to [intro](./01_intro.md).")
        .with_page("01_intro.md", "# Intro\n\nSee [particles](./02_grammar.md#wa).");
    book.sort_pages();
    book
}

fn zip_entry(data: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(data)).expect("valid zip");
    let mut file = archive.by_name(name).expect("entry present");
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    text
}

#[test]
fn test_html_links_become_anchors() {
    let artifact = compile(&sample_book(), Format::Html).unwrap();
    assert_eq!(artifact.content_type(), "text/html; charset=utf-8");
    let html = String::from_utf8(artifact.data).unwrap();

    assert!(html.contains(r##"href="#02_grammar""##));
    assert!(html.contains(r##"href="#01_intro""##));
    assert!(!html.contains("./02_grammar.md"));
    assert!(html.find(r#"id="01_intro""#).unwrap() < html.find(r#"id="02_grammar""#).unwrap());
}

#[test]
fn test_epub_container_layout() {
    let artifact = compile(&sample_book(), Format::Epub).unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(artifact.data.as_slice())).unwrap();

    // mimetype must be the first, uncompressed entry
    let first = archive.by_index(0).unwrap();
    assert_eq!(first.name(), "mimetype");
    assert_eq!(first.compression(), zip::CompressionMethod::Stored);
    drop(first);

    for name in [
        "META-INF/container.xml",
        "OEBPS/content.opf",
        "OEBPS/toc.ncx",
        "OEBPS/01_intro.xhtml",
        "OEBPS/02_grammar.xhtml",
    ] {
        assert!(archive.by_name(name).is_ok(), "missing {name}");
    }

    let intro = zip_entry(&artifact.data, "OEBPS/01_intro.xhtml");
    assert!(intro.contains(r#"href="02_grammar.xhtml#h-wa""#));

    let opf = zip_entry(&artifact.data, "OEBPS/content.opf");
    assert!(opf.contains(&book_identifier("Japanese")));
    assert!(opf.find("01_intro").unwrap() < opf.find("02_grammar").unwrap());
}

#[test]
fn test_epub_is_reproducible() {
    let first = compile(&sample_book(), Format::Epub).unwrap();
    let second = compile(&sample_book(), Format::Epub).unwrap();
    assert_eq!(
        zip_entry(&first.data, "OEBPS/content.opf"),
        zip_entry(&second.data, "OEBPS/content.opf")
    );
}

#[test]
fn test_pdf_header() {
    let artifact = compile(&sample_book(), Format::Pdf).unwrap();
    assert_eq!(artifact.content_type(), "application/pdf");
    assert!(artifact.data.starts_with(b"%PDF-"));
    assert!(artifact.filename("Japanese").ends_with(".pdf"));
}

#[test]
fn test_empty_book_has_no_content() {
    for format in [Format::Html, Format::Epub, Format::Pdf] {
        let result = compile(&Manuscript::new("Empty"), format);
        assert!(matches!(result, Err(Error::NoContent)));
    }
}

#[test]
fn test_unknown_link_left_alone() {
    let mut book = Manuscript::new("Links")
        .with_page("a.md", "[gone](./missing.md) and [web](https://example.com/x.md)");
    book.sort_pages();
    let html = String::from_utf8(compile(&book, Format::Html).unwrap().data).unwrap();
    assert!(html.contains(r#"href="./missing.md""#));
    assert!(html.contains(r#"href="https://example.com/x.md""#));
}

fn assert_well_formed(name: &str, xml: &str) {
    let mut reader = quick_xml::Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("{name} is not well-formed: {e}\n{xml}"),
        }
    }
}

#[test]
fn test_epub_documents_are_well_formed_with_raw_html() {
    let mut book = Manuscript::new("Raw")
        .with_page("a.md", "line one<br>line two\n\n<img src=\"x.png\">\n\n<p>open <b>bold\n")
        .with_page("b.md", "# B\n\n<div><span>unclosed</div> &nbsp; [a](./a.md)\n");
    book.sort_pages();
    let artifact = compile(&book, Format::Epub).unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(artifact.data.as_slice())).unwrap();
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let mut checked = 0;
    for name in names.iter().filter(|n| n.ends_with(".xhtml") || n.ends_with(".opf") || n.ends_with(".ncx")) {
        let mut text = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut text).unwrap();
        assert_well_formed(name, &text);
        checked += 1;
    }
    assert!(checked >= 4, "checked {checked} documents");

    let a = zip_entry(&artifact.data, "OEBPS/a.xhtml");
    assert!(a.contains("line one<br/>line two"), "{a}");
    assert!(a.contains("<img src=\"x.png\"/>"), "{a}");
}

#[test]
fn test_code_samples_keep_their_links() {
    let mut book = Manuscript::new("Code")
        .with_page("a.md", "```html\n<a href='./b.md'>next</a>\n```\n\nInline `href='./b.md'` and [b](./b.md).\n")
        .with_page("b.md", "B\n");
    book.sort_pages();
    let html = String::from_utf8(compile(&book, Format::Html).unwrap().data).unwrap();

    assert!(html.contains("&lt;a href='./b.md'&gt;next&lt;/a&gt;"), "{html}");
    assert!(html.contains("<code>href='./b.md'</code>"), "{html}");
    assert!(html.contains(r##"<a href="#b">b</a>"##), "{html}");
}

#[test]
fn test_chapter_anchor_is_the_only_id() {
    let mut book = Manuscript::new("Ids").with_page("intro.md", "# Intro\n\nHello\n");
    book.sort_pages();
    let html = String::from_utf8(compile(&book, Format::Html).unwrap().data).unwrap();
    assert_eq!(html.matches(r#"id="intro""#).count(), 1, "{html}");

    let epub = compile(&book, Format::Epub).unwrap();
    let chapter = zip_entry(&epub.data, "OEBPS/intro.xhtml");
    assert_eq!(chapter.matches(r#"id="intro""#).count(), 1, "{chapter}");
}

proptest! {
    #[test]
    fn prop_sections_follow_filename_order(stems in prop::collection::btree_set("p_[a-z0-9]{1,8}", 1..8)) {
        let mut book = Manuscript::new("Prop");
        // Insert in reverse to exercise sorting
        for stem in stems.iter().rev() {
            book.add_page(format!("{stem}.md"), format!("# {stem}\n\nbody"));
        }
        book.sort_pages();

        let html = String::from_utf8(compile(&book, Format::Html).unwrap().data).unwrap();
        let positions: Vec<usize> = stems
            .iter()
            .map(|s| html.find(&format!("id=\"{s}\"")).expect("section present"))
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn prop_page_links_always_resolve(stems in prop::collection::btree_set("p_[a-z0-9]{1,8}", 2..6)) {
        let stems: Vec<String> = stems.into_iter().collect();
        let mut book = Manuscript::new("Links");
        for (i, stem) in stems.iter().enumerate() {
            let next = &stems[(i + 1) % stems.len()];
            book.add_page(format!("{stem}.md"), format!("[next](./{next}.md)"));
        }
        book.sort_pages();

        let html = String::from_utf8(compile(&book, Format::Html).unwrap().data).unwrap();
        prop_assert!(!html.contains(".md\""));
        for stem in &stems {
            let anchor = format!("href=\"#{stem}\"");
            prop_assert!(html.contains(&anchor));
        }
    }
}
