//! EPUB exporter.
//!
//! Creates EPUB 3 files (with an EPUB 2 NCX for older readers) from a
//! manuscript. Each page becomes its own content document named after the
//! page stem, so `./02_grammar.md` links land on `02_grammar.xhtml`.

use std::collections::HashSet;
use std::io::{Seek, Write};

use uuid::Uuid;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::book::Manuscript;
use crate::error::Result;
use crate::markdown::{Chapter, LinkStyle, build_chapters, chapter_href};

use super::{Exporter, escape_xml};

/// Fixed modification stamp; identical input yields identical containers.
const MODIFIED: &str = "2024-01-01T00:00:00Z";

const LANGUAGE: &str = "en";
const CREATOR: &str = "JugaadPress User";

/// Configuration for EPUB export.
#[derive(Debug, Clone, Default)]
pub struct EpubConfig {
    /// Compression level for deflate (0-9, default 6).
    pub compression_level: Option<u32>,
}

/// EPUB format exporter.
///
/// # Example
///
/// ```no_run
/// use jugaadpress::Manuscript;
/// use jugaadpress::export::{EpubExporter, Exporter};
/// use std::fs::File;
///
/// let book = Manuscript::new("Notes").with_page("01_intro.md", "# Intro");
/// let mut file = File::create("notes.epub")?;
/// EpubExporter::new().export(&book, &mut file)?;
/// # Ok::<(), jugaadpress::Error>(())
/// ```
pub struct EpubExporter {
    config: EpubConfig,
}

impl EpubExporter {
    /// Create a new exporter with default configuration.
    pub fn new() -> Self {
        Self {
            config: EpubConfig::default(),
        }
    }

    /// Configure the exporter with custom settings.
    pub fn with_config(mut self, config: EpubConfig) -> Self {
        self.config = config;
        self
    }
}

impl Default for EpubExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter for EpubExporter {
    fn export<W: Write + Seek>(&self, book: &Manuscript, writer: &mut W) -> Result<()> {
        let chapters = build_chapters(book, LinkStyle::Xhtml);
        let identifier = book_identifier(&book.title);

        let stems: HashSet<&str> = chapters.iter().map(|c| c.slug.as_str()).collect();
        let nav_name = unique_doc_name("nav", &stems);
        let cover_name = unique_doc_name("cover", &stems);

        let mut zip = ZipWriter::new(writer);

        let compression_level = self.config.compression_level.unwrap_or(6);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(compression_level as i64));

        // 1. mimetype (must be first, uncompressed)
        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip")?;

        // 2. container.xml
        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(CONTAINER_XML)?;

        // 3. Manifest and spine
        let mut manifest = vec![
            ManifestItem::new("nav", &format!("{nav_name}.xhtml"), "application/xhtml+xml")
                .with_properties("nav"),
            ManifestItem::new("css", "style.css", "text/css"),
        ];
        let mut spine = Vec::new();

        if let Some(ref cover) = book.cover {
            let image_href = format!("{}.{}", cover_name, cover.kind.extension());
            manifest.push(
                ManifestItem::new("cover-image", &image_href, cover.kind.media_type())
                    .with_properties("cover-image"),
            );
            manifest.push(ManifestItem::new(
                "cover",
                &format!("{cover_name}.xhtml"),
                "application/xhtml+xml",
            ));
            spine.push("cover".to_string());
        }
        spine.push("nav".to_string());

        for (i, chapter) in chapters.iter().enumerate() {
            let id = format!("chapter_{}", i);
            manifest.push(ManifestItem::new(
                &id,
                &chapter_href(&chapter.slug),
                "application/xhtml+xml",
            ));
            spine.push(id);
        }

        // 4. content.opf
        let opf = generate_opf(book, &identifier, &manifest, &spine);
        zip.start_file("OEBPS/content.opf", deflated)?;
        zip.write_all(opf.as_bytes())?;

        // 5. toc.ncx
        let ncx = generate_ncx(&book.title, &identifier, &chapters);
        zip.start_file("OEBPS/toc.ncx", deflated)?;
        zip.write_all(ncx.as_bytes())?;

        // 6. nav.xhtml
        zip.start_file(format!("OEBPS/{nav_name}.xhtml"), deflated)?;
        zip.write_all(generate_nav(&book.title, &chapters).as_bytes())?;

        // 7. Stylesheet
        zip.start_file("OEBPS/style.css", deflated)?;
        zip.write_all(STYLE_CSS)?;

        // 8. Cover
        if let Some(ref cover) = book.cover {
            let image_href = format!("{}.{}", cover_name, cover.kind.extension());
            zip.start_file(format!("OEBPS/{image_href}"), stored)?;
            zip.write_all(&cover.data)?;

            zip.start_file(format!("OEBPS/{cover_name}.xhtml"), deflated)?;
            zip.write_all(generate_cover_page(&book.title, &image_href).as_bytes())?;
        }

        // 9. Chapters
        for chapter in &chapters {
            zip.start_file(format!("OEBPS/{}.xhtml", chapter.slug), deflated)?;
            zip.write_all(generate_chapter(chapter).as_bytes())?;
        }

        zip.finish()?;
        Ok(())
    }
}

/// Deterministic `urn:uuid` identifier for a book title.
///
/// Name-based (version 5) UUID, so recompiling the same book keeps the
/// identifier readers use to match it with an earlier copy.
///
/// ```
/// use jugaadpress::export::book_identifier;
///
/// assert_eq!(book_identifier("Notes"), book_identifier("Notes"));
/// assert_ne!(book_identifier("Notes"), book_identifier("Other"));
/// assert!(book_identifier("Notes").starts_with("urn:uuid:"));
/// ```
pub fn book_identifier(title: &str) -> String {
    format!(
        "urn:uuid:{}",
        Uuid::new_v5(&Uuid::NAMESPACE_URL, title.as_bytes())
    )
}

/// Pick a name for a generated document that no chapter already uses.
fn unique_doc_name(base: &str, stems: &HashSet<&str>) -> String {
    if !stems.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|name| !stems.contains(name.as_str()))
        .unwrap_or_else(|| base.to_string())
}

/// Container.xml template.
const CONTAINER_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const STYLE_CSS: &[u8] = b"body { font-family: serif; line-height: 1.5; margin: 0 5%; }
h1, h2, h3 { font-family: sans-serif; line-height: 1.2; }
pre { white-space: pre-wrap; font-size: 0.85em; background: #f4f4f4; padding: 0.5em; }
code { font-family: monospace; }
table { border-collapse: collapse; }
th, td { border: 1px solid #999; padding: 0.2em 0.5em; }
div.cover { text-align: center; }
div.cover img { max-width: 100%; max-height: 95vh; }
";

struct ManifestItem {
    id: String,
    href: String,
    media_type: String,
    properties: Option<&'static str>,
}

impl ManifestItem {
    fn new(id: &str, href: &str, media_type: &str) -> Self {
        Self {
            id: id.to_string(),
            href: href.to_string(),
            media_type: media_type.to_string(),
            properties: None,
        }
    }

    fn with_properties(mut self, properties: &'static str) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// Generate content.opf.
fn generate_opf(
    book: &Manuscript,
    identifier: &str,
    manifest: &[ManifestItem],
    spine_refs: &[String],
) -> String {
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
    );
    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        escape_xml(identifier)
    ));
    opf.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        escape_xml(&book.title)
    ));
    opf.push_str(&format!("    <dc:language>{}</dc:language>\n", LANGUAGE));
    opf.push_str(&format!("    <dc:creator>{}</dc:creator>\n", CREATOR));
    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        MODIFIED
    ));
    if book.cover.is_some() {
        // EPUB 2 readers look for this instead of the manifest property
        opf.push_str("    <meta name=\"cover\" content=\"cover-image\"/>\n");
    }
    opf.push_str("  </metadata>\n");

    opf.push_str("  <manifest>\n");
    opf.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
    );
    for item in manifest {
        let properties = item
            .properties
            .map(|p| format!(" properties=\"{}\"", p))
            .unwrap_or_default();
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"{}/>\n",
            escape_xml(&item.id),
            escape_xml(&item.href),
            escape_xml(&item.media_type),
            properties
        ));
    }
    opf.push_str("  </manifest>\n");

    opf.push_str("  <spine toc=\"ncx\">\n");
    for id in spine_refs {
        opf.push_str(&format!("    <itemref idref=\"{}\"/>\n", escape_xml(id)));
    }
    opf.push_str("  </spine>\n");

    opf.push_str("</package>\n");
    opf
}

/// Generate toc.ncx with one flat navPoint per chapter.
fn generate_ncx(title: &str, identifier: &str, chapters: &[Chapter]) -> String {
    let mut ncx = String::new();

    ncx.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
"#,
    );
    ncx.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"{}\"/>\n",
        escape_xml(identifier)
    ));
    ncx.push_str(
        r#"    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
"#,
    );
    ncx.push_str(&format!(
        "  <docTitle>\n    <text>{}</text>\n  </docTitle>\n  <navMap>\n",
        escape_xml(title)
    ));

    for (i, chapter) in chapters.iter().enumerate() {
        let play_order = i + 1;
        ncx.push_str(&format!(
            "    <navPoint id=\"navPoint-{}\" playOrder=\"{}\">\n",
            play_order, play_order
        ));
        ncx.push_str(&format!(
            "      <navLabel><text>{}</text></navLabel>\n",
            escape_xml(&chapter.title)
        ));
        ncx.push_str(&format!(
            "      <content src=\"{}\"/>\n",
            escape_xml(&chapter_href(&chapter.slug))
        ));
        ncx.push_str("    </navPoint>\n");
    }

    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

fn xhtml_head(title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="style.css"/>
</head>
"#,
        lang = LANGUAGE,
        title = escape_xml(title)
    )
}

/// Generate the EPUB 3 navigation document.
fn generate_nav(title: &str, chapters: &[Chapter]) -> String {
    let mut nav = xhtml_head(title);
    nav.push_str("<body>\n  <nav epub:type=\"toc\" id=\"toc\">\n");
    nav.push_str("    <h1>Table of Contents</h1>\n    <ol>\n");
    for chapter in chapters {
        nav.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            escape_xml(&chapter_href(&chapter.slug)),
            escape_xml(&chapter.title)
        ));
    }
    nav.push_str("    </ol>\n  </nav>\n</body>\n</html>\n");
    nav
}

fn generate_cover_page(title: &str, image_href: &str) -> String {
    let mut page = xhtml_head(title);
    page.push_str(&format!(
        "<body>\n  <div class=\"cover\" epub:type=\"cover\">\n    <img src=\"{}\" alt=\"{}\"/>\n  </div>\n</body>\n</html>\n",
        escape_xml(image_href),
        escape_xml(title)
    ));
    page
}

fn generate_chapter(chapter: &Chapter) -> String {
    let mut doc = xhtml_head(&chapter.title);
    doc.push_str(&format!(
        "<body>\n<section id=\"{}\" epub:type=\"chapter\">\n{}</section>\n</body>\n</html>\n",
        escape_xml(&chapter.slug),
        chapter.html
    ));
    doc
}
