//! PDF exporter.
//!
//! Lays the book out on US-Letter pages with the PDF base-14 fonts: a
//! title page (with the cover image when there is one), then each chapter
//! starting on a new page.
//!
//! The pipeline per chapter is rendered HTML → [`extract_blocks`] →
//! [`layout::Layout`] → content stream.

mod blocks;
mod fonts;
mod xobject;
mod layout;
mod writer;

use std::io::{Seek, Write};

use tracing::warn;

use crate::book::Manuscript;
use crate::error::Result;
use crate::markdown::{LinkStyle, build_chapters};

use super::Exporter;

pub use blocks::{Block, BlockKind, extract_blocks};

use fonts::Font;
use xobject::PdfImage;
use layout::{Align, CodeStyle, Layout, Op, PAGE_HEIGHT, PAGE_WIDTH, Rgb, TextStyle};
use writer::{PdfWriter, literal_string, num, text_string};

const GREEN: Rgb = Rgb::hex(0x3fb950);
const BLUE: Rgb = Rgb::hex(0x58a6ff);
const GREY: Rgb = Rgb::hex(0x8b949e);

/// Cover image box on the title page (3 x 4 inches).
const COVER_BOX: (f32, f32) = (216.0, 288.0);

const TITLE: TextStyle = TextStyle {
    font: Font::Bold,
    size: 28.0,
    leading: 34.0,
    color: GREEN,
    space_before: 0.0,
    space_after: 30.0,
    indent: 0.0,
    align: Align::Center,
};

const H1: TextStyle = TextStyle {
    font: Font::Bold,
    size: 20.0,
    leading: 24.0,
    color: GREEN,
    space_before: 16.0,
    space_after: 12.0,
    indent: 0.0,
    align: Align::Left,
};

const H2: TextStyle = TextStyle {
    font: Font::Bold,
    size: 16.0,
    leading: 20.0,
    color: BLUE,
    space_before: 12.0,
    space_after: 10.0,
    indent: 0.0,
    align: Align::Left,
};

const H3: TextStyle = TextStyle {
    font: Font::Bold,
    size: 14.0,
    leading: 18.0,
    color: GREY,
    space_before: 10.0,
    space_after: 8.0,
    indent: 0.0,
    align: Align::Left,
};

const BODY: TextStyle = TextStyle {
    font: Font::Regular,
    size: 11.0,
    leading: 16.0,
    color: Rgb::BLACK,
    space_before: 0.0,
    space_after: 8.0,
    indent: 0.0,
    align: Align::Justify,
};

const LIST_ITEM: TextStyle = TextStyle {
    indent: 12.0,
    space_after: 4.0,
    align: Align::Left,
    ..BODY
};

const CODE: CodeStyle = CodeStyle {
    size: 9.0,
    leading: 12.0,
    color: Rgb::hex(0xe6edf3),
    background: Rgb::hex(0x21262d),
    space_before: 10.0,
    space_after: 10.0,
    indent: 20.0,
    padding: 6.0,
};

/// Configuration for PDF export.
#[derive(Debug, Clone)]
pub struct PdfConfig {
    /// Flate-compress page content streams (default true).
    pub compress: bool,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self { compress: true }
    }
}

/// PDF format exporter.
pub struct PdfExporter {
    config: PdfConfig,
}

impl PdfExporter {
    pub fn new() -> Self {
        Self {
            config: PdfConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PdfConfig) -> Self {
        self.config = config;
        self
    }
}

impl Default for PdfExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter for PdfExporter {
    fn export<W: Write + Seek>(&self, book: &Manuscript, writer: &mut W) -> Result<()> {
        let cover = book
            .cover
            .as_ref()
            .and_then(|cover| match PdfImage::from_cover(cover) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!("Failed to add cover to PDF: {}", e);
                    None
                }
            });

        let pages = lay_out(book, cover.as_ref())?;
        write_document(&book.title, &pages, cover.as_ref(), self.config.compress, writer)
    }
}

/// Lay out the title page and every chapter.
fn lay_out(book: &Manuscript, cover: Option<&PdfImage>) -> Result<Vec<Vec<Op>>> {
    let mut layout = Layout::new();

    layout.space(144.0);
    layout.text(&escape_markup(&book.title), &TITLE);
    layout.space(36.0);
    if let Some(image) = cover {
        let (width, height) = image.fit(COVER_BOX.0, COVER_BOX.1);
        layout.image(width, height);
    }
    layout.page_break();

    for chapter in build_chapters(book, LinkStyle::Anchor) {
        layout.text(&escape_markup(&chapter.title), &H1);
        layout.space(14.4);

        for block in extract_blocks(&chapter.html)? {
            match block.kind {
                BlockKind::Heading(1) => layout.text(&block.markup, &H1),
                BlockKind::Heading(2) => layout.text(&block.markup, &H2),
                BlockKind::Heading(_) => layout.text(&block.markup, &H3),
                BlockKind::Paragraph => layout.text(&block.markup, &BODY),
                BlockKind::ListItem => {
                    layout.prefixed_text("\u{2022} ", &block.markup, &LIST_ITEM)
                }
                BlockKind::Preformatted => layout.code(&block.markup, &CODE),
            }
        }
        layout.page_break();
    }

    Ok(layout.finish())
}

fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn write_document<W: Write>(
    title: &str,
    pages: &[Vec<Op>],
    cover: Option<&PdfImage>,
    compress: bool,
    writer: &mut W,
) -> Result<()> {
    let mut pdf = PdfWriter::new(compress);

    let catalog = pdf.reserve();
    let page_tree = pdf.reserve();

    let mut font_entries = String::new();
    for font in Font::ALL {
        let id = pdf.add(format!(
            "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
            font.base_font()
        ));
        font_entries.push_str(&format!("/{} {} ", font.resource_name(), id));
    }

    let mut resources = format!("<< /Font << {}>>", font_entries);
    if let Some(image) = cover {
        let id = image.write(&mut pdf)?;
        resources.push_str(&format!(" /XObject << /Im1 {} >>", id));
    }
    resources.push_str(" >>");
    let resources = pdf.add(resources);

    let mut kids = Vec::with_capacity(pages.len());
    for ops in pages {
        let content = pdf.add_stream("", &content_stream(ops))?;
        let page = pdf.add(format!(
            "<< /Type /Page /Parent {} /MediaBox [0 0 {} {}] /Resources {} /Contents {} >>",
            page_tree,
            num(PAGE_WIDTH),
            num(PAGE_HEIGHT),
            resources,
            content
        ));
        kids.push(page.to_string());
    }

    pdf.set(
        page_tree,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            kids.len()
        ),
    );
    pdf.set(
        catalog,
        format!("<< /Type /Catalog /Pages {} >>", page_tree),
    );
    let info = pdf.add(format!(
        "<< /Title {} /Producer (JugaadPress) >>",
        text_string(title)
    ));

    pdf.finish(catalog, info, writer)
}

/// Serialize drawing operations as page content.
fn content_stream(ops: &[Op]) -> Vec<u8> {
    let mut out = Vec::new();
    // Word spacing is text state and carries over between text objects
    let mut current_spacing = 0.0;
    for op in ops {
        match op {
            Op::Text {
                x,
                y,
                size,
                color,
                word_spacing,
                spans,
            } => {
                out.extend_from_slice(b"BT\n");
                out.extend_from_slice(fill_color(*color).as_bytes());
                if *word_spacing != current_spacing {
                    out.extend_from_slice(format!("{} Tw\n", num(*word_spacing)).as_bytes());
                    current_spacing = *word_spacing;
                }
                out.extend_from_slice(format!("{} {} Td\n", num(*x), num(*y)).as_bytes());
                for span in spans {
                    out.extend_from_slice(
                        format!("/{} {} Tf\n", span.font.resource_name(), num(*size)).as_bytes(),
                    );
                    literal_string(&span.bytes, &mut out);
                    out.extend_from_slice(b" Tj\n");
                }
                out.extend_from_slice(b"ET\n");
            }
            Op::Rect {
                x,
                y,
                width,
                height,
                color,
            } => {
                out.extend_from_slice(fill_color(*color).as_bytes());
                out.extend_from_slice(
                    format!("{} {} {} {} re f\n", num(*x), num(*y), num(*width), num(*height))
                        .as_bytes(),
                );
            }
            Op::Image {
                x,
                y,
                width,
                height,
            } => {
                out.extend_from_slice(
                    format!(
                        "q\n{} 0 0 {} {} {} cm\n/Im1 Do\nQ\n",
                        num(*width),
                        num(*height),
                        num(*x),
                        num(*y)
                    )
                    .as_bytes(),
                );
            }
        }
    }
    out
}

fn fill_color(color: Rgb) -> String {
    format!("{} {} {} rg\n", num(color.0), num(color.1), num(color.2))
}
