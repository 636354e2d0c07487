//! Export module for compiling manuscripts into artifacts.
//!
//! Provides the `Exporter` trait and format-specific implementations.
//!
//! # Architecture
//!
//! The `Exporter` trait uses a builder pattern:
//! - `new()` creates an exporter with default configuration
//! - `with_config()` allows customization
//! - `export()` writes to any `Write + Seek` destination
//!
//! [`compile`] picks the exporter for a [`Format`] and returns the artifact
//! bytes in memory, which is what the HTTP layer and delivery need.
//!
//! # Example
//!
//! ```
//! use jugaadpress::Manuscript;
//! use jugaadpress::export::{Format, compile};
//!
//! let book = Manuscript::new("Notes")
//!     .with_page("01_intro.md", "# Intro\nSee [grammar](./02_grammar.md)")
//!     .with_page("02_grammar.md", "# Grammar");
//!
//! let artifact = compile(&book, Format::Epub)?;
//! assert_eq!(artifact.content_type(), "application/epub+zip");
//! # Ok::<(), jugaadpress::Error>(())
//! ```

use std::io::{Cursor, Seek, Write};
use std::str::FromStr;

use tracing::{debug, error};

use crate::book::Manuscript;
use crate::error::{Error, Result};

mod epub;
mod html;
mod pdf;

pub use epub::{EpubConfig, EpubExporter, book_identifier};
pub use html::HtmlExporter;
pub use pdf::{Block, BlockKind, PdfConfig, PdfExporter, extract_blocks};

/// Trait for exporting manuscripts to specific formats.
///
/// Exporters hold their configuration and write to any `Write + Seek`
/// destination: a file, a `Cursor<Vec<u8>>`, or anything else seekable.
pub trait Exporter {
    /// Export the manuscript to the provided writer.
    fn export<W: Write + Seek>(&self, book: &Manuscript, writer: &mut W) -> Result<()>;
}

/// Artifact formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Single HTML document with a table of contents.
    Html,
    Epub,
    Pdf,
}

impl Format {
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Html => "text/html; charset=utf-8",
            Format::Epub => "application/epub+zip",
            Format::Pdf => "application/pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Epub => "epub",
            Format::Pdf => "pdf",
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Format::Html),
            "epub" => Ok(Format::Epub),
            "pdf" => Ok(Format::Pdf),
            other => Err(Error::InvalidInput(format!(
                "invalid format '{other}'. Use epub, pdf or html"
            ))),
        }
    }
}

/// Compiled output of a manuscript.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub format: Format,
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Download filename for a book, e.g. `Notes.epub`.
    pub fn filename(&self, book_name: &str) -> String {
        format!("{}.{}", book_name, self.format.extension())
    }
}

/// Compile a manuscript into the requested format.
///
/// A book without pages yields [`Error::NoContent`] instead of an empty
/// artifact. Writer failures are reported as [`Error::Render`].
pub fn compile(book: &Manuscript, format: Format) -> Result<Artifact> {
    if book.pages.is_empty() {
        return Err(Error::NoContent);
    }
    debug_assert!(book.is_sorted(), "pages must be sorted by filename");

    let mut cursor = Cursor::new(Vec::new());
    let result = match format {
        Format::Html => HtmlExporter::new().export(book, &mut cursor),
        Format::Epub => EpubExporter::new().export(book, &mut cursor),
        Format::Pdf => PdfExporter::new().export(book, &mut cursor),
    };

    match result {
        Ok(()) => {
            let data = cursor.into_inner();
            debug!(
                "Compiled '{}' to {} ({} pages, {} bytes)",
                book.title,
                format.extension(),
                book.pages.len(),
                data.len()
            );
            Ok(Artifact { format, data })
        }
        Err(e @ Error::Render(_)) => Err(e),
        Err(e) => {
            error!("Failed to generate {}: {}", format.extension(), e);
            Err(Error::Render(format!(
                "failed to generate {}",
                format.extension().to_uppercase()
            )))
        }
    }
}

/// Escape XML special characters.
pub(crate) fn escape_xml(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}
