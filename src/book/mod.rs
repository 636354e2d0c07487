//! Book model shared by the page stores and the exporters.

mod cover;
mod settings;

pub use cover::{Cover, ImageKind};
pub use settings::{BookSettings, BookSummary, GlobalSettings};

use tracing::warn;

/// One markdown page, identified by its filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub filename: String,
    pub content: String,
}

impl Page {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// Intermediate representation of a book ready for compilation.
///
/// Pages are expected in byte-wise lexicographic filename order; that order
/// becomes the table of contents and the reading order of every artifact.
#[derive(Debug, Clone, Default)]
pub struct Manuscript {
    pub title: String,
    pub pages: Vec<Page>,
    pub cover: Option<Cover>,
}

impl Manuscript {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Append a page.
    pub fn add_page(&mut self, filename: impl Into<String>, content: impl Into<String>) {
        self.pages.push(Page::new(filename, content));
    }

    pub fn with_page(mut self, filename: impl Into<String>, content: impl Into<String>) -> Self {
        self.add_page(filename, content);
        self
    }

    pub fn with_cover(mut self, cover: Option<Cover>) -> Self {
        self.cover = cover;
        self
    }

    /// Attach a base64 cover (optionally a `data:` URI).
    ///
    /// An undecodable cover is dropped with a warning; the book still compiles.
    pub fn with_cover_base64(mut self, encoded: Option<&str>) -> Self {
        self.cover = match encoded.map(str::trim).filter(|s| !s.is_empty()) {
            Some(encoded) => match Cover::from_base64(encoded) {
                Ok(cover) => Some(cover),
                Err(e) => {
                    warn!("Dropping cover image for '{}': {}", self.title, e);
                    None
                }
            },
            None => None,
        };
        self
    }

    /// Whether pages are in the order the exporters expect.
    pub fn is_sorted(&self) -> bool {
        self.pages
            .windows(2)
            .all(|w| w[0].filename.as_bytes() <= w[1].filename.as_bytes())
    }

    /// Sort pages by filename (stable, byte-wise).
    pub fn sort_pages(&mut self) {
        self.pages
            .sort_by(|a, b| a.filename.as_bytes().cmp(b.filename.as_bytes()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_pages_is_bytewise() {
        let mut book = Manuscript::new("T")
            .with_page("b.md", "")
            .with_page("B.md", "")
            .with_page("a.md", "");
        assert!(!book.is_sorted());
        book.sort_pages();
        let names: Vec<_> = book.pages.iter().map(|p| p.filename.as_str()).collect();
        assert_eq!(names, ["B.md", "a.md", "b.md"]);
        assert!(book.is_sorted());
    }

    #[test]
    fn test_bad_cover_is_dropped() {
        let book = Manuscript::new("T").with_cover_base64(Some("!!not base64!!"));
        assert!(book.cover.is_none());

        let book = Manuscript::new("T").with_cover_base64(Some("   "));
        assert!(book.cover.is_none());
    }
}
