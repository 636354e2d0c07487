//! Markdown handling for book pages.
//!
//! - [`render`]: markdown → HTML through comrak
//! - [`links`]: rewriting `./page.md` links to chapter anchors or files
//! - [`naming`]: page filename conventions (stems, titles, validation)
//! - [`xhtml`]: reserializing rendered HTML as well-formed XHTML
//!
//! [`build_chapters`] runs all three over a [`Manuscript`] and is what the
//! exporters start from.

mod links;
mod naming;
mod render;
mod xhtml;

pub use links::{
    LinkStyle, LinkTargets, PageLink, chapter_href, encode_segment, heading_id,
    resolve_page_link, rewrite_links,
};
pub use naming::{
    PAGE_EXTENSION, is_page_file, normalize_page_name, page_stem, page_title, title_case,
    validate_name,
};
pub use render::{HEADING_ID_PREFIX, render_markdown};
pub use xhtml::to_xhtml;

use crate::book::Manuscript;

/// A page as it appears inside a compiled artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Filename stem; anchor id and content-document name.
    pub slug: String,
    pub title: String,
    pub filename: String,
    /// Rendered body with intra-book links rewritten.
    pub html: String,
}

/// Render every page of `book`, in order, with links in the given style.
pub fn build_chapters(book: &Manuscript, style: LinkStyle) -> Vec<Chapter> {
    let targets = LinkTargets::new(book.pages.iter().map(|p| p.filename.as_str()));

    book.pages
        .iter()
        .map(|page| {
            let html = render_markdown(&page.content);
            Chapter {
                slug: page_stem(&page.filename).to_string(),
                title: page_title(&page.filename),
                filename: page.filename.clone(),
                html: rewrite_links(&html, &targets, style),
            }
        })
        .collect()
}
