//! Intra-book link rewriting.
//!
//! Pages link to each other with relative markdown links such as
//! `[next](./02_grammar.md)`. After rendering, those hrefs still point at
//! `.md` files; this module rewrites them to the place the target page ends
//! up in a compiled artifact. A `#fragment` names a heading of the target
//! page.

use std::collections::HashSet;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use super::naming::{PAGE_EXTENSION, page_stem};
use super::render::HEADING_ID_PREFIX;
use super::xhtml::to_xhtml;

/// Characters escaped when a page stem becomes part of a URL.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// How a rewritten link addresses its chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStyle {
    /// `#<stem>` inside a single HTML document.
    Anchor,
    /// `<stem>.xhtml` inside an EPUB container.
    Xhtml,
}

/// Page filenames that links may resolve to.
#[derive(Debug, Clone, Default)]
pub struct LinkTargets {
    filenames: HashSet<String>,
}

impl LinkTargets {
    pub fn new<'a>(filenames: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            filenames: filenames.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.filenames.contains(filename)
    }
}

/// A link that resolved to a page of the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub filename: String,
    pub fragment: Option<String>,
}

impl PageLink {
    /// The href this link takes in an artifact.
    pub fn href(&self, style: LinkStyle) -> String {
        let stem = page_stem(&self.filename);
        match style {
            LinkStyle::Anchor => format!("#{}", encode_segment(stem)),
            LinkStyle::Xhtml => {
                let mut href = chapter_href(stem);
                if let Some(ref fragment) = self.fragment {
                    href.push('#');
                    href.push_str(&encode_segment(&heading_id(fragment)));
                }
                href
            }
        }
    }
}

/// Percent-encode a page stem for use in a URL.
pub fn encode_segment(text: &str) -> String {
    utf8_percent_encode(text, SEGMENT).to_string()
}

/// Href of a chapter's content document inside an EPUB.
pub fn chapter_href(stem: &str) -> String {
    format!("{}.xhtml", encode_segment(stem))
}

/// Resolve an (attribute-unescaped) href against the book's pages.
///
/// Accepts `./name.md` and `name.md`, optionally percent-encoded and
/// optionally followed by a `#fragment`. Returns `None` for anything that
/// is not a link to a page in `targets`.
pub fn resolve_page_link(href: &str, targets: &LinkTargets) -> Option<PageLink> {
    let (path, fragment) = match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    };

    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let name = decoded.strip_prefix("./").unwrap_or(&decoded);

    if !name.ends_with(PAGE_EXTENSION) || name.contains(['/', '\\', ':']) {
        return None;
    }
    if !targets.contains(name) {
        return None;
    }

    let fragment = fragment
        .filter(|f| !f.is_empty())
        .map(|f| percent_decode_str(f).decode_utf8_lossy().into_owned());

    Some(PageLink {
        filename: name.to_string(),
        fragment,
    })
}

/// Rewrite every link in `html` that points at a page of the book.
///
/// Only `href` attributes of `<a>` elements are touched, so markup shown
/// inside code blocks stays as written. In-page `#fragment` links are
/// pointed at the prefixed heading ids. The result is well-formed XHTML.
pub fn rewrite_links(html: &str, targets: &LinkTargets, style: LinkStyle) -> String {
    to_xhtml(html, &|href| {
        if let Some(fragment) = href.strip_prefix('#') {
            return (!fragment.is_empty() && !fragment.starts_with(HEADING_ID_PREFIX))
                .then(|| format!("#{}", heading_id(fragment)));
        }
        resolve_page_link(href, targets).map(|link| link.href(style))
    })
}

/// The id comrak gives the heading whose slug is `slug`.
pub fn heading_id(slug: &str) -> String {
    format!("{HEADING_ID_PREFIX}{slug}")
}
