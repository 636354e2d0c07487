//! Page storage.
//!
//! Books are folders of markdown pages plus a small settings file. The
//! [`PageStore`] trait is the one capability interface the HTTP layer and
//! the compiler talk to; [`LocalStore`] keeps books in a directory tree and
//! [`DriveStore`] keeps them in a user's Google Drive.
//!
//! Page listings are always returned sorted by filename (byte-wise), which
//! is also the chapter order of compiled books.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::book::{BookSettings, BookSummary, GlobalSettings, Manuscript};
use crate::error::{Error, Result};
use crate::markdown::{normalize_page_name, validate_name};

pub mod drive;
mod local;

pub use drive::DriveStore;
pub use local::LocalStore;

/// Settings file kept inside each book.
pub const BOOK_SETTINGS_FILE: &str = ".book_settings.json";

/// User settings file kept at the store root.
pub const USER_SETTINGS_FILE: &str = ".user_settings.json";

/// Storage backend for books and their pages.
///
/// Filenames passed in are validated by the implementations; names that
/// could escape the book folder yield [`Error::InvalidName`].
#[async_trait]
pub trait PageStore: Send + Sync {
    /// All books, sorted by name. Hidden entries are skipped.
    async fn list_books(&self) -> Result<Vec<BookSummary>>;

    /// Create an empty book with default settings.
    async fn create_book(&self, book: &str) -> Result<()>;

    async fn delete_book(&self, book: &str) -> Result<()>;

    /// Page filenames of a book, sorted.
    async fn list_pages(&self, book: &str) -> Result<Vec<String>>;

    async fn read_page(&self, book: &str, filename: &str) -> Result<String>;

    /// Create or replace a page.
    async fn write_page(&self, book: &str, filename: &str, content: &str) -> Result<()>;

    async fn delete_page(&self, book: &str, filename: &str) -> Result<()>;

    /// Rename a page within its book.
    ///
    /// Fails with [`Error::AlreadyExists`] when `new_name` is taken and
    /// [`Error::NotFound`] when `filename` does not exist.
    async fn rename_page(&self, book: &str, filename: &str, new_name: &str) -> Result<()>;

    /// Settings of a book; defaults (title = book name) when none are saved.
    async fn book_settings(&self, book: &str) -> Result<BookSettings>;

    async fn save_book_settings(&self, book: &str, settings: &BookSettings) -> Result<()>;

    async fn global_settings(&self) -> Result<GlobalSettings>;

    async fn save_global_settings(&self, settings: &GlobalSettings) -> Result<()>;
}

/// Create an empty page, appending `.md` to `name` when it is missing.
///
/// Returns the filename that was created.
pub async fn create_page(store: &dyn PageStore, book: &str, name: &str) -> Result<String> {
    let filename = normalize_page_name(name);
    validate_name(&filename)?;

    let existing = store.list_pages(book).await?;
    if existing.iter().any(|f| f == &filename) {
        return Err(Error::AlreadyExists(filename));
    }

    store.write_page(book, &filename, "").await?;
    Ok(filename)
}

/// Read a whole book, ready for compilation.
///
/// Pages that cannot be read are skipped with a warning. A cover that
/// does not decode is dropped the same way.
pub async fn load_manuscript(store: &dyn PageStore, book: &str) -> Result<Manuscript> {
    let settings = store.book_settings(book).await?;
    let filenames = store.list_pages(book).await?;

    let mut manuscript = Manuscript::new(settings.title_or(book));
    for filename in filenames {
        match store.read_page(book, &filename).await {
            Ok(content) => manuscript.add_page(filename, content),
            Err(e) => warn!("Skipping page {}/{}: {}", book, filename, e),
        }
    }
    manuscript.sort_pages();

    Ok(manuscript.with_cover_base64(settings.cover.as_deref()))
}

/// Copy every page of `from_book` into `to_book` on another store.
///
/// The target book is created when missing; existing pages with the same
/// name are overwritten. The target gets `to_book` as its title and keeps
/// the source cover. Returns the copied filenames.
pub async fn copy_book(
    from: &dyn PageStore,
    from_book: &str,
    to: &dyn PageStore,
    to_book: &str,
) -> Result<Vec<String>> {
    match to.create_book(to_book).await {
        Ok(()) | Err(Error::AlreadyExists(_)) => {}
        Err(e) => return Err(e),
    }

    let source = from.book_settings(from_book).await?;
    let settings = BookSettings {
        title: to_book.to_string(),
        cover: source.cover,
    };
    to.save_book_settings(to_book, &settings).await?;

    let pages = from.list_pages(from_book).await?;
    for filename in &pages {
        let content = from.read_page(from_book, filename).await?;
        to.write_page(to_book, filename, &content).await?;
        info!("Copied {}", filename);
    }
    Ok(pages)
}

/// Sort filenames the way chapters are ordered.
pub(crate) fn sort_filenames(names: &mut [String]) {
    names.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_page_appends_extension() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        assert_eq!(create_page(&store, "Notes", "notes").await.unwrap(), "notes.md");
        assert_eq!(store.read_page("Notes", "notes.md").await.unwrap(), "");
        assert!(matches!(
            create_page(&store, "Notes", "notes.md").await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_load_manuscript_uses_settings_title() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        store.create_book("Notes").await.unwrap();
        store
            .save_book_settings("Notes", &BookSettings::new("My Notes"))
            .await
            .unwrap();
        store.write_page("Notes", "b.md", "B").await.unwrap();
        store.write_page("Notes", "a.md", "A").await.unwrap();

        let book = load_manuscript(&store, "Notes").await.unwrap();
        assert_eq!(book.title, "My Notes");
        let names: Vec<_> = book.pages.iter().map(|p| p.filename.as_str()).collect();
        assert_eq!(names, ["a.md", "b.md"]);
        assert!(book.cover.is_none());
    }

    #[tokio::test]
    async fn test_copy_book_between_stores() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();
        let src = LocalStore::new(src_dir.path());
        let dst = LocalStore::new(dst_dir.path());
        src.write_page("pages", "01_intro.md", "# Intro").await.unwrap();
        src.write_page("pages", "02_grammar.md", "# Grammar").await.unwrap();

        let copied = copy_book(&src, "pages", &dst, "Japanese").await.unwrap();
        assert_eq!(copied, ["01_intro.md", "02_grammar.md"]);
        assert_eq!(dst.read_page("Japanese", "01_intro.md").await.unwrap(), "# Intro");
        assert_eq!(dst.book_settings("Japanese").await.unwrap().title, "Japanese");

        // Running it again overwrites instead of failing
        copy_book(&src, "pages", &dst, "Japanese").await.unwrap();
    }
}
