//! Directory-tree page store.
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   .user_settings.json
//!   <book>/
//!     .book_settings.json
//!     01_intro.md
//!     02_grammar.md
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::book::{BookSettings, BookSummary, GlobalSettings};
use crate::error::{Error, Result};
use crate::markdown::{is_page_file, validate_name};
use crate::util::decode_text;

use super::{BOOK_SETTINGS_FILE, PageStore, USER_SETTINGS_FILE, sort_filenames};

/// Page store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn book_dir(&self, book: &str) -> Result<PathBuf> {
        validate_name(book)?;
        Ok(self.root.join(book))
    }

    fn page_path(&self, book: &str, filename: &str) -> Result<PathBuf> {
        validate_name(filename)?;
        Ok(self.book_dir(book)?.join(filename))
    }
}

/// Map a missing file to [`Error::NotFound`].
fn not_found(e: io::Error, what: impl Into<String>) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::NotFound(what.into())
    } else {
        Error::Io(e)
    }
}

async fn exists(path: &Path) -> Result<bool> {
    Ok(fs::try_exists(path).await?)
}

async fn read_json<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!("Ignoring unreadable settings file {:?}: {}", path, e);
                Ok(T::default())
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, serde_json::to_vec_pretty(value)?).await?;
    Ok(())
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl PageStore for LocalStore {
    async fn list_books(&self) -> Result<Vec<BookSummary>> {
        let mut books = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(books),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type().await?.is_dir() {
                continue;
            }

            let mut page_count = 0;
            let mut last_modified = entry.metadata().await?.modified().ok();
            let mut pages = fs::read_dir(entry.path()).await?;
            while let Some(page) = pages.next_entry().await? {
                if !is_page_file(&page.file_name().to_string_lossy()) {
                    continue;
                }
                page_count += 1;
                if let Ok(modified) = page.metadata().await.and_then(|m| m.modified()) {
                    last_modified = last_modified.max(Some(modified));
                }
            }

            books.push(BookSummary {
                id: name.clone(),
                name,
                page_count,
                last_modified: last_modified.map(format_time),
            });
        }

        books.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        Ok(books)
    }

    async fn create_book(&self, book: &str) -> Result<()> {
        let dir = self.book_dir(book)?;
        if exists(&dir).await? {
            return Err(Error::AlreadyExists(book.to_string()));
        }
        fs::create_dir_all(&dir).await?;
        write_json(&dir.join(BOOK_SETTINGS_FILE), &BookSettings::new(book)).await?;
        info!("Created book {}", book);
        Ok(())
    }

    async fn delete_book(&self, book: &str) -> Result<()> {
        let dir = self.book_dir(book)?;
        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| not_found(e, book))?;
        info!("Deleted book {}", book);
        Ok(())
    }

    async fn list_pages(&self, book: &str) -> Result<Vec<String>> {
        let dir = self.book_dir(book)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // A book without a folder yet has no pages
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut pages = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_page_file(&name) && entry.file_type().await?.is_file() {
                pages.push(name);
            }
        }
        sort_filenames(&mut pages);
        Ok(pages)
    }

    async fn read_page(&self, book: &str, filename: &str) -> Result<String> {
        let path = self.page_path(book, filename)?;
        let bytes = fs::read(&path)
            .await
            .map_err(|e| not_found(e, format!("{book}/{filename}")))?;
        Ok(decode_text(&bytes).into_owned())
    }

    async fn write_page(&self, book: &str, filename: &str, content: &str) -> Result<()> {
        let path = self.page_path(book, filename)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, content).await?;
        debug!("Saved {}/{} ({} bytes)", book, filename, content.len());
        Ok(())
    }

    async fn delete_page(&self, book: &str, filename: &str) -> Result<()> {
        let path = self.page_path(book, filename)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| not_found(e, format!("{book}/{filename}")))?;
        debug!("Deleted {}/{}", book, filename);
        Ok(())
    }

    async fn rename_page(&self, book: &str, filename: &str, new_name: &str) -> Result<()> {
        let from = self.page_path(book, filename)?;
        let to = self.page_path(book, new_name)?;

        if !exists(&from).await? {
            return Err(Error::NotFound(format!("{book}/{filename}")));
        }
        if exists(&to).await? {
            return Err(Error::AlreadyExists(format!("{book}/{new_name}")));
        }
        fs::rename(&from, &to).await?;
        debug!("Renamed {}/{} to {}", book, filename, new_name);
        Ok(())
    }

    async fn book_settings(&self, book: &str) -> Result<BookSettings> {
        let path = self.book_dir(book)?.join(BOOK_SETTINGS_FILE);
        let mut settings: BookSettings = read_json(&path).await?;
        if settings.title.trim().is_empty() {
            settings.title = book.to_string();
        }
        Ok(settings)
    }

    async fn save_book_settings(&self, book: &str, settings: &BookSettings) -> Result<()> {
        let path = self.book_dir(book)?.join(BOOK_SETTINGS_FILE);
        write_json(&path, settings).await
    }

    async fn global_settings(&self) -> Result<GlobalSettings> {
        read_json(&self.root.join(USER_SETTINGS_FILE)).await
    }

    async fn save_global_settings(&self, settings: &GlobalSettings) -> Result<()> {
        write_json(&self.root.join(USER_SETTINGS_FILE), settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_list_pages_sorted_and_filtered() {
        let (dir, store) = store();
        let book = dir.path().join("Notes");
        std::fs::create_dir_all(&book).unwrap();
        for name in ["b.md", "a.md", "B.md", ".hidden.md", "image.png"] {
            std::fs::write(book.join(name), "x").unwrap();
        }
        std::fs::write(book.join(BOOK_SETTINGS_FILE), "{}").unwrap();

        let pages = store.list_pages("Notes").await.unwrap();
        assert_eq!(pages, ["B.md", "a.md", "b.md"]);
    }

    #[tokio::test]
    async fn test_missing_book_has_no_pages() {
        let (_dir, store) = store();
        assert!(store.list_pages("Nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_encoding_is_decoded() {
        let (dir, store) = store();
        std::fs::create_dir_all(dir.path().join("Notes")).unwrap();
        std::fs::write(dir.path().join("Notes/old.md"), b"caf\xe9").unwrap();
        assert_eq!(store.read_page("Notes", "old.md").await.unwrap(), "café");
    }

    #[tokio::test]
    async fn test_rejects_escaping_names() {
        let (_dir, store) = store();
        assert!(matches!(
            store.read_page("Notes", "../secret.md").await,
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            store.write_page("..", "a.md", "x").await,
            Err(Error::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_settings_defaults() {
        let (_dir, store) = store();
        let settings = store.book_settings("Notes").await.unwrap();
        assert_eq!(settings.title, "Notes");
        assert_eq!(store.global_settings().await.unwrap(), GlobalSettings::default());
    }

    #[tokio::test]
    async fn test_list_books() {
        let (dir, store) = store();
        store.create_book("Zeta").await.unwrap();
        store.create_book("Alpha").await.unwrap();
        store.write_page("Alpha", "01.md", "x").await.unwrap();
        std::fs::create_dir_all(dir.path().join(".trash")).unwrap();

        let books = store.list_books().await.unwrap();
        let names: Vec<_> = books.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Zeta"]);
        assert_eq!(books[0].page_count, 1);
        assert!(books[0].last_modified.is_some());

        assert!(matches!(
            store.create_book("Alpha").await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_book() {
        let (_dir, store) = store();
        store.create_book("Notes").await.unwrap();
        store.delete_book("Notes").await.unwrap();
        assert!(matches!(
            store.delete_book("Notes").await,
            Err(Error::NotFound(_))
        ));
    }
}
