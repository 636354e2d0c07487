//! Google Drive page store.
//!
//! Layout inside the user's Drive:
//!
//! ```text
//! JugaadPress/                 (root folder, created on first use)
//!   .user_settings.json
//!   <book>/                    (one folder per book)
//!     .book_settings.json
//!     <page>.md                (text/markdown)
//! ```
//!
//! Deleting moves files to the Drive trash.

mod client;
mod retry;
pub mod verify;

pub use client::{DEFAULT_API_BASE, DriveClient, DriveFile, FOLDER_MIME, escape_query_value};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::book::{BookSettings, BookSummary, GlobalSettings};
use crate::error::{Error, Result};
use crate::markdown::{is_page_file, validate_name};
use crate::util::decode_text;

use super::{BOOK_SETTINGS_FILE, PageStore, USER_SETTINGS_FILE, sort_filenames};

/// Default name of the root folder.
pub const DEFAULT_ROOT_FOLDER: &str = "JugaadPress";

const MARKDOWN_MIME: &str = "text/markdown";
const JSON_MIME: &str = "application/json";

/// Page store backed by one user's Google Drive.
///
/// Built per request from the session's access token; the root folder id
/// is resolved lazily and cached for the lifetime of the store.
pub struct DriveStore {
    client: DriveClient,
    root_name: String,
    root_id: OnceCell<String>,
}

impl DriveStore {
    pub fn new(client: DriveClient, root_name: impl Into<String>) -> Self {
        Self {
            client,
            root_name: root_name.into(),
            root_id: OnceCell::new(),
        }
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }

    /// Id of the root folder, creating it when missing.
    pub async fn root_id(&self) -> Result<&str> {
        let id = self
            .root_id
            .get_or_try_init(|| self.get_or_create_folder(&self.root_name, None))
            .await?;
        Ok(id)
    }

    /// Look up the root folder without creating it.
    pub async fn find_root(&self) -> Result<Option<DriveFile>> {
        self.find_folder(&self.root_name, None).await
    }

    pub async fn find_folder(&self, name: &str, parent: Option<&str>) -> Result<Option<DriveFile>> {
        let mut query = format!(
            "name='{}' and mimeType='{}' and trashed=false",
            escape_query_value(name),
            FOLDER_MIME
        );
        if let Some(parent) = parent {
            query.push_str(&format!(" and '{}' in parents", escape_query_value(parent)));
        }
        Ok(self.client.list(&query).await?.into_iter().next())
    }

    async fn get_or_create_folder(&self, name: &str, parent: Option<&str>) -> Result<String> {
        if let Some(folder) = self.find_folder(name, parent).await? {
            return Ok(folder.id);
        }
        info!("Creating Drive folder {}", name);
        self.client.create(name, FOLDER_MIME, parent).await
    }

    /// Every non-trashed entry of a folder.
    pub async fn list_folder(&self, folder_id: &str) -> Result<Vec<DriveFile>> {
        let query = format!(
            "'{}' in parents and trashed=false",
            escape_query_value(folder_id)
        );
        self.client.list(&query).await
    }

    async fn find_book(&self, book: &str) -> Result<Option<String>> {
        validate_name(book)?;
        let root = self.root_id().await?;
        Ok(self.find_folder(book, Some(root)).await?.map(|f| f.id))
    }

    async fn book_id(&self, book: &str) -> Result<String> {
        self.find_book(book)
            .await?
            .ok_or_else(|| Error::NotFound(book.to_string()))
    }

    async fn find_file(&self, name: &str, parent: &str) -> Result<Option<DriveFile>> {
        let query = format!(
            "name='{}' and '{}' in parents and trashed=false",
            escape_query_value(name),
            escape_query_value(parent)
        );
        Ok(self.client.list(&query).await?.into_iter().next())
    }

    async fn page_files(&self, folder_id: &str) -> Result<Vec<DriveFile>> {
        let query = format!(
            "'{}' in parents and name contains '.md' and trashed=false",
            escape_query_value(folder_id)
        );
        let mut files = self.client.list(&query).await?;
        files.retain(|f| !f.is_folder() && is_page_file(&f.name));
        Ok(files)
    }

    /// Create or replace a named file inside `parent`.
    async fn put_file(&self, name: &str, parent: &str, mime_type: &str, content: &[u8]) -> Result<()> {
        match self.find_file(name, parent).await? {
            Some(file) => self.client.upload(&file.id, mime_type, content).await,
            None => self
                .client
                .create_with_content(name, mime_type, parent, content)
                .await
                .map(drop),
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned + Default>(
        &self,
        name: &str,
        parent: &str,
    ) -> Result<T> {
        let Some(file) = self.find_file(name, parent).await? else {
            return Ok(T::default());
        };
        let bytes = self.client.download(&file.id).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!("Ignoring unreadable Drive settings file {}: {}", name, e);
                Ok(T::default())
            }
        }
    }

    async fn write_json<T: serde::Serialize>(&self, name: &str, parent: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.put_file(name, parent, JSON_MIME, &bytes).await
    }
}

#[async_trait]
impl PageStore for DriveStore {
    async fn list_books(&self) -> Result<Vec<BookSummary>> {
        let root = self.root_id().await?;
        let mut books = Vec::new();
        for folder in self.list_folder(root).await? {
            if !folder.is_folder() || folder.name.starts_with('.') {
                continue;
            }
            let page_count = self.page_files(&folder.id).await?.len();
            books.push(BookSummary {
                name: folder.name,
                id: folder.id,
                page_count,
                last_modified: folder.modified_time,
            });
        }
        books.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        info!("Listed {} books from Drive", books.len());
        Ok(books)
    }

    async fn create_book(&self, book: &str) -> Result<()> {
        if self.find_book(book).await?.is_some() {
            return Err(Error::AlreadyExists(book.to_string()));
        }
        let root = self.root_id().await?;
        let id = self.client.create(book, FOLDER_MIME, Some(root)).await?;
        self.write_json(BOOK_SETTINGS_FILE, &id, &BookSettings::new(book))
            .await?;
        info!("Created book {}", book);
        Ok(())
    }

    async fn delete_book(&self, book: &str) -> Result<()> {
        let id = self.book_id(book).await?;
        self.client.trash(&id).await?;
        info!("Moved book {} to trash", book);
        Ok(())
    }

    async fn list_pages(&self, book: &str) -> Result<Vec<String>> {
        let Some(id) = self.find_book(book).await? else {
            return Ok(Vec::new());
        };
        let mut pages: Vec<String> = self
            .page_files(&id)
            .await?
            .into_iter()
            .map(|f| f.name)
            .collect();
        sort_filenames(&mut pages);
        pages.dedup();
        Ok(pages)
    }

    async fn read_page(&self, book: &str, filename: &str) -> Result<String> {
        validate_name(filename)?;
        let not_found = || Error::NotFound(format!("{book}/{filename}"));
        let folder = self.find_book(book).await?.ok_or_else(not_found)?;
        let file = self
            .find_file(filename, &folder)
            .await?
            .ok_or_else(not_found)?;
        let bytes = self.client.download(&file.id).await?;
        Ok(decode_text(&bytes).into_owned())
    }

    async fn write_page(&self, book: &str, filename: &str, content: &str) -> Result<()> {
        validate_name(filename)?;
        validate_name(book)?;
        let root = self.root_id().await?.to_string();
        let folder = self.get_or_create_folder(book, Some(&root)).await?;
        self.put_file(filename, &folder, MARKDOWN_MIME, content.as_bytes())
            .await
    }

    async fn delete_page(&self, book: &str, filename: &str) -> Result<()> {
        validate_name(filename)?;
        let not_found = || Error::NotFound(format!("{book}/{filename}"));
        let folder = self.find_book(book).await?.ok_or_else(not_found)?;
        let file = self
            .find_file(filename, &folder)
            .await?
            .ok_or_else(not_found)?;
        self.client.trash(&file.id).await
    }

    async fn rename_page(&self, book: &str, filename: &str, new_name: &str) -> Result<()> {
        validate_name(filename)?;
        validate_name(new_name)?;
        let not_found = || Error::NotFound(format!("{book}/{filename}"));
        let folder = self.find_book(book).await?.ok_or_else(not_found)?;
        let file = self
            .find_file(filename, &folder)
            .await?
            .ok_or_else(not_found)?;
        if self.find_file(new_name, &folder).await?.is_some() {
            return Err(Error::AlreadyExists(format!("{book}/{new_name}")));
        }
        self.client.rename(&file.id, new_name).await
    }

    async fn book_settings(&self, book: &str) -> Result<BookSettings> {
        let mut settings: BookSettings = match self.find_book(book).await? {
            Some(folder) => self.read_json(BOOK_SETTINGS_FILE, &folder).await?,
            None => BookSettings::default(),
        };
        if settings.title.trim().is_empty() {
            settings.title = book.to_string();
        }
        Ok(settings)
    }

    async fn save_book_settings(&self, book: &str, settings: &BookSettings) -> Result<()> {
        let folder = self.book_id(book).await?;
        self.write_json(BOOK_SETTINGS_FILE, &folder, settings).await
    }

    async fn global_settings(&self) -> Result<GlobalSettings> {
        let root = self.root_id().await?;
        self.read_json(USER_SETTINGS_FILE, root).await
    }

    async fn save_global_settings(&self, settings: &GlobalSettings) -> Result<()> {
        let root = self.root_id().await?;
        self.write_json(USER_SETTINGS_FILE, root, settings).await
    }
}
