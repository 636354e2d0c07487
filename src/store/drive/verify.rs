//! Structure check for a Drive-backed library.
//!
//! Used by the `jugaadpress-verify` binary. Gathering talks to Drive;
//! [`StructureReport::assess`] is pure so the rules can be tested offline.

use crate::book::GlobalSettings;
use crate::error::Result;
use crate::markdown::is_page_file;

use super::{DriveFile, DriveStore};
use crate::store::{BOOK_SETTINGS_FILE, USER_SETTINGS_FILE};

/// State of the user settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsState {
    Missing,
    Corrupt,
    Present(GlobalSettings),
}

/// One book folder as found on Drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookReport {
    pub name: String,
    pub has_settings: bool,
    pub page_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureReport {
    /// Root folder id, `None` when the root folder is missing.
    pub root_id: Option<String>,
    pub books: Vec<BookReport>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl StructureReport {
    /// Apply the structure rules to a listing.
    ///
    /// `books` pairs each book folder name with its entries.
    pub fn assess(
        root_id: Option<String>,
        settings: SettingsState,
        books: Vec<(String, Vec<DriveFile>)>,
    ) -> Self {
        let mut report = StructureReport {
            root_id,
            ..Default::default()
        };
        if report.root_id.is_none() {
            report.errors.push("root folder not found".into());
            return report;
        }

        match settings {
            SettingsState::Missing => report.warnings.push(format!(
                "{USER_SETTINGS_FILE} not found (created on first save)"
            )),
            SettingsState::Corrupt => report
                .errors
                .push(format!("{USER_SETTINGS_FILE} is corrupted")),
            SettingsState::Present(settings) => {
                if settings.sender_email.trim().is_empty() {
                    report.warnings.push("sender_email not configured".into());
                }
                if settings.destination_email.trim().is_empty() {
                    report
                        .warnings
                        .push("destination_email not configured".into());
                }
            }
        }

        if books.is_empty() {
            report.warnings.push("no books found".into());
        }

        for (name, files) in books {
            let has_settings = files.iter().any(|f| f.name == BOOK_SETTINGS_FILE);
            let page_count = files
                .iter()
                .filter(|f| !f.is_folder() && is_page_file(&f.name))
                .count();
            if !has_settings {
                report
                    .errors
                    .push(format!("{name}: missing {BOOK_SETTINGS_FILE}"));
            }
            if page_count == 0 {
                report.warnings.push(format!("{name}: no markdown pages"));
            }
            report.books.push(BookReport {
                name,
                has_settings,
                page_count,
            });
        }

        report
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Inspect the library without creating anything.
pub async fn verify_structure(store: &DriveStore) -> Result<StructureReport> {
    let Some(root) = store.find_root().await? else {
        return Ok(StructureReport::assess(None, SettingsState::Missing, Vec::new()));
    };

    let root_files = store.list_folder(&root.id).await?;

    let settings = match root_files.iter().find(|f| f.name == USER_SETTINGS_FILE) {
        None => SettingsState::Missing,
        Some(file) => {
            let bytes = store.client().download(&file.id).await?;
            match serde_json::from_slice(&bytes) {
                Ok(settings) => SettingsState::Present(settings),
                Err(_) => SettingsState::Corrupt,
            }
        }
    };

    let mut books = Vec::new();
    for folder in root_files.iter().filter(|f| f.is_folder()) {
        let files = store.list_folder(&folder.id).await?;
        books.push((folder.name.clone(), files));
    }

    Ok(StructureReport::assess(Some(root.id), settings, books))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> DriveFile {
        DriveFile {
            id: format!("id-{name}"),
            name: name.into(),
            mime_type: "text/markdown".into(),
            modified_time: None,
        }
    }

    fn configured() -> SettingsState {
        SettingsState::Present(GlobalSettings {
            sender_email: "me@example.com".into(),
            app_password: "pw".into(),
            destination_email: "me@kindle.com".into(),
        })
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let report = StructureReport::assess(None, SettingsState::Missing, Vec::new());
        assert!(!report.is_ok());
        assert!(report.books.is_empty());
    }

    #[test]
    fn test_healthy_library() {
        let books = vec![(
            "Japanese".to_string(),
            vec![file(BOOK_SETTINGS_FILE), file("01.md"), file("02.md")],
        )];
        let report = StructureReport::assess(Some("root".into()), configured(), books);
        assert!(report.is_ok());
        assert!(report.warnings.is_empty());
        assert_eq!(report.books[0].page_count, 2);
    }

    #[test]
    fn test_book_without_settings() {
        let books = vec![("Notes".to_string(), vec![file("a.md")])];
        let report = StructureReport::assess(Some("root".into()), configured(), books);
        assert_eq!(report.errors, ["Notes: missing .book_settings.json"]);
        assert!(!report.books[0].has_settings);
    }

    #[test]
    fn test_warnings() {
        let report = StructureReport::assess(
            Some("root".into()),
            SettingsState::Present(GlobalSettings::default()),
            Vec::new(),
        );
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 3);

        let report =
            StructureReport::assess(Some("root".into()), SettingsState::Corrupt, Vec::new());
        assert!(!report.is_ok());
    }
}
