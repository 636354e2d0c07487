//! Persisted book and user settings.

use serde::{Deserialize, Serialize};

/// Per-book settings, stored as `.book_settings.json` inside the book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSettings {
    #[serde(default)]
    pub title: String,
    /// Base64 image, optionally a `data:` URI.
    #[serde(default)]
    pub cover: Option<String>,
}

impl BookSettings {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            cover: None,
        }
    }

    /// The configured title, falling back to the book's name.
    pub fn title_or<'a>(&'a self, book_name: &'a str) -> &'a str {
        if self.title.trim().is_empty() {
            book_name
        } else {
            &self.title
        }
    }
}

/// User-wide settings, stored as `.user_settings.json` at the store root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default)]
    pub sender_email: String,
    #[serde(default, alias = "gmail_app_password")]
    pub app_password: String,
    #[serde(default, alias = "kindle_email")]
    pub destination_email: String,
}

impl GlobalSettings {
    /// Whether enough is configured to send mail.
    pub fn is_mail_configured(&self) -> bool {
        !self.sender_email.trim().is_empty()
            && !self.app_password.is_empty()
            && !self.destination_email.trim().is_empty()
    }
}

/// A book as shown in the book list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub name: String,
    pub id: String,
    pub page_count: usize,
    pub last_modified: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_settings_accepts_migration_keys() {
        let json = r#"{"sender_email":"me@example.com","gmail_app_password":"abcd","kindle_email":"me@kindle.com"}"#;
        let settings: GlobalSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.app_password, "abcd");
        assert_eq!(settings.destination_email, "me@kindle.com");
        assert!(settings.is_mail_configured());
    }

    #[test]
    fn test_book_settings_defaults() {
        let settings: BookSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.title_or("Notes"), "Notes");
        assert!(settings.cover.is_none());

        let json = serde_json::to_value(BookSettings::new("Grammar")).unwrap();
        assert_eq!(json["title"], "Grammar");
        assert!(json["cover"].is_null());
    }

    #[test]
    fn test_book_summary_is_camel_case() {
        let summary = BookSummary {
            name: "A".into(),
            id: "1".into(),
            page_count: 2,
            last_modified: None,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["pageCount"], 2);
        assert!(json.get("lastModified").is_some());
    }
}
