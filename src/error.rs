//! Error types for jugaadpress operations.

use thiserror::Error;

/// Errors that can occur while storing, compiling, or delivering books.
#[derive(Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no content to compile")]
    NoContent,

    #[error("not authenticated")]
    Unauthorized,

    #[error("rendering failed: {0}")]
    Render(String),

    #[error("Drive API error {status}: {message}")]
    Drive { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail delivery failed: {0}")]
    Mail(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl Error {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Only server-side Drive failures and connection-level HTTP failures
    /// qualify; not-found and permission errors are final.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Drive { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_transient() {
        for status in [500, 502, 503, 504] {
            let err = Error::Drive {
                status,
                message: "backend".into(),
            };
            assert!(err.is_transient(), "{status} should be retried");
        }
    }

    #[test]
    fn test_client_errors_are_final() {
        for status in [400, 401, 403, 404, 429] {
            let err = Error::Drive {
                status,
                message: "nope".into(),
            };
            assert!(!err.is_transient(), "{status} should not be retried");
        }
        assert!(!Error::NotFound("a.md".into()).is_transient());
    }
}
