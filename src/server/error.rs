//! Mapping of crate errors to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::error::Error;

/// Handler error: status code plus `{"error": message}`.
///
/// Server-side failures are logged in full; the client only gets a short
/// generic message.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::NotFound(_) | Error::NoContent => StatusCode::NOT_FOUND,
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::InvalidName(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Drive { status: 401, .. } => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match &self.0 {
            Error::NotFound(what) => format!("{what} not found"),
            Error::NoContent => "No pages found in book".to_string(),
            Error::AlreadyExists(what) => format!("{what} already exists"),
            Error::InvalidName(_) | Error::InvalidInput(_) => self.0.to_string(),
            Error::Unauthorized | Error::Drive { status: 401, .. } => {
                "Not authenticated".to_string()
            }
            Error::Render(_) => "Failed to generate book".to_string(),
            Error::Mail(_) => "Failed to send email".to_string(),
            Error::Drive { .. } | Error::Http(_) => "Storage backend error".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}
