//! Minimal Google Drive v3 REST client.
//!
//! Only the calls the page store needs: query, create, upload, download,
//! rename and trash. Every call goes through the [`RetryPolicy`].

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::random_token;
use crate::error::{Error, Result};

use super::retry::RetryPolicy;

/// Origin of the Drive REST API.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

const FILE_FIELDS: &str = "nextPageToken,files(id,name,mimeType,modifiedTime)";

/// File metadata as returned by `files.list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub modified_time: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

/// Escape a value for use inside a single-quoted Drive query string.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Drive client authorized with one user's access token.
#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    access_token: String,
    retry: RetryPolicy,
    api_base: String,
}

impl DriveClient {
    pub fn new(http: reqwest::Client, access_token: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
            retry: RetryPolicy::default(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send requests to another origin, such as a local Drive stand-in.
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.api_base)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    /// All non-trashed files matching `query`, following pagination.
    pub async fn list(&self, query: &str) -> Result<Vec<DriveFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.as_deref();
            let url = &self.files_url();
            let page: FileList = self
                .retry
                .run("Drive list", move || async move {
                    let mut params = vec![
                        ("q", query.to_string()),
                        ("spaces", "drive".to_string()),
                        ("fields", FILE_FIELDS.to_string()),
                        ("pageSize", "1000".to_string()),
                    ];
                    if let Some(token) = token {
                        params.push(("pageToken", token.to_string()));
                    }
                    let resp = self
                        .request(Method::GET, url)
                        .query(&params)
                        .send()
                        .await?;
                    Ok::<FileList, Error>(check(resp, "list").await?.json().await?)
                })
                .await?;

            files.extend(page.files);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Drive query {:?} matched {} files", query, files.len());
        Ok(files)
    }

    /// Create a file or folder from metadata only. Returns its id.
    pub async fn create(&self, name: &str, mime_type: &str, parent: Option<&str>) -> Result<String> {
        let mut metadata = json!({ "name": name, "mimeType": mime_type });
        if let Some(parent) = parent {
            metadata["parents"] = json!([parent]);
        }

        let metadata = &metadata;
        let url = &self.files_url();
        let created: Created = self
            .retry
            .run("Drive create", move || async move {
                let resp = self
                    .request(Method::POST, url)
                    .query(&[("fields", "id")])
                    .json(metadata)
                    .send()
                    .await?;
                Ok::<Created, Error>(check(resp, "create").await?.json().await?)
            })
            .await?;
        Ok(created.id)
    }

    /// Replace the content of an existing file.
    pub async fn upload(&self, id: &str, mime_type: &str, content: &[u8]) -> Result<()> {
        let url = &format!("{}/{}", self.upload_url(), id);
        self.retry
            .run("Drive upload", move || async move {
                let resp = self
                    .request(Method::PATCH, url)
                    .query(&[("uploadType", "media")])
                    .header(CONTENT_TYPE, mime_type)
                    .body(content.to_vec())
                    .send()
                    .await?;
                check(resp, "upload").await?;
                Ok::<_, Error>(())
            })
            .await
    }

    /// Create a file with content in one `multipart/related` upload.
    /// Returns its id.
    pub async fn create_with_content(
        &self,
        name: &str,
        mime_type: &str,
        parent: &str,
        content: &[u8],
    ) -> Result<String> {
        let metadata = json!({ "name": name, "mimeType": mime_type, "parents": [parent] });
        let boundary = random_token(32);
        let body = &multipart_related(&boundary, &metadata, mime_type, content);
        let content_type = &format!("multipart/related; boundary={}", boundary);
        let url = &self.upload_url();

        let created: Created = self
            .retry
            .run("Drive create", move || async move {
                let resp = self
                    .request(Method::POST, url)
                    .query(&[("uploadType", "multipart"), ("fields", "id")])
                    .header(CONTENT_TYPE, content_type.as_str())
                    .body(body.clone())
                    .send()
                    .await?;
                Ok::<Created, Error>(check(resp, "create").await?.json().await?)
            })
            .await?;
        Ok(created.id)
    }

    pub async fn download(&self, id: &str) -> Result<Vec<u8>> {
        let url = &format!("{}/{}", self.files_url(), id);
        self.retry
            .run("Drive download", move || async move {
                let resp = self
                    .request(Method::GET, url)
                    .query(&[("alt", "media")])
                    .send()
                    .await?;
                Ok::<_, Error>(check(resp, "download").await?.bytes().await?.to_vec())
            })
            .await
    }

    /// Move a file or folder to the trash.
    pub async fn trash(&self, id: &str) -> Result<()> {
        self.patch_metadata(id, json!({ "trashed": true }), "trash").await
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<()> {
        self.patch_metadata(id, json!({ "name": name }), "rename").await
    }

    async fn patch_metadata(&self, id: &str, body: serde_json::Value, what: &str) -> Result<()> {
        let body = &body;
        let url = &format!("{}/{}", self.files_url(), id);
        self.retry
            .run("Drive update", move || async move {
                let resp = self
                    .request(Method::PATCH, url)
                    .json(body)
                    .send()
                    .await?;
                check(resp, what).await?;
                Ok::<_, Error>(())
            })
            .await
    }
}

/// Metadata part followed by the content part.
fn multipart_related(
    boundary: &str,
    metadata: &serde_json::Value,
    mime_type: &str,
    content: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{boundary}\r\nContent-Type: {mime_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// Turn a non-success response into [`Error::Drive`].
async fn check(resp: Response, what: &str) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    warn!("Drive {} failed: {} {}", what, status, body);
    Err(Error::Drive {
        status,
        message: drive_error_message(&body).unwrap_or(body),
    })
}

/// Pull `error.message` out of a Drive error body.
fn drive_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["error"]["message"].as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_query_value() {
        assert_eq!(escape_query_value("Ram's notes"), "Ram\\'s notes");
        assert_eq!(escape_query_value("a\\b"), "a\\\\b");
        assert_eq!(escape_query_value("plain"), "plain");
    }

    #[test]
    fn test_file_list_parses() {
        let json = r#"{
            "files": [
                {"id": "1", "name": "Notes", "mimeType": "application/vnd.google-apps.folder",
                 "modifiedTime": "2024-05-01T10:00:00.000Z"},
                {"id": "2", "name": "01.md", "mimeType": "text/markdown"}
            ]
        }"#;
        let list: FileList = serde_json::from_str(json).unwrap();
        assert!(list.next_page_token.is_none());
        assert!(list.files[0].is_folder());
        assert!(!list.files[1].is_folder());
        assert_eq!(list.files[1].modified_time, None);
    }

    #[test]
    fn test_multipart_related_layout() {
        let metadata = json!({ "name": "01.md" });
        let body = multipart_related("XYZ", &metadata, "text/markdown", b"# Hi");
        let text = String::from_utf8(body).unwrap();
        assert_eq!(
            text,
            "--XYZ\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{\"name\":\"01.md\"}\r\n\
             --XYZ\r\nContent-Type: text/markdown\r\n\r\n# Hi\r\n--XYZ--\r\n"
        );
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = DriveClient::new(reqwest::Client::new(), "t").with_base_url("http://127.0.0.1:9/");
        assert_eq!(client.files_url(), "http://127.0.0.1:9/drive/v3/files");
        assert_eq!(client.upload_url(), "http://127.0.0.1:9/upload/drive/v3/files");
    }

    #[test]
    fn test_drive_error_message() {
        let body = r#"{"error": {"code": 404, "message": "File not found: abc."}}"#;
        assert_eq!(drive_error_message(body).as_deref(), Some("File not found: abc."));
        assert_eq!(drive_error_message("<html>"), None);
    }
}
