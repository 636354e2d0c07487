//! HTTP API tests against a local store in a temporary directory.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use jugaadpress::config::Config;
use jugaadpress::delivery::{Delivery, Sender};
use jugaadpress::export::Artifact;
use jugaadpress::server::{AppState, router};
use jugaadpress::{LocalStore, Result};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

/// Records deliveries instead of sending mail.
#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(String, String, usize)>>,
}

#[async_trait]
impl Delivery for Outbox {
    async fn deliver(
        &self,
        _sender: &Sender,
        artifact: &Artifact,
        filename: &str,
        destination: &str,
    ) -> Result<()> {
        self.sent.lock().unwrap().push((
            filename.to_string(),
            destination.to_string(),
            artifact.data.len(),
        ));
        Ok(())
    }
}

struct TestApp {
    _dir: TempDir,
    app: Router,
    outbox: Arc<Outbox>,
}

fn app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = Config {
        pages_dir: dir.path().to_path_buf(),
        static_dir: dir.path().join("static"),
        ..Config::default()
    };
    let store = Arc::new(LocalStore::new(dir.path()));
    let outbox = Arc::new(Outbox::default());
    let state = AppState::shared(config, store, outbox.clone());
    TestApp {
        _dir: dir,
        app: router(state),
        outbox,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_health() {
    let t = app();
    let (status, body) = send(&t.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_local_user() {
    let t = app();
    let (status, body) = send_json(&t.app, "GET", "/api/user", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "local");
}

#[tokio::test]
async fn test_book_lifecycle() {
    let t = app();

    let (status, body) = send_json(&t.app, "POST", "/api/books", Some(json!({ "name": "Japanese" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Japanese");

    let (status, _) = send_json(&t.app, "POST", "/api/books", Some(json!({ "name": "Japanese" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send_json(&t.app, "POST", "/api/books", Some(json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send_json(&t.app, "GET", "/api/books", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Japanese");
    assert_eq!(body[0]["pageCount"], 0);

    let (status, _) = send_json(
        &t.app,
        "POST",
        "/api/books/Japanese/settings",
        Some(json!({ "title": "日本語ノート" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send_json(&t.app, "GET", "/api/books/Japanese/settings", None).await;
    assert_eq!(body["title"], "日本語ノート");

    let (status, _) = send_json(&t.app, "DELETE", "/api/books/Japanese", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&t.app, "DELETE", "/api/books/Japanese", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_page_lifecycle() {
    let t = app();

    let (status, body) = send_json(
        &t.app,
        "POST",
        "/api/pages",
        Some(json!({ "book": "Japanese", "name": "01_intro" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["filename"], "01_intro.md");

    let (status, _) = send_json(
        &t.app,
        "POST",
        "/api/pages",
        Some(json!({ "book": "Japanese", "name": "01_intro.md" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send_json(
        &t.app,
        "POST",
        "/api/pages/01_intro.md",
        Some(json!({ "book": "Japanese", "content": "# Intro\n" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&t.app, "GET", "/api/pages/01_intro.md?book=Japanese", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"# Intro\n");

    let (status, body) = send_json(
        &t.app,
        "POST",
        "/api/page/01_intro.md/rename",
        Some(json!({ "book": "Japanese", "new_name": "00_start" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "00_start.md");

    let (_, body) = send_json(&t.app, "GET", "/api/pages?book=Japanese", None).await;
    assert_eq!(body, json!(["00_start.md"]));

    let (status, _) = send_json(&t.app, "DELETE", "/api/pages/00_start.md?book=Japanese", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&t.app, "GET", "/api/pages/00_start.md?book=Japanese", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pages_default_to_configured_book() {
    let t = app();
    let (status, _) = send_json(&t.app, "POST", "/api/pages", Some(json!({ "name": "todo" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send_json(&t.app, "GET", "/api/pages?book=pages", None).await;
    assert_eq!(body, json!(["todo.md"]));
}

#[tokio::test]
async fn test_invalid_names_rejected() {
    let t = app();
    let (status, _) = send(&t.app, "GET", "/api/pages/.secret.md?book=Japanese", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&t.app, "GET", "/api/pages/x.md?book=..", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download() {
    let t = app();

    let (status, body) = send_json(&t.app, "GET", "/api/books/Japanese/download", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    for (name, content) in [
        ("01_intro.md", "# Intro\nSee [grammar](./02_grammar.md)"),
        ("02_grammar.md", "# Grammar"),
    ] {
        send_json(
            &t.app,
            "POST",
            &format!("/api/pages/{name}"),
            Some(json!({ "book": "Japanese", "content": content })),
        )
        .await;
    }

    let request = Request::builder()
        .uri("/api/books/Japanese/download")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/epub+zip");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"Japanese.epub\""));

    let (status, body) = send(&t.app, "GET", "/api/books/Japanese/download?format=html", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains(r##"href="#02_grammar""##));

    let (status, _) = send(&t.app, "GET", "/api/books/Japanese/download?format=mobi", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_to_kindle() {
    let t = app();
    send_json(
        &t.app,
        "POST",
        "/api/pages/01.md",
        Some(json!({ "book": "Japanese", "content": "# One" })),
    )
    .await;

    let (status, _) = send_json(&t.app, "POST", "/api/send-to-kindle", Some(json!({ "book": "Japanese" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(t.outbox.sent.lock().unwrap().is_empty());

    let (status, _) = send_json(
        &t.app,
        "POST",
        "/api/settings/global",
        Some(json!({
            "sender_email": "me@example.com",
            "app_password": "abcd efgh",
            "destination_email": "me@kindle.com",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(&t.app, "POST", "/api/send-to-kindle", Some(json!({ "book": "Japanese" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let sent = t.outbox.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "Japanese.epub");
    assert_eq!(sent[0].1, "me@kindle.com");
    assert!(sent[0].2 > 0);
}
