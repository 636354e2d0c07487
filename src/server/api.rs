//! JSON API handlers for books, pages, settings and exports.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::book::{BookSettings, GlobalSettings};
use crate::delivery::Sender;
use crate::error::Error;
use crate::export::{Artifact, Format, compile};
use crate::markdown::normalize_page_name;
use crate::store::{self, PageStore};

use super::{ApiError, AppState, BookStore};

type ApiResult<T> = Result<T, ApiError>;

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// The book a page request is about.
///
/// Local mode falls back to the configured default book; Drive mode
/// requires it.
fn resolve_book(state: &AppState, book: Option<String>) -> Result<String, Error> {
    match book.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()) {
        Some(book) => Ok(book),
        None if !state.is_drive() => Ok(state.config.default_book.clone()),
        None => Err(Error::InvalidInput("Book name required".into())),
    }
}

#[derive(Deserialize)]
pub struct BookQuery {
    book: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateBook {
    name: Option<String>,
}

pub async fn list_books(BookStore(store): BookStore) -> ApiResult<impl IntoResponse> {
    Ok(Json(store.list_books().await?))
}

pub async fn create_book(
    BookStore(store): BookStore,
    Json(body): Json<CreateBook>,
) -> ApiResult<impl IntoResponse> {
    let name = body
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::InvalidInput("Book name required".into()))?;
    info!("Creating book: {}", name);
    store.create_book(&name).await?;
    Ok((StatusCode::CREATED, Json(json!({ "name": name }))))
}

pub async fn delete_book(
    BookStore(store): BookStore,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    info!("Deleting book: {}", name);
    store.delete_book(&name).await?;
    Ok(success())
}

pub async fn get_book_settings(
    BookStore(store): BookStore,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(store.book_settings(&name).await?))
}

pub async fn save_book_settings(
    BookStore(store): BookStore,
    Path(name): Path<String>,
    Json(settings): Json<BookSettings>,
) -> ApiResult<impl IntoResponse> {
    info!("Saving settings for book: {}", name);
    store.save_book_settings(&name, &settings).await?;
    Ok(success())
}

pub async fn get_global_settings(BookStore(store): BookStore) -> ApiResult<impl IntoResponse> {
    Ok(Json(store.global_settings().await?))
}

pub async fn save_global_settings(
    BookStore(store): BookStore,
    Json(settings): Json<GlobalSettings>,
) -> ApiResult<impl IntoResponse> {
    info!("Saving global settings");
    store.save_global_settings(&settings).await?;
    Ok(success())
}

pub async fn list_pages(
    State(state): State<AppState>,
    BookStore(store): BookStore,
    Query(query): Query<BookQuery>,
) -> ApiResult<impl IntoResponse> {
    let book = resolve_book(&state, query.book)?;
    Ok(Json(store.list_pages(&book).await?))
}

#[derive(Deserialize)]
pub struct CreatePage {
    book: Option<String>,
    name: Option<String>,
}

pub async fn create_page(
    State(state): State<AppState>,
    BookStore(store): BookStore,
    Json(body): Json<CreatePage>,
) -> ApiResult<impl IntoResponse> {
    let book = resolve_book(&state, body.book)?;
    let name = body
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::InvalidInput("Page name required".into()))?;
    let filename = store::create_page(store.as_ref(), &book, &name).await?;
    info!("Created page {}/{}", book, filename);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "filename": filename })),
    ))
}

pub async fn read_page(
    State(state): State<AppState>,
    BookStore(store): BookStore,
    Path(filename): Path<String>,
    Query(query): Query<BookQuery>,
) -> ApiResult<impl IntoResponse> {
    let book = resolve_book(&state, query.book)?;
    let content = store.read_page(&book, &filename).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        content,
    ))
}

#[derive(Deserialize)]
pub struct SavePage {
    book: Option<String>,
    content: Option<String>,
}

pub async fn save_page(
    State(state): State<AppState>,
    BookStore(store): BookStore,
    Path(filename): Path<String>,
    Json(body): Json<SavePage>,
) -> ApiResult<impl IntoResponse> {
    let book = resolve_book(&state, body.book)?;
    let content = body
        .content
        .ok_or_else(|| Error::InvalidInput("Page content required".into()))?;
    store.write_page(&book, &filename, &content).await?;
    Ok(success())
}

pub async fn delete_page(
    State(state): State<AppState>,
    BookStore(store): BookStore,
    Path(filename): Path<String>,
    Query(query): Query<BookQuery>,
) -> ApiResult<impl IntoResponse> {
    let book = resolve_book(&state, query.book)?;
    info!("Deleting page {}/{}", book, filename);
    store.delete_page(&book, &filename).await?;
    Ok(success())
}

#[derive(Deserialize)]
pub struct RenamePage {
    book: Option<String>,
    new_name: Option<String>,
}

pub async fn rename_page(
    State(state): State<AppState>,
    BookStore(store): BookStore,
    Path(filename): Path<String>,
    Json(body): Json<RenamePage>,
) -> ApiResult<impl IntoResponse> {
    let book = resolve_book(&state, body.book)?;
    let new_name = body
        .new_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .map(|n| normalize_page_name(&n))
        .ok_or_else(|| Error::InvalidInput("New name required".into()))?;
    store.rename_page(&book, &filename, &new_name).await?;
    info!("Renamed {}/{} to {}", book, filename, new_name);
    Ok(Json(json!({ "success": true, "filename": new_name })))
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    format: Option<String>,
}

pub async fn download_book(
    State(state): State<AppState>,
    BookStore(store): BookStore,
    Path(name): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let format: Format = query.format.as_deref().unwrap_or("epub").parse()?;
    info!("Generating {} for book: {}", format.extension(), name);

    let artifact = build_artifact(&state, store.as_ref(), &name, format).await?;
    let filename = artifact.filename(&name);
    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type().to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(&filename)),
        ],
        artifact.data,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct SendRequest {
    book: Option<String>,
}

pub async fn send_to_kindle(
    State(state): State<AppState>,
    BookStore(store): BookStore,
    Json(body): Json<SendRequest>,
) -> ApiResult<impl IntoResponse> {
    let book = resolve_book(&state, body.book)?;
    let settings = store.global_settings().await?;
    let (sender, destination) = Sender::from_settings(&settings)?;

    let artifact = build_artifact(&state, store.as_ref(), &book, Format::Epub).await?;
    let filename = artifact.filename(&book);
    state
        .delivery
        .deliver(&sender, &artifact, &filename, &destination)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Sent to {destination}"),
    })))
}

/// Load and compile a book, keeping a debug copy when configured.
async fn build_artifact(
    state: &AppState,
    store: &dyn PageStore,
    book: &str,
    format: Format,
) -> Result<Artifact, Error> {
    let manuscript = store::load_manuscript(store, book).await?;
    let artifact = compile(&manuscript, format)?;

    if let Some(dir) = &state.config.debug_export_dir {
        let path = dir.join(artifact.filename(book));
        let written = match tokio::fs::create_dir_all(dir).await {
            Ok(()) => tokio::fs::write(&path, &artifact.data).await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => info!("Wrote debug copy to {}", path.display()),
            Err(e) => warn!("Could not write debug copy {}: {}", path.display(), e),
        }
    }

    Ok(artifact)
}

/// `Content-Disposition` for a download, with an ASCII fallback name.
fn attachment_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(filename, NON_ALPHANUMERIC)
    )
}
