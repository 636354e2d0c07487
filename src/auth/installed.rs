//! Installed-app (loopback) OAuth flow for the command-line tools.
//!
//! Tokens are cached in a JSON file; a valid cache skips the browser, an
//! expired one is refreshed, and otherwise the user is sent through the
//! consent screen with a one-shot listener on `localhost` catching the
//! redirect.

use std::path::Path;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};

use super::oauth::{ClientSecrets, OAuthClient, SCOPE_DRIVE_FILE, Tokens};
use super::session::random_token;

pub const DEFAULT_PORT: u16 = 8080;

const DONE_PAGE: &str = "<html><body><h1>Signed in</h1>\
<p>You can close this window and return to the terminal.</p></body></html>";

/// Tokens for the command-line tools, from cache or a fresh consent.
pub async fn authorize(
    secrets_path: &Path,
    token_path: &Path,
    port: u16,
    http: reqwest::Client,
) -> Result<Tokens> {
    let secrets = ClientSecrets::from_file(secrets_path)?;
    let redirect_uri = format!("http://localhost:{}/", port);
    let client = OAuthClient::new(secrets, redirect_uri, http);

    if let Some(cached) = load_tokens(token_path).await {
        if !cached.is_expired(Utc::now()) {
            return Ok(cached);
        }
        if cached.refresh_token.is_some() {
            match client.refresh(&cached).await {
                Ok(tokens) => {
                    save_tokens(token_path, &tokens).await?;
                    return Ok(tokens);
                }
                Err(e) => warn!("Refreshing cached token failed, signing in again: {}", e),
            }
        }
    }

    let tokens = consent(&client, port).await?;
    save_tokens(token_path, &tokens).await?;
    Ok(tokens)
}

async fn load_tokens(path: &Path) -> Option<Tokens> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(tokens) => Some(tokens),
        Err(e) => {
            warn!("Ignoring unreadable token cache {}: {}", path.display(), e);
            None
        }
    }
}

async fn save_tokens(path: &Path, tokens: &Tokens) -> Result<()> {
    tokio::fs::write(path, serde_json::to_vec_pretty(tokens)?).await?;
    info!("Saved credentials to {}", path.display());
    Ok(())
}

async fn consent(client: &OAuthClient, port: u16) -> Result<Tokens> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let state = random_token(24);
    let url = client.authorize_url(&state, &[SCOPE_DRIVE_FILE])?;

    println!("Open this URL in your browser to authorize access:\n\n{}\n", url);

    loop {
        let (mut stream, _) = listener.accept().await?;
        let mut request_line = String::new();
        BufReader::new(&mut stream)
            .read_line(&mut request_line)
            .await?;

        let Some(params) = parse_callback(&request_line) else {
            // Favicon requests and the like
            stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
                .await?;
            continue;
        };

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            DONE_PAGE.len(),
            DONE_PAGE
        );
        stream.write_all(response.as_bytes()).await?;

        if params.state.as_deref() != Some(state.as_str()) {
            return Err(Error::Auth("state mismatch in authorization response".into()));
        }
        return match (params.code, params.error) {
            (Some(code), _) => client.exchange_code(&code).await,
            (None, Some(error)) => Err(Error::Auth(format!("authorization denied: {error}"))),
            (None, None) => Err(Error::Auth("authorization response has no code".into())),
        };
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Callback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Parse `GET /?code=...&state=... HTTP/1.1`.
fn parse_callback(request_line: &str) -> Option<Callback> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let url = Url::parse("http://localhost").ok()?.join(parts.next()?).ok()?;

    let mut callback = Callback::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => callback.code = Some(value.into_owned()),
            "state" => callback.state = Some(value.into_owned()),
            "error" => callback.error = Some(value.into_owned()),
            _ => {}
        }
    }
    if callback == Callback::default() {
        None
    } else {
        Some(callback)
    }
}
