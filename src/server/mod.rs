//! HTTP surface.
//!
//! One router serves both modes. In local mode every request shares one
//! [`LocalStore`]; in Drive mode the store is built per request from the
//! signed-in user's session (see [`BookStore`]).

mod api;
mod error;
mod extract;
mod login;

pub use error::ApiError;
pub use extract::{BookStore, SESSION_COOKIE};

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::FromRef;
use axum::routing::{get, post};
use axum_extra::extract::cookie::Key;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{ClientSecrets, OAuthClient, SessionStore};
use crate::config::{Config, StoreMode, load_or_create_secret};
use crate::delivery::{Delivery, SmtpDelivery};
use crate::error::{Error, Result};
use crate::store::{LocalStore, PageStore};

/// Where requests get their page store from.
#[derive(Clone)]
pub enum Backend {
    /// One store shared by every request.
    Shared(Arc<dyn PageStore>),
    /// Per-user Google Drive.
    Drive(Arc<OAuthClient>),
}

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Backend,
    pub sessions: Arc<SessionStore>,
    pub delivery: Arc<dyn Delivery>,
    pub http: reqwest::Client,
    key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

impl AppState {
    /// Build the state the configuration asks for.
    pub fn from_config(config: Config) -> Result<Self> {
        let secret = load_or_create_secret(&config.secret_key_file)?;
        let key = Key::try_from(secret.as_slice())
            .map_err(|e| Error::Config(format!("invalid secret key: {e}")))?;
        let http = reqwest::Client::new();

        let backend = match config.store_mode {
            StoreMode::Local => {
                info!("Serving books from {}", config.pages_dir.display());
                Backend::Shared(Arc::new(LocalStore::new(&config.pages_dir)))
            }
            StoreMode::Drive => {
                let secrets = ClientSecrets::from_file(&config.client_secrets_file)?;
                info!("Serving books from Google Drive ({})", config.drive_root_folder);
                Backend::Drive(Arc::new(OAuthClient::new(
                    secrets,
                    config.oauth_redirect_uri.clone(),
                    http.clone(),
                )))
            }
        };

        let delivery = Arc::new(SmtpDelivery::new(&config.smtp_host, config.smtp_port));
        Ok(Self::new(config, backend, delivery, key, http))
    }

    pub fn new(
        config: Config,
        backend: Backend,
        delivery: Arc<dyn Delivery>,
        key: Key,
        http: reqwest::Client,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session_lifetime));
        Self {
            config: Arc::new(config),
            backend,
            sessions,
            delivery,
            http,
            key,
        }
    }

    /// State over a single shared store with a random cookie key.
    pub fn shared(config: Config, store: Arc<dyn PageStore>, delivery: Arc<dyn Delivery>) -> Self {
        Self::new(
            config,
            Backend::Shared(store),
            delivery,
            Key::generate(),
            reqwest::Client::new(),
        )
    }

    pub fn is_drive(&self) -> bool {
        matches!(self.backend, Backend::Drive(_))
    }
}

/// Create the application router.
pub fn router(state: AppState) -> Router {
    let static_dir = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/login", get(login::login))
        .route("/oauth2callback", get(login::callback))
        .route("/logout", get(login::logout))
        .route("/api/user", get(login::user))
        .route("/api/books", get(api::list_books).post(api::create_book))
        .route("/api/books/{name}", axum::routing::delete(api::delete_book))
        .route(
            "/api/books/{name}/settings",
            get(api::get_book_settings).post(api::save_book_settings),
        )
        .route("/api/books/{name}/download", get(api::download_book))
        .route(
            "/api/settings/global",
            get(api::get_global_settings).post(api::save_global_settings),
        )
        .route("/api/pages", get(api::list_pages).post(api::create_page))
        .route(
            "/api/pages/{filename}",
            get(api::read_page)
                .post(api::save_page)
                .delete(api::delete_page),
        )
        .route("/api/page/{filename}/rename", post(api::rename_page))
        .route("/api/send-to-kindle", post(api::send_to_kindle))
        .fallback_service(static_dir)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server until the process is stopped.
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.server_addr();
    let state = AppState::from_config(config)?;

    // Sweep expired sessions in the background
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                info!("Purged {} expired sessions", purged);
            }
        }
    });

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("JugaadPress listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
