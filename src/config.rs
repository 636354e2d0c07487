//! Server configuration loaded from environment variables.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rand::RngCore;
use tracing::info;

use crate::delivery::{DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT};
use crate::error::{Error, Result};
use crate::store::drive::{DEFAULT_API_BASE, DEFAULT_ROOT_FOLDER};

/// Length of the cookie-signing secret in bytes.
const SECRET_LEN: usize = 64;

/// Which backend holds the books.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Directory tree on this machine, no sign-in.
    Local,
    /// Each signed-in user's Google Drive.
    Drive,
}

impl FromStr for StoreMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StoreMode::Local),
            "drive" => Ok(StoreMode::Drive),
            other => Err(Error::Config(format!(
                "invalid STORE_MODE '{other}'. Use local or drive"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (default: 127.0.0.1)
    pub host: String,
    /// Server port (default: 5000)
    pub port: u16,
    pub store_mode: StoreMode,
    /// Root of the local library (default: ./library)
    pub pages_dir: PathBuf,
    /// Book used when a local-mode request names none (default: pages)
    pub default_book: String,
    /// Front-end assets (default: ./static)
    pub static_dir: PathBuf,
    /// Cookie-signing secret, created on first start (default: ./.secret_key)
    pub secret_key_file: PathBuf,
    /// OAuth client registration (default: ./client_secret.json)
    pub client_secrets_file: PathBuf,
    pub oauth_redirect_uri: String,
    /// Session lifetime, refreshed on every request (default: 3600s)
    pub session_lifetime: Duration,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Drive folder holding all books (default: JugaadPress)
    pub drive_root_folder: String,
    /// Origin of the Drive REST API
    pub drive_api_base: String,
    /// When set, every compiled artifact is also written here.
    pub debug_export_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            store_mode: StoreMode::Local,
            pages_dir: PathBuf::from("./library"),
            default_book: "pages".to_string(),
            static_dir: PathBuf::from("./static"),
            secret_key_file: PathBuf::from("./.secret_key"),
            client_secrets_file: PathBuf::from("./client_secret.json"),
            oauth_redirect_uri: "http://localhost:5000/oauth2callback".to_string(),
            session_lifetime: Duration::from_secs(3600),
            smtp_host: DEFAULT_SMTP_HOST.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            drive_root_folder: DEFAULT_ROOT_FOLDER.to_string(),
            drive_api_base: DEFAULT_API_BASE.to_string(),
            debug_export_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env`).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup; unset keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Config::default();

        if let Some(host) = get("HOST") {
            config.host = host;
        }
        if let Some(port) = get("PORT") {
            config.port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid PORT '{port}'")))?;
        }
        if let Some(mode) = get("STORE_MODE") {
            config.store_mode = mode.parse()?;
        }
        if let Some(dir) = get("PAGES_DIR") {
            config.pages_dir = PathBuf::from(dir);
        }
        if let Some(book) = get("DEFAULT_BOOK") {
            config.default_book = book;
        }
        if let Some(dir) = get("STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("SECRET_KEY_FILE") {
            config.secret_key_file = PathBuf::from(path);
        }
        if let Some(path) = get("CLIENT_SECRETS_FILE") {
            config.client_secrets_file = PathBuf::from(path);
        }
        if let Some(uri) = get("OAUTH_REDIRECT_URI") {
            config.oauth_redirect_uri = uri;
        }
        if let Some(secs) = get("SESSION_LIFETIME_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| Error::Config(format!("invalid SESSION_LIFETIME_SECS '{secs}'")))?;
            config.session_lifetime = Duration::from_secs(secs);
        }
        if let Some(host) = get("SMTP_HOST") {
            config.smtp_host = host;
        }
        if let Some(port) = get("SMTP_PORT") {
            config.smtp_port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid SMTP_PORT '{port}'")))?;
        }
        if let Some(folder) = get("DRIVE_ROOT_FOLDER") {
            config.drive_root_folder = folder;
        }
        if let Some(base) = get("DRIVE_API_BASE") {
            config.drive_api_base = base;
        }
        config.debug_export_dir = get("DEBUG_EXPORT_DIR").map(PathBuf::from);

        Ok(config)
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read the cookie-signing secret, generating and saving one when missing.
pub fn load_or_create_secret(path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(secret) if secret.len() >= SECRET_LEN => return Ok(secret),
        Ok(_) => info!("Secret in {} is too short, replacing it", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let mut secret = vec![0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut secret);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &secret)?;
    info!("Generated new secret key in {}", path.display());
    Ok(secret)
}
