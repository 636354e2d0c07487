//! Google sign-in for the Drive-backed mode.

pub mod installed;
mod oauth;
mod session;

pub use oauth::{ClientSecrets, OAuthClient, SCOPE_DRIVE_FILE, Tokens, UserInfo, WEB_SCOPES};
pub use session::{Session, SessionStore, random_token};
