//! Request extractors.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::SignedCookieJar;
use chrono::Utc;
use tracing::warn;

use crate::auth::OAuthClient;
use crate::error::Error;
use crate::store::drive::{DriveClient, DriveStore};
use crate::store::PageStore;

use super::{ApiError, AppState, Backend};

/// Name of the signed cookie holding the session id.
pub const SESSION_COOKIE: &str = "jugaadpress_session";

/// Session id from the signed cookie, if any.
pub(super) fn session_id(parts: &Parts, state: &AppState) -> Option<String> {
    SignedCookieJar::from_headers(&parts.headers, state.key.clone())
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

/// Page store for the current request.
///
/// Rejects with 401 in Drive mode when there is no signed-in session.
pub struct BookStore(pub Arc<dyn PageStore>);

impl FromRequestParts<AppState> for BookStore {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        match &state.backend {
            Backend::Shared(store) => Ok(BookStore(store.clone())),
            Backend::Drive(oauth) => {
                let id = session_id(parts, state).ok_or(Error::Unauthorized)?;
                let token = access_token(state, oauth, &id).await?;
                let client = DriveClient::new(state.http.clone(), token)
                    .with_base_url(state.config.drive_api_base.as_str());
                Ok(BookStore(Arc::new(DriveStore::new(
                    client,
                    state.config.drive_root_folder.clone(),
                ))))
            }
        }
    }
}

/// A usable access token for the session, refreshing an expired one.
async fn access_token(state: &AppState, oauth: &OAuthClient, id: &str) -> Result<String, Error> {
    let session = state.sessions.get(id).ok_or(Error::Unauthorized)?;
    let tokens = session.tokens.ok_or(Error::Unauthorized)?;
    if !tokens.is_expired(Utc::now()) {
        return Ok(tokens.access_token);
    }

    let fresh = oauth.refresh(&tokens).await.map_err(|e| {
        warn!("Token refresh failed: {}", e);
        Error::Unauthorized
    })?;
    let token = fresh.access_token.clone();
    state.sessions.update(id, |s| s.tokens = Some(fresh));
    Ok(token)
}
