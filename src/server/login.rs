//! Sign-in routes for Drive mode.

use axum::Json;
use axum::extract::{FromRequestParts, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::auth::{UserInfo, WEB_SCOPES, random_token};
use crate::error::Error;

use super::extract::session_id;
use super::{ApiError, AppState, Backend, SESSION_COOKIE};

const SESSION_EXPIRED_PAGE: &str = "<h1>Session Expired</h1>\
<p>Your session expired. This can happen if you pressed the back button or took too long.</p>\
<p><a href=\"/\">Click here to sign in again</a></p>";

const AUTH_ERROR_PAGE: &str = "<h1>Authentication Error</h1>\
<p>Signing in with Google failed.</p>\
<p><a href=\"/\">Click here to try again</a></p>";

fn session_cookie(id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Session id of the request, if it has one.
pub struct SessionId(Option<String>);

impl FromRequestParts<AppState> for SessionId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(SessionId(session_id(parts, state)))
    }
}

/// GET /login - start the Google sign-in.
pub async fn login(
    State(state): State<AppState>,
    SessionId(existing): SessionId,
    jar: SignedCookieJar,
) -> Result<Response, ApiError> {
    let Backend::Drive(oauth) = &state.backend else {
        return Ok(Redirect::to("/").into_response());
    };

    let oauth_state = random_token(32);
    let id = match existing {
        Some(id) if state.sessions.update(&id, |s| s.oauth_state = Some(oauth_state.clone())) => id,
        _ => {
            let id = state.sessions.create();
            state
                .sessions
                .update(&id, |s| s.oauth_state = Some(oauth_state.clone()));
            id
        }
    };

    let url = oauth.authorize_url(&oauth_state, WEB_SCOPES)?;
    info!("OAuth flow initiated");
    Ok((jar.add(session_cookie(id)), Redirect::to(&url)).into_response())
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /oauth2callback - finish the sign-in.
pub async fn callback(
    State(state): State<AppState>,
    SessionId(id): SessionId,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Backend::Drive(oauth) = &state.backend else {
        return Redirect::to("/").into_response();
    };

    let expected = id
        .as_deref()
        .and_then(|id| state.sessions.get(id))
        .and_then(|s| s.oauth_state);
    let (Some(id), Some(expected)) = (id, expected) else {
        warn!("OAuth callback without a pending sign-in");
        return (StatusCode::BAD_REQUEST, Html(SESSION_EXPIRED_PAGE)).into_response();
    };
    if query.state.as_deref() != Some(expected.as_str()) {
        warn!("OAuth callback state mismatch");
        return (StatusCode::BAD_REQUEST, Html(SESSION_EXPIRED_PAGE)).into_response();
    }

    let Some(code) = query.code else {
        warn!("OAuth callback without code: {:?}", query.error);
        return (StatusCode::BAD_REQUEST, Html(AUTH_ERROR_PAGE)).into_response();
    };

    let result = async {
        let tokens = oauth.exchange_code(&code).await?;
        let user = oauth.userinfo(&tokens.access_token).await?;
        Ok::<_, Error>((tokens, user))
    }
    .await;

    match result {
        Ok((tokens, user)) => {
            info!(
                "User authenticated: {}",
                user.email.as_deref().unwrap_or("(no email)")
            );
            state.sessions.update(&id, |s| {
                s.oauth_state = None;
                s.tokens = Some(tokens);
                s.user = Some(user);
            });
            Redirect::to("/").into_response()
        }
        Err(e) => {
            error!("OAuth callback error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Html(AUTH_ERROR_PAGE)).into_response()
        }
    }
}

/// GET /logout
pub async fn logout(
    State(state): State<AppState>,
    SessionId(id): SessionId,
    jar: SignedCookieJar,
) -> impl IntoResponse {
    if let Some(id) = id {
        state.sessions.remove(&id);
    }
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/"),
    )
}

#[derive(Serialize)]
struct UserResponse {
    mode: &'static str,
    #[serde(flatten)]
    user: UserInfo,
}

/// GET /api/user
pub async fn user(
    State(state): State<AppState>,
    SessionId(id): SessionId,
) -> Result<Json<impl Serialize>, ApiError> {
    if !state.is_drive() {
        return Ok(Json(UserResponse {
            mode: "local",
            user: UserInfo::default(),
        }));
    }

    let session = id
        .and_then(|id| state.sessions.get(&id))
        .filter(|s| s.is_authenticated())
        .ok_or(Error::Unauthorized)?;
    Ok(Json(UserResponse {
        mode: "drive",
        user: session.user.unwrap_or_default(),
    }))
}
