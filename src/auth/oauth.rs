//! Google OAuth2 authorization-code flow.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

pub const SCOPE_DRIVE_FILE: &str = "https://www.googleapis.com/auth/drive.file";

/// Scopes requested by the web login.
pub const WEB_SCOPES: &[&str] = &[
    "openid",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
    SCOPE_DRIVE_FILE,
];

/// Tokens are treated as expired this long before they actually expire.
const EXPIRY_SKEW_SECS: i64 = 60;

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// OAuth client registration, as downloaded from the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Deserialize)]
struct SecretsFile {
    web: Option<ClientSecrets>,
    installed: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse a `client_secret.json` with either a `web` or an `installed` section.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(json)?;
        file.web
            .or(file.installed)
            .ok_or_else(|| Error::Config("client secrets have no 'web' or 'installed' section".into()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read client secrets {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

/// Access and refresh tokens of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

impl TokenResponse {
    fn into_tokens(self, previous_refresh: Option<String>) -> Tokens {
        Tokens {
            access_token: self.access_token,
            // Refresh responses do not repeat the refresh token
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
        }
    }
}

/// Signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// OAuth client bound to one redirect URI.
#[derive(Clone)]
pub struct OAuthClient {
    secrets: ClientSecrets,
    redirect_uri: String,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(secrets: ClientSecrets, redirect_uri: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            secrets,
            redirect_uri: redirect_uri.into(),
            http,
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// URL to send the browser to.
    pub fn authorize_url(&self, state: &str, scopes: &[&str]) -> Result<String> {
        let scope = scopes.join(" ");
        let url = Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state),
                ("access_type", "offline"),
                ("include_granted_scopes", "true"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| Error::Config(format!("invalid auth_uri: {e}")))?;
        Ok(url.into())
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<Tokens> {
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await?;
        info!("Exchanged authorization code for tokens");
        Ok(response.into_tokens(None))
    }

    /// Get a fresh access token.
    pub async fn refresh(&self, tokens: &Tokens) -> Result<Tokens> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::Auth("access token expired and no refresh token".into()))?;
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
            ])
            .await?;
        Ok(response.into_tokens(tokens.refresh_token.clone()))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let resp = self.http.post(&self.secrets.token_uri).form(form).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!("Token endpoint returned {}: {}", status, body);
            return Err(Error::Auth(format!("token request failed: {}", status)));
        }
        Ok(resp.json().await?)
    }

    pub async fn userinfo(&self, access_token: &str) -> Result<UserInfo> {
        let resp = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!("Userinfo request failed: {} {}", status, body);
            return Err(Error::Auth(format!("userinfo request failed: {}", status)));
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEB_SECRETS: &str = r#"{
        "web": {
            "client_id": "id-123.apps.googleusercontent.com",
            "client_secret": "shh",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "redirect_uris": ["http://localhost:5000/oauth2callback"]
        }
    }"#;

    #[test]
    fn test_parse_secrets() {
        let secrets = ClientSecrets::from_json(WEB_SECRETS).unwrap();
        assert_eq!(secrets.client_secret, "shh");

        let installed = r#"{"installed": {"client_id": "a", "client_secret": "b"}}"#;
        let secrets = ClientSecrets::from_json(installed).unwrap();
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);

        assert!(matches!(
            ClientSecrets::from_json("{}"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_authorize_url() {
        let client = OAuthClient::new(
            ClientSecrets::from_json(WEB_SECRETS).unwrap(),
            "http://localhost:5000/oauth2callback",
            reqwest::Client::new(),
        );
        let url = Url::parse(&client.authorize_url("xyz", WEB_SCOPES).unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(params["state"], "xyz");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["include_granted_scopes"], "true");
        assert_eq!(params["redirect_uri"], "http://localhost:5000/oauth2callback");
        assert!(params["scope"].contains("openid"));
        assert!(params["scope"].ends_with("drive.file"));
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        let tokens = Tokens {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: now + Duration::seconds(30),
        };
        assert!(tokens.is_expired(now));

        let tokens = Tokens {
            expires_at: now + Duration::seconds(600),
            ..tokens
        };
        assert!(!tokens.is_expired(now));
    }

    #[test]
    fn test_refresh_keeps_refresh_token() {
        let response = TokenResponse {
            access_token: "new".into(),
            refresh_token: None,
            expires_in: 3599,
        };
        let tokens = response.into_tokens(Some("keep".into()));
        assert_eq!(tokens.refresh_token.as_deref(), Some("keep"));
    }
}
