//! In-memory server-side sessions.
//!
//! The browser only holds the session id (in a signed cookie). Sessions
//! expire after a fixed lifetime that is pushed forward on every access.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::Rng;
use rand::distributions::Alphanumeric;

use super::oauth::{Tokens, UserInfo};

/// Random alphanumeric token for session ids and OAuth `state`.
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Anti-forgery value of a login in progress.
    pub oauth_state: Option<String>,
    pub tokens: Option<Tokens>,
    pub user: Option<UserInfo>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }
}

struct Entry {
    session: Session,
    expires_at: Instant,
}

pub struct SessionStore {
    sessions: DashMap<String, Entry>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            lifetime,
        }
    }

    /// Start an empty session and return its id.
    pub fn create(&self) -> String {
        let id = random_token(32);
        self.sessions.insert(
            id.clone(),
            Entry {
                session: Session::default(),
                expires_at: Instant::now() + self.lifetime,
            },
        );
        id
    }

    /// Current session data, extending its lifetime.
    ///
    /// Returns `None` for unknown or expired ids.
    pub fn get(&self, id: &str) -> Option<Session> {
        let now = Instant::now();
        let mut entry = self.sessions.get_mut(id)?;
        if entry.expires_at <= now {
            drop(entry);
            self.sessions.remove(id);
            return None;
        }
        entry.expires_at = now + self.lifetime;
        Some(entry.session.clone())
    }

    /// Modify a live session. Returns false when it no longer exists.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut Session)) -> bool {
        let now = Instant::now();
        match self.sessions.get_mut(id) {
            Some(mut entry) if entry.expires_at > now => {
                f(&mut entry.session);
                entry.expires_at = now + self.lifetime;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }

    /// Drop every expired session.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.expires_at > now);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
