//! Session collaborator.
//!
//! The runtime layer only attaches a session handle to the request and asks
//! the manager to save it before a response is written. Where session values
//! are persisted is the manager's business.

use http::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while saving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session cookie could not be encoded as a header value.
    #[error("invalid session cookie: {0}")]
    InvalidCookie(#[from] http::header::InvalidHeaderValue),
}

/// A request's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: String,
    is_new: bool,
    values: BTreeMap<String, String>,
}

impl Session {
    /// Creates a handle for an existing session id.
    pub fn existing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_new: false,
            values: BTreeMap::new(),
        }
    }

    /// Mints a new session with a random id.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            is_new: true,
            values: BTreeMap::new(),
        }
    }

    /// Returns the session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true if the session was minted for this request.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    /// Returns a session value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Sets a session value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns a copy of the session with `key` set.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }
}

/// Loads and saves sessions.
///
/// Shared by every request; implementations handle their own synchronization.
pub trait SessionManager: Send + Sync + fmt::Debug {
    /// Loads the session referenced by the request headers, or mints one.
    fn load(&self, headers: &HeaderMap) -> Session;

    /// Writes whatever the client needs to keep the session.
    fn save(&self, headers: &mut HeaderMap, session: &Session) -> Result<(), SessionError>;
}

/// A session bound to the manager that loaded it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    manager: Arc<dyn SessionManager>,
    session: Session,
}

impl SessionHandle {
    /// Binds `session` to `manager`.
    #[must_use]
    pub fn new(manager: Arc<dyn SessionManager>, session: Session) -> Self {
        Self { manager, session }
    }

    /// Returns the session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Returns a handle whose session has `key` set.
    #[must_use]
    pub fn with_value(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            manager: self.manager,
            session: self.session.with_value(key, value),
        }
    }

    /// Saves the session into the outgoing headers.
    pub fn save(&self, headers: &mut HeaderMap) -> Result<(), SessionError> {
        self.manager.save(headers, &self.session)
    }
}

/// Cookie-backed session manager.
#[derive(Debug, Clone)]
pub struct CookieSessionManager {
    cookie_name: String,
    path: String,
    expiration: Duration,
}

impl CookieSessionManager {
    /// Creates a manager issuing `cookie_name` cookies scoped to `path`.
    pub fn new(cookie_name: impl Into<String>, path: impl Into<String>, expiration: Duration) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            path: path.into(),
            expiration,
        }
    }

    fn find_cookie<'a>(&self, header: &'a str) -> Option<&'a str> {
        header.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == self.cookie_name && !value.is_empty()).then_some(value)
        })
    }
}

impl Default for CookieSessionManager {
    fn default() -> Self {
        Self::new("session_id", "/", Duration::from_secs(86_400))
    }
}

impl SessionManager for CookieSessionManager {
    fn load(&self, headers: &HeaderMap) -> Session {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|header| self.find_cookie(header))
            .map_or_else(Session::fresh, Session::existing)
    }

    fn save(&self, headers: &mut HeaderMap, session: &Session) -> Result<(), SessionError> {
        let cookie = format!(
            "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite=Lax",
            self.cookie_name,
            session.id(),
            self.path,
            self.expiration.as_secs()
        );
        headers.append(SET_COOKIE, HeaderValue::from_str(&cookie)?);
        Ok(())
    }
}
