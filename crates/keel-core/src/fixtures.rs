//! Test doubles for the collaborator traits.
//!
//! These are used by the unit and integration tests of every Keel crate and
//! are handy for services that want to test their handlers without a real
//! token engine or log pipeline.
//!
//! # Example
//!
//! ```
//! use keel_core::fixtures::RecordingLogger;
//! use keel_core::Severity;
//!
//! let recorder = RecordingLogger::new();
//! let logger = recorder.handle().with("request_id", "r-1");
//! logger.warn("slow-query", &[]);
//!
//! let record = recorder.find("slow-query").unwrap();
//! assert_eq!(record.severity, Severity::Warn);
//! assert_eq!(record.attr("request_id"), Some("r-1"));
//! ```

use crate::identity::ScopeSet;
use crate::logging::{Attr, Logger, LoggerHandle, Severity};
use crate::session::{Session, SessionError, SessionManager};
use crate::token::{AccessTokenClaims, StandardClaims, TokenEngine, TokenError};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One captured log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity the record was emitted at.
    pub severity: Severity,
    /// Event name.
    pub event: String,
    /// Attributes, permanent ones first.
    pub attrs: Vec<Attr>,
}

impl LogRecord {
    /// Returns the value of the first attribute named `key`.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|a| a.key() == key).map(Attr::value)
    }
}

/// [`Logger`] that keeps every record in memory.
///
/// Derived loggers share the same record buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    records: Arc<Mutex<Vec<LogRecord>>>,
    attrs: Vec<Attr>,
}

impl RecordingLogger {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle logging into this recorder.
    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        LoggerHandle::new(self.clone())
    }

    /// Returns a snapshot of all records.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Returns the event names in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.event.clone()).collect()
    }

    /// Returns the first record with the given event name.
    #[must_use]
    pub fn find(&self, event: &str) -> Option<LogRecord> {
        self.records.lock().iter().find(|r| r.event == event).cloned()
    }

    /// Counts records emitted at `severity`.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    }

    /// Returns the highest severity recorded so far.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.records.lock().iter().map(|r| r.severity).max()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, severity: Severity, event: &str, attrs: &[Attr]) {
        let attrs = self.attrs.iter().chain(attrs).cloned().collect();
        self.records.lock().push(LogRecord {
            severity,
            event: event.to_string(),
            attrs,
        });
    }

    fn with_attr(&self, attr: Attr) -> Arc<dyn Logger> {
        let mut attrs = self.attrs.clone();
        attrs.push(attr);
        Arc::new(Self {
            records: Arc::clone(&self.records),
            attrs,
        })
    }
}

#[derive(Debug, Clone)]
enum Verdict {
    Accept(AccessTokenClaims),
    Expire,
    Reject(String),
}

/// [`TokenEngine`] answering from a fixed table of tokens.
///
/// Unknown tokens fail with [`TokenError::Malformed`].
#[derive(Debug)]
pub struct StaticTokenEngine {
    scheme: String,
    tokens: HashMap<String, Verdict>,
    calls: AtomicUsize,
}

impl StaticTokenEngine {
    /// Creates an engine declaring `scheme`.
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            tokens: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Accepts `token` as user `subject` with `scope`.
    #[must_use]
    pub fn accept(self, token: impl Into<String>, subject: impl Into<String>, scope: &str) -> Self {
        let claims = AccessTokenClaims {
            standard: StandardClaims {
                subject: subject.into(),
                ..StandardClaims::default()
            },
            scope: ScopeSet::parse(scope).to_string(),
        };
        self.with_verdict(token, Verdict::Accept(claims))
    }

    /// Treats `token` as well-formed but expired.
    #[must_use]
    pub fn expire(self, token: impl Into<String>) -> Self {
        self.with_verdict(token, Verdict::Expire)
    }

    /// Fails validation of `token` with an engine error.
    #[must_use]
    pub fn reject(self, token: impl Into<String>, reason: impl Into<String>) -> Self {
        self.with_verdict(token, Verdict::Reject(reason.into()))
    }

    fn with_verdict(mut self, token: impl Into<String>, verdict: Verdict) -> Self {
        self.tokens.insert(token.into(), verdict);
        self
    }

    /// Returns how many times `validate` was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl TokenEngine for StaticTokenEngine {
    fn declared_scheme(&self) -> &str {
        &self.scheme
    }

    fn validate(&self, credential: &str) -> Result<Option<AccessTokenClaims>, TokenError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.tokens.get(credential) {
            Some(Verdict::Accept(claims)) => Ok(Some(claims.clone())),
            Some(Verdict::Expire) => Ok(None),
            Some(Verdict::Reject(reason)) => Err(TokenError::Engine(reason.clone())),
            None => Err(TokenError::Malformed(credential.to_string())),
        }
    }
}

/// Header [`MemorySessionManager`] writes on save.
pub const SAVED_SESSION_HEADER: HeaderName = HeaderName::from_static("x-saved-session");

/// [`SessionManager`] that hands out one fixed session and records saves.
#[derive(Debug, Clone)]
pub struct MemorySessionManager {
    session: Session,
    saved: Arc<Mutex<Vec<Session>>>,
}

impl MemorySessionManager {
    /// Creates a manager handing out a session with `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            session: Session::existing(id),
            saved: Arc::default(),
        }
    }

    /// Returns every saved session, in order.
    #[must_use]
    pub fn saved(&self) -> Vec<Session> {
        self.saved.lock().clone()
    }

    /// Returns how many times a session was saved.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saved.lock().len()
    }
}

impl Default for MemorySessionManager {
    fn default() -> Self {
        Self::new("test-session")
    }
}

impl SessionManager for MemorySessionManager {
    fn load(&self, _headers: &HeaderMap) -> Session {
        self.session.clone()
    }

    fn save(&self, headers: &mut HeaderMap, session: &Session) -> Result<(), SessionError> {
        headers.insert(SAVED_SESSION_HEADER, HeaderValue::from_str(session.id())?);
        self.saved.lock().push(session.clone());
        Ok(())
    }
}
