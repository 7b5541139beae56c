//! Request state types.
//!
//! The [`RequestState`] carries all per-request state through the enrichment
//! pipeline and into handlers. It is threaded by value: every pipeline stage
//! consumes a state and returns an extended one, and nothing is looked up
//! implicitly.

use crate::deadline::Deadline;
use crate::error::ErrorCode;
use crate::identity::{ScopeSet, UserId};
use crate::logging::LoggerHandle;
use crate::session::SessionHandle;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log correlation sortable.
///
/// # Example
///
/// ```
/// use keel_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-request state that flows through the pipeline.
///
/// Every field is independently optional or defaulted:
/// - request id, absent until the request id stage runs
/// - logger handle, the root logger until the logger stage scopes it
/// - session handle
/// - authenticated user id, absent for anonymous callers
/// - granted scopes
/// - active deadline
///
/// # Example
///
/// ```
/// use keel_core::{RequestId, RequestState, ScopeSet, UserId};
///
/// let state = RequestState::new()
///     .with_request_id(RequestId::new())
///     .with_identity(UserId::new(42).unwrap(), ScopeSet::parse("read"));
///
/// assert!(state.is_authenticated());
/// assert!(state.scopes().contains("read"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestState {
    request_id: Option<RequestId>,
    logger: LoggerHandle,
    session: Option<SessionHandle>,
    user_id: Option<UserId>,
    scopes: ScopeSet,
    deadline: Option<Deadline>,
    started_at: Instant,
}

impl RequestState {
    /// Creates an empty state logging to the `tracing` backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root_logger(LoggerHandle::default())
    }

    /// Creates an empty state logging to `logger`.
    #[must_use]
    pub fn with_root_logger(logger: LoggerHandle) -> Self {
        Self {
            request_id: None,
            logger,
            session: None,
            user_id: None,
            scopes: ScopeSet::new(),
            deadline: None,
            started_at: Instant::now(),
        }
    }

    /// Returns the request ID, if assigned.
    #[must_use]
    pub const fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    /// Returns a new state with the given request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Returns the logger handle.
    #[must_use]
    pub const fn logger(&self) -> &LoggerHandle {
        &self.logger
    }

    /// Returns a new state with the given logger.
    #[must_use]
    pub fn with_logger(mut self, logger: LoggerHandle) -> Self {
        self.logger = logger;
        self
    }

    /// Returns the session handle, if attached.
    #[must_use]
    pub const fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Returns a new state with the given session.
    #[must_use]
    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    /// Returns the authenticated user id.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Returns true if a user id is attached.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Returns the granted scopes.
    #[must_use]
    pub const fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// Returns a new state carrying the caller identity.
    #[must_use]
    pub fn with_identity(mut self, user_id: UserId, scopes: ScopeSet) -> Self {
        self.user_id = Some(user_id);
        self.scopes = scopes;
        self
    }

    /// Returns the active deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<&Deadline> {
        self.deadline.as_ref()
    }

    /// Returns a new state bound to `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the cause of the deadline if it already expired.
    #[must_use]
    pub fn deadline_cause(&self) -> Option<ErrorCode> {
        self.deadline.as_ref().and_then(Deadline::cause)
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for RequestState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_new_generates_unique_ids() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_request_id_serialization() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).expect("serialization should work");
        let parsed: RequestId = serde_json::from_str(&json).expect("deserialization should work");
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_request_state_new_is_anonymous() {
        let state = RequestState::new();
        assert!(state.request_id().is_none());
        assert!(state.session().is_none());
        assert!(!state.is_authenticated());
        assert!(state.scopes().is_empty());
        assert!(state.deadline_cause().is_none());
    }

    #[test]
    fn test_overlay_leaves_earlier_layer_untouched() {
        let base = RequestState::new().with_request_id(RequestId::new());
        let extended = base
            .clone()
            .with_identity(UserId::new(9).unwrap(), ScopeSet::parse("a b"));

        assert!(!base.is_authenticated());
        assert_eq!(extended.user_id().map(UserId::get), Some(9));
        assert_eq!(base.request_id(), extended.request_id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cause_after_expiry() {
        let (deadline, _guard) = Deadline::start(Duration::from_millis(5), ErrorCode::SERVER_TIMEOUT);
        let state = RequestState::new().with_deadline(deadline);

        tokio::time::advance(Duration::from_millis(10)).await;

        assert_eq!(state.deadline_cause(), Some(ErrorCode::SERVER_TIMEOUT));
        assert!(state.elapsed() >= Duration::from_millis(10));
    }
}
