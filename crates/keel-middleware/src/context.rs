//! Context enrichment stages.
//!
//! Each stage takes a [`RequestState`] by value and returns an extended one.
//! The HTTP middleware and the RPC interceptor are thin drivers around these
//! functions, so both surfaces enrich requests identically.
//!
//! Order matters: the request id must exist before the logger is scoped, and
//! the logger must be scoped before anything worth correlating is logged.

use crate::runtime::Runtime;
use http::HeaderMap;
use keel_core::{
    Attr, Deadline, DeadlineGuard, ErrorCode, LoggerHandle, RequestId, RequestState, ScopeSet,
    SessionHandle, SessionManager, TokenEngine, UserId,
};
use keel_telemetry::fields;
use std::sync::Arc;
use std::time::Duration;

/// Header and metadata key carrying the credential.
pub const AUTHORIZATION_KEY: &str = "authorization";

/// Attaches a fresh request id. A state that already has one is returned
/// unchanged, so the id is assigned exactly once per request.
pub fn with_request_id(state: RequestState) -> RequestState {
    if state.request_id().is_some() {
        return state;
    }
    state.with_request_id(RequestId::new())
}

/// Scopes the state's logger with the request id as a permanent attribute.
pub fn with_logger(state: RequestState) -> RequestState {
    let Some(request_id) = state.request_id() else {
        return state;
    };
    let logger = state.logger().with(fields::REQUEST_ID, request_id);
    state.with_logger(logger)
}

/// Attaches the session referenced by `headers`.
pub fn with_session(
    state: RequestState,
    manager: &Arc<dyn SessionManager>,
    headers: &HeaderMap,
) -> RequestState {
    let session = manager.load(headers);
    state.with_session(SessionHandle::new(Arc::clone(manager), session))
}

/// Request id, session and a request-scoped logger rooted in the runtime's
/// logger.
pub fn with_basic_context(state: RequestState, runtime: &Runtime, headers: &HeaderMap) -> RequestState {
    let state = with_request_id(state.with_logger(runtime.logger().clone()));
    let state = with_session(state, runtime.session_manager(), headers);
    with_logger(state)
}

/// Binds the state to a new deadline `budget` from now, expiring with `cause`.
///
/// The deadline does not inherit upstream cancellation. The returned guard
/// must be held until the handler returns; dropping or releasing it stops
/// the timer.
pub fn with_timeout(
    state: RequestState,
    budget: Duration,
    cause: ErrorCode,
) -> (RequestState, DeadlineGuard) {
    let (deadline, guard) = Deadline::start(budget, cause);
    (state.with_deadline(deadline), guard)
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The authenticated user.
    pub user_id: UserId,
    /// Scopes granted to the credential.
    pub scopes: ScopeSet,
}

/// Resolves a `"<scheme> <value>"` credential to an identity.
///
/// Never fails: every rejection is logged at debug and yields `None`.
pub fn authenticate(
    credential: Option<&str>,
    engine: &dyn TokenEngine,
    logger: &LoggerHandle,
) -> Option<Identity> {
    let Some(credential) = credential.filter(|c| !c.is_empty()) else {
        logger.debug("not-found-authorization", &[]);
        return None;
    };

    let Some((scheme, token)) = credential.split_once(' ') else {
        logger.debug("malformed-authorization", &[]);
        return None;
    };

    if scheme != engine.declared_scheme() {
        logger.debug(
            "unsupported-token-scheme",
            &[Attr::new("scheme", scheme)],
        );
        return None;
    }

    let claims = match engine.validate(token) {
        Ok(Some(claims)) => claims,
        Ok(None) => {
            logger.debug("expired token", &[]);
            return None;
        }
        Err(err) => {
            logger.debug("failed-to-parse-token", &[Attr::new(fields::ERROR, err)]);
            return None;
        }
    };

    let user_id = match claims.standard.subject_id() {
        Ok(user_id) => user_id,
        Err(err) => {
            logger.debug("invalid-token-subject", &[Attr::new(fields::ERROR, err)]);
            return None;
        }
    };

    logger.debug(
        "auth-info",
        &[
            Attr::new(fields::USER_ID, user_id),
            Attr::new(fields::SCOPE, &claims.scope),
        ],
    );
    Some(Identity {
        user_id,
        scopes: claims.scopes(),
    })
}

/// Attaches the caller identity if `credential` verifies; otherwise returns
/// the state unchanged.
pub fn with_authentication(
    state: RequestState,
    credential: Option<&str>,
    engine: &dyn TokenEngine,
) -> RequestState {
    match authenticate(credential, engine, state.logger()) {
        Some(identity) => state.with_identity(identity.user_id, identity.scopes),
        None => state,
    }
}
