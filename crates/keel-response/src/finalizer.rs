//! The response finalizer.
//!
//! A [`ResponseFinalizer`] turns what a handler returned into exactly one
//! status code and a disclosable outcome:
//!
//! 1. Construction substitutes the canonical timeout classification when the
//!    request's own deadline expired and the handler failed.
//! 2. [`map`](ResponseFinalizer::map) registers ordered status rules.
//! 3. [`finalize`](ResponseFinalizer::finalize) evaluates the rules once,
//!    first match wins, falls back to the protocol's catch-all code, then logs
//!    and redacts the error.
//!
//! # Example
//!
//! ```
//! use http::StatusCode;
//! use keel_core::{ErrorCode, RequestState};
//! use keel_response::{ResponseFinalizer, ResponseOutcome, Rest};
//!
//! let state = RequestState::new();
//! let result: anyhow::Result<()> = Err(ErrorCode::NOT_FOUND.enrich("no such user").into());
//!
//! let outcome = ResponseFinalizer::<Rest, _>::new(&state, result)
//!     .map(StatusCode::NOT_FOUND, &[ErrorCode::NOT_FOUND])
//!     .finalize();
//!
//! match outcome {
//!     ResponseOutcome::Failure { code, error } => {
//!         assert_eq!(code, StatusCode::NOT_FOUND);
//!         assert_eq!(error.description(), "no such user");
//!     }
//!     ResponseOutcome::Success { .. } => unreachable!(),
//! }
//! ```

use crate::protocol::Protocol;
use keel_core::{find_rich, is_code, Attr, ErrorCode, LoggerHandle, ReducedError, RequestState, RichError};
use keel_telemetry::fields;
use std::marker::PhantomData;

/// Event name of the critical record emitted for unclassified errors.
pub const INTERNAL_ERROR_EVENT: &str = "internal-error";

/// An ordered `(code, matching errors)` pair.
///
/// An empty error set matches any error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRule<C> {
    code: C,
    errors: Vec<ErrorCode>,
}

impl<C: Copy> StatusRule<C> {
    /// Creates a rule.
    pub fn new(code: C, errors: &[ErrorCode]) -> Self {
        Self {
            code,
            errors: errors.to_vec(),
        }
    }

    /// Returns the code this rule assigns.
    pub const fn code(&self) -> C {
        self.code
    }

    /// Returns true if this rule matches no specific error.
    pub fn is_catch_all(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true if `err` is, or wraps, one of the rule's errors.
    pub fn matches(&self, err: &anyhow::Error) -> bool {
        self.is_catch_all() || self.errors.iter().any(|code| is_code(err, *code))
    }
}

/// Result of finalizing a response.
#[derive(Debug)]
pub enum ResponseOutcome<T, C> {
    /// The handler succeeded.
    Success {
        /// The handler's payload.
        payload: T,
        /// The success code.
        code: C,
    },
    /// The handler failed.
    Failure {
        /// The assigned failure code.
        code: C,
        /// The disclosable error.
        error: ReducedError,
    },
}

impl<T, C: Copy> ResponseOutcome<T, C> {
    /// Returns the final status code.
    pub const fn code(&self) -> C {
        match self {
            Self::Success { code, .. } | Self::Failure { code, .. } => *code,
        }
    }

    /// Returns true for a failure outcome.
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// Two-phase response builder: register status rules, then finalize.
#[derive(Debug)]
pub struct ResponseFinalizer<P: Protocol, T> {
    state: RequestState,
    result: anyhow::Result<T>,
    success_code: P::Code,
    assigned: Option<P::Code>,
    rules: Vec<StatusRule<P::Code>>,
    protocol: PhantomData<P>,
}

impl<P: Protocol, T> ResponseFinalizer<P, T> {
    /// Starts finalizing what a handler returned.
    ///
    /// If the request's deadline already expired and `result` is an error,
    /// the error is replaced by the `server_timeout` classification (the
    /// original is kept only as logged detail) and the protocol's timeout
    /// code is assigned; later rules do not apply.
    pub fn new(state: &RequestState, result: anyhow::Result<T>) -> Self {
        let mut assigned = None;
        let result = match result {
            Err(err) if state.deadline_cause() == Some(ErrorCode::SERVER_TIMEOUT) => {
                assigned = Some(P::timeout());
                Err(ErrorCode::SERVER_TIMEOUT.hide(err, "timeout").into())
            }
            other => other,
        };

        Self {
            state: state.clone(),
            result,
            success_code: P::success(),
            assigned,
            rules: Vec::new(),
            protocol: PhantomData,
        }
        .map(P::timeout(), &[ErrorCode::SERVER_TIMEOUT])
    }

    /// Sets the code returned when no error occurred.
    #[must_use]
    pub fn with_default_code(mut self, code: P::Code) -> Self {
        self.success_code = code;
        self
    }

    /// Registers a status rule. An empty `errors` set is a catch-all and must
    /// be registered last.
    ///
    /// # Panics
    ///
    /// Panics if `code` is the protocol's unassigned sentinel.
    #[must_use]
    pub fn map(mut self, code: P::Code, errors: &[ErrorCode]) -> Self {
        assert!(
            !P::is_sentinel(code),
            "{code:?} is the unassigned sentinel and cannot be a target code"
        );
        self.rules.push(StatusRule::new(code, errors));
        self
    }

    /// Returns the request state this response belongs to.
    pub const fn state(&self) -> &RequestState {
        &self.state
    }

    /// Returns the registered rules in evaluation order.
    pub fn rules(&self) -> &[StatusRule<P::Code>] {
        &self.rules
    }

    /// Classifies, logs and redacts the outcome.
    pub fn finalize(self) -> ResponseOutcome<T, P::Code> {
        self.finalize_with_state().0
    }

    pub(crate) fn finalize_with_state(self) -> (ResponseOutcome<T, P::Code>, RequestState) {
        let outcome = match self.result {
            Ok(payload) => ResponseOutcome::Success {
                payload,
                code: self.success_code,
            },
            Err(err) => {
                let code = self
                    .assigned
                    .or_else(|| {
                        self.rules
                            .iter()
                            .find(|rule| rule.matches(&err))
                            .map(StatusRule::code)
                    })
                    .unwrap_or_else(P::internal);
                let error = redact::<P>(self.state.logger(), &err);
                ResponseOutcome::Failure { code, error }
            }
        };
        (outcome, self.state)
    }
}

/// Logs `err` at the severity its classification calls for and returns the
/// disclosable form.
pub fn redact<P: Protocol>(logger: &LoggerHandle, err: &anyhow::Error) -> ReducedError {
    if let Some(rich) = find_rich(err) {
        if let Some(detail) = rich.detail() {
            let mut attrs = vec![Attr::new(fields::ERROR, format!("{detail:#}"))];
            attrs.extend_from_slice(rich.attributes());
            if rich.safe_code() == ErrorCode::SERVER_ERROR {
                logger.warn(rich.event(), &attrs);
            } else {
                logger.debug(rich.event(), &attrs);
            }
        }
        return rich.reduce();
    }

    let mut attrs = vec![Attr::new(fields::ERROR, format!("{err:#}"))];
    if err.chain().count() > 1 {
        attrs.extend(
            err.chain()
                .enumerate()
                .map(|(index, layer)| Attr::new(fields::cause(index), layer)),
        );
    }
    logger.critical(INTERNAL_ERROR_EVENT, &attrs);
    P::unexpected_error()
}
