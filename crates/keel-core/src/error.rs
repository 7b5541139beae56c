//! Error contract for the Keel runtime layer.
//!
//! Domain handlers return plain `anyhow::Result` values. Whether an error is
//! safe to show to a client is decided at the response boundary, using two
//! building blocks defined here:
//!
//! - [`ErrorCode`] - a sentinel from the bounded vocabulary of codes clients
//!   may see (`not_found`, `server_timeout`, ...).
//! - [`RichError`] - the capability an error exposes when it knows its own
//!   safe code and description, plus internal-only detail and attributes for
//!   logging. [`EnrichedError`] is the concrete carrier.
//!
//! An error without the capability is never disclosed verbatim.
//!
//! # Example
//!
//! ```
//! use keel_core::{ErrorCode, RichError};
//!
//! let err = ErrorCode::NOT_FOUND
//!     .enrich("user not found")
//!     .with_attr("user_id", 42);
//!
//! assert_eq!(err.safe_code(), ErrorCode::NOT_FOUND);
//! assert_eq!(err.reduce().to_string(), "not_found: user not found");
//! ```

use crate::logging::Attr;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// A safe, client-visible error code.
///
/// Codes double as sentinel errors: `anyhow::Error::from(ErrorCode::FORBIDDEN)`
/// can be matched by status rules, but a bare code is not a [`RichError`] and
/// is therefore still treated as unexpected when it reaches a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorCode(&'static str);

impl ErrorCode {
    /// Generic server-side failure.
    pub const SERVER_ERROR: Self = Self("server_error");
    /// The request exceeded its server-side time budget.
    pub const SERVER_TIMEOUT: Self = Self("server_timeout");
    /// The request was malformed.
    pub const INVALID_REQUEST: Self = Self("invalid_request");
    /// The resource already exists.
    pub const DUPLICATED: Self = Self("duplicated");
    /// The resource does not exist.
    pub const NOT_FOUND: Self = Self("not_found");
    /// Username/password or similar credentials were wrong.
    pub const INVALID_CREDENTIALS: Self = Self("invalid_credentials");
    /// The caller must authenticate first.
    pub const UNAUTHENTICATED: Self = Self("unauthenticated");
    /// The caller is authenticated but not allowed.
    pub const FORBIDDEN: Self = Self("forbidden");
    /// The OAuth2 client is unknown or misconfigured.
    pub const INVALID_CLIENT: Self = Self("invalid_client");
    /// A requested scope is unknown or not grantable.
    pub const INVALID_SCOPE: Self = Self("invalid_scope");
    /// The resource owner denied the authorization request.
    pub const ACCESS_DENIED: Self = Self("access_denied");
    /// The presented grant is invalid, expired or revoked.
    pub const INVALID_GRANT: Self = Self("invalid_grant");

    /// Declares an additional code.
    #[must_use]
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    /// Returns the wire form of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }

    /// Returns the fixed safe description of codes that have one.
    #[must_use]
    pub fn default_description(self) -> Option<&'static str> {
        match self.0 {
            "server_error" => Some("an unexpected error occurred"),
            "server_timeout" => Some("server timeout"),
            _ => None,
        }
    }

    /// Attaches a safe description, producing a classified error.
    pub fn enrich(self, description: impl Into<Cow<'static, str>>) -> EnrichedError {
        EnrichedError {
            code: self,
            description: description.into(),
            detail: None,
            event: Cow::Borrowed(self.0),
            attributes: Vec::new(),
        }
    }

    /// Classifies `source` under this code without disclosing it.
    ///
    /// The source becomes internal detail (logged, never shown) and the safe
    /// description falls back to [`default_description`](Self::default_description)
    /// or the code itself.
    pub fn hide(
        self,
        source: impl Into<anyhow::Error>,
        event: impl Into<Cow<'static, str>>,
    ) -> EnrichedError {
        EnrichedError {
            code: self,
            description: Cow::Borrowed(self.default_description().unwrap_or(self.0)),
            detail: Some(source.into()),
            event: event.into(),
            attributes: Vec::new(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for ErrorCode {}

/// Capability of an error that knows what is safe to disclose about itself.
pub trait RichError: std::error::Error + Send + Sync {
    /// Internal detail, for logs only.
    fn detail(&self) -> Option<&anyhow::Error>;

    /// Structured attributes, for logs only.
    fn attributes(&self) -> &[Attr];

    /// Event name used when the error is logged.
    fn event(&self) -> &str;

    /// The code clients may see.
    fn safe_code(&self) -> ErrorCode;

    /// The description clients may see.
    fn safe_description(&self) -> &str;

    /// Reduces the error to its disclosed form.
    fn reduce(&self) -> ReducedError {
        ReducedError::new(self.safe_code(), self.safe_description())
    }
}

/// The concrete [`RichError`] carrier.
///
/// `Display` renders only the safe parts; the internal detail is reachable
/// through [`RichError::detail`] and is deliberately not exposed as
/// [`std::error::Error::source`], so status rules never match on it.
#[derive(Debug)]
pub struct EnrichedError {
    code: ErrorCode,
    description: Cow<'static, str>,
    detail: Option<anyhow::Error>,
    event: Cow<'static, str>,
    attributes: Vec<Attr>,
}

impl EnrichedError {
    /// Adds a structured attribute for logging.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<Cow<'static, str>>, value: impl fmt::Display) -> Self {
        self.attributes.push(Attr::new(key, value));
        self
    }

    /// Replaces the event name used when logging.
    #[must_use]
    pub fn with_event(mut self, event: impl Into<Cow<'static, str>>) -> Self {
        self.event = event.into();
        self
    }

    /// Attaches internal detail, for logs only.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<anyhow::Error>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Returns true if this error is classified under `code`.
    #[must_use]
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

impl fmt::Display for EnrichedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

impl std::error::Error for EnrichedError {}

impl RichError for EnrichedError {
    fn detail(&self) -> Option<&anyhow::Error> {
        self.detail.as_ref()
    }

    fn attributes(&self) -> &[Attr] {
        &self.attributes
    }

    fn event(&self) -> &str {
        &self.event
    }

    fn safe_code(&self) -> ErrorCode {
        self.code
    }

    fn safe_description(&self) -> &str {
        &self.description
    }
}

/// The disclosed form of an error: a code and a description, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {description}")]
pub struct ReducedError {
    code: ErrorCode,
    description: String,
}

impl ReducedError {
    /// Creates a reduced error.
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// Returns the disclosed code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the disclosed description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Finds the outermost [`RichError`] in the error chain.
#[must_use]
pub fn find_rich(err: &anyhow::Error) -> Option<&EnrichedError> {
    err.chain().find_map(|e| e.downcast_ref::<EnrichedError>())
}

/// Returns true if any layer of the chain is, or is classified as, `code`.
#[must_use]
pub fn is_code(err: &anyhow::Error, code: ErrorCode) -> bool {
    err.chain().any(|e| {
        e.downcast_ref::<ErrorCode>().is_some_and(|c| *c == code)
            || e.downcast_ref::<EnrichedError>().is_some_and(|r| r.is(code))
    })
}

/// Marker for expected, client-safe domain errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct KnownDomainError {
    message: String,
}

impl KnownDomainError {
    /// Returns the client-safe message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Creates an expected domain error whose message is safe to disclose.
pub fn good_domain_error(message: impl Into<String>) -> anyhow::Error {
    KnownDomainError {
        message: message.into(),
    }
    .into()
}

/// Creates an unexpected domain error; its message is never disclosed.
pub fn unexpected_domain_error(
    message: impl fmt::Display + fmt::Debug + Send + Sync + 'static,
) -> anyhow::Error {
    anyhow::Error::msg(message)
}

/// Adds context to an unexpected domain error.
pub fn unexpected_domain_wrap(
    err: anyhow::Error,
    message: impl fmt::Display + Send + Sync + 'static,
) -> anyhow::Error {
    err.context(message)
}

/// Converts domain errors into classified errors at the service boundary.
///
/// Known domain errors become `known_code` with their own message as the safe
/// description. Anything else becomes `server_code`, hiding the original.
///
/// # Example
///
/// ```
/// use keel_core::{good_domain_error, DomainWrapper, ErrorCode, RichError};
///
/// let wrapper = DomainWrapper::new(ErrorCode::SERVER_ERROR, ErrorCode::INVALID_REQUEST);
///
/// let known = wrapper.wrap(good_domain_error("username is taken"));
/// assert_eq!(known.safe_code(), ErrorCode::INVALID_REQUEST);
/// assert_eq!(known.safe_description(), "username is taken");
///
/// let unknown = wrapper.wrap(anyhow::anyhow!("db pool exhausted"));
/// assert_eq!(unknown.safe_code(), ErrorCode::SERVER_ERROR);
/// assert!(unknown.detail().is_some());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainWrapper {
    server_code: ErrorCode,
    known_code: ErrorCode,
}

impl DomainWrapper {
    /// Creates a wrapper.
    #[must_use]
    pub const fn new(server_code: ErrorCode, known_code: ErrorCode) -> Self {
        Self {
            server_code,
            known_code,
        }
    }

    /// Classifies `err`.
    pub fn wrap(&self, err: anyhow::Error) -> EnrichedError {
        if let Some(known) = err.chain().find_map(|e| e.downcast_ref::<KnownDomainError>()) {
            let description = known.message().to_string();
            return self.known_code.enrich(description).with_detail(err);
        }
        self.server_code.hide(err, "domain-error")
    }
}
