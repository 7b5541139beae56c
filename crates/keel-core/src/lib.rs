//! # Keel Core
//!
//! Core types and traits for the Keel runtime layer.
//!
//! This crate provides the foundational types shared by the HTTP and RPC
//! surfaces:
//!
//! - [`RequestState`] - Per-request state threaded through the pipeline
//! - [`RequestId`] - UUID v7 request identifier
//! - [`Deadline`] - Request time budget with a typed expiry cause
//! - [`ErrorCode`], [`RichError`], [`EnrichedError`] - Safe error contract
//! - [`Logger`], [`TokenEngine`], [`SessionManager`] - Collaborator traits

#![doc(html_root_url = "https://docs.rs/keel-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod deadline;
mod error;
pub mod fixtures;
mod identity;
mod logging;
mod session;
mod state;
mod token;

pub use deadline::{Deadline, DeadlineGuard};
pub use error::{
    find_rich, good_domain_error, is_code, unexpected_domain_error, unexpected_domain_wrap,
    DomainWrapper, EnrichedError, ErrorCode, KnownDomainError, ReducedError, RichError,
};
pub use identity::{ParseUserIdError, ParseUserRoleError, ScopeSet, UserId, UserRole};
pub use logging::{Attr, Logger, LoggerHandle, Severity, TracingLogger, STRUCTURED_KEYS};
pub use session::{CookieSessionManager, Session, SessionError, SessionHandle, SessionManager};
pub use state::{RequestId, RequestState};
pub use token::{
    AccessTokenClaims, ClaimsError, IdTokenClaims, RefreshTokenClaims, StandardClaims, TokenEngine,
    TokenError,
};
