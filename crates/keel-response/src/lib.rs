//! # Keel Response
//!
//! Turns what a handler returned into a protocol-correct, safe-to-disclose
//! response.
//!
//! - [`ResponseFinalizer`] - ordered status rules, timeout substitution,
//!   severity-aware logging and redaction
//! - [`Rest`] writers - JSON envelope, unwrapped payloads, redirects
//! - [`Rpc`] encoder - `tonic::Status` with the assigned code
//!
//! ```
//! use http::StatusCode;
//! use keel_core::{ErrorCode, RequestState};
//! use keel_response::{ResponseFinalizer, Rest};
//!
//! let state = RequestState::new();
//! let result: anyhow::Result<&str> = Err(ErrorCode::FORBIDDEN.enrich("not your post").into());
//!
//! let response = ResponseFinalizer::<Rest, _>::new(&state, result)
//!     .map(StatusCode::FORBIDDEN, &[ErrorCode::FORBIDDEN])
//!     .write();
//!
//! assert_eq!(response.status(), StatusCode::FORBIDDEN);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod finalizer;
mod protocol;
mod redirect;
mod rest;
mod rpc;

pub use finalizer::{redact, ResponseFinalizer, ResponseOutcome, StatusRule, INTERNAL_ERROR_EVENT};
pub use protocol::{
    Protocol, Rest, Rpc, REST_UNEXPECTED_DESCRIPTION, RPC_UNEXPECTED_CODE, RPC_UNEXPECTED_DESCRIPTION,
};
pub use redirect::ERROR_QUERY_KEYS;
pub use rest::{
    timestamp, write_error, write_invalid_request_error, ErrorMetadata, HttpResponse, RestEnvelope,
    TIMESTAMP_FORMAT, WRITE_FAILED_EVENT,
};
