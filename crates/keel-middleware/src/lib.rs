//! # Keel Middleware
//!
//! Enriches every inbound request with a request-scoped [`RequestState`]
//! before the domain handler runs.
//!
//! ```text
//! HTTP:  Request → Context → Timer → Timeout → Authentication → Handler
//! RPC:   Request → UnaryInterceptor (same stages, opt-in) → Handler
//! ```
//!
//! The stages themselves are plain functions in [`context`]; the HTTP chain
//! ([`HttpPipeline`]) and the RPC wrapper ([`UnaryInterceptor`]) only drive
//! them. Authentication is fail-open: an unverifiable credential leaves the
//! caller anonymous, and [`require_authentication`] enforces it where needed.
//!
//! [`RequestState`]: keel_core::RequestState

#![doc(html_root_url = "https://docs.rs/keel-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
mod guard;
pub mod middleware;
pub mod pipeline;
mod rpc;
mod runtime;
pub mod stages;
pub mod types;

pub use context::{Identity, AUTHORIZATION_KEY};
pub use guard::{require_authentication, UNAUTHENTICATED_DESCRIPTION};
pub use middleware::{Middleware, Next};
pub use pipeline::{HttpPipeline, HttpPipelineBuilder, Stage};
pub use rpc::UnaryInterceptor;
pub use runtime::{Runtime, DEFAULT_REQUEST_TIMEOUT};
pub use types::{BoxFuture, Handler, Request, Response};
