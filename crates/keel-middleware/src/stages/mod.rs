//! HTTP middleware stages.
//!
//! The standard chain runs them in this order:
//!
//! 1. [`ContextMiddleware`] - request id, session, request-scoped logger
//! 2. [`TimerMiddleware`] - `request` / `response` debug records
//! 3. [`TimeoutMiddleware`] - request deadline
//! 4. [`AuthenticationMiddleware`] - caller identity from `Authorization`

pub mod authentication;
pub mod context;
pub mod timeout;
pub mod timer;

pub use authentication::AuthenticationMiddleware;
pub use context::ContextMiddleware;
pub use timeout::TimeoutMiddleware;
pub use timer::TimerMiddleware;
