//! Request deadline.

use crate::context::with_timeout;
use crate::middleware::{Middleware, Next};
use crate::types::{BoxFuture, Request, Response};
use keel_core::{ErrorCode, RequestState};
use std::time::Duration;

/// Binds the request to a deadline expiring with `server_timeout`.
///
/// The deadline guard lives for the rest of the chain and is released exactly
/// once, when the handler returns or when the request future is dropped.
/// Handlers observe the deadline through
/// [`RequestState::deadline`](keel_core::RequestState::deadline); the
/// response writers turn a failure after expiry into a timeout response.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutMiddleware {
    budget: Duration,
}

impl TimeoutMiddleware {
    /// Creates the stage with the given time budget.
    pub const fn new(budget: Duration) -> Self {
        Self { budget }
    }
}

impl Middleware for TimeoutMiddleware {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn process<'a>(
        &'a self,
        state: RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let (state, guard) = with_timeout(state, self.budget, ErrorCode::SERVER_TIMEOUT);
            let response = next.run(state, request).await;
            guard.release();
            response
        })
    }
}
