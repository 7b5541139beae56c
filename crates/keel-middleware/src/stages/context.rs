//! Basic request context.

use crate::context::with_basic_context;
use crate::middleware::{Middleware, Next};
use crate::runtime::Runtime;
use crate::types::{BoxFuture, Request, Response};
use keel_core::RequestState;
use std::sync::Arc;

/// Attaches the request id, the session and a request-scoped logger.
#[derive(Debug, Clone)]
pub struct ContextMiddleware {
    runtime: Arc<Runtime>,
}

impl ContextMiddleware {
    /// Creates the stage.
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }
}

impl Middleware for ContextMiddleware {
    fn name(&self) -> &'static str {
        "context"
    }

    fn process<'a>(
        &'a self,
        state: RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let state = with_basic_context(state, &self.runtime, request.headers());
            next.run(state, request).await
        })
    }
}
