//! Caller identity from the `Authorization` header.

use crate::context::{with_authentication, AUTHORIZATION_KEY};
use crate::middleware::{Middleware, Next};
use crate::runtime::Runtime;
use crate::types::{BoxFuture, Request, Response};
use keel_core::RequestState;
use std::sync::Arc;

/// Attaches the caller identity when the `Authorization` header verifies.
///
/// Never rejects a request; see
/// [`require_authentication`](crate::require_authentication) for mandatory
/// authentication.
#[derive(Debug, Clone)]
pub struct AuthenticationMiddleware {
    runtime: Arc<Runtime>,
}

impl AuthenticationMiddleware {
    /// Creates the stage using the runtime's token engine.
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }
}

impl Middleware for AuthenticationMiddleware {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn process<'a>(
        &'a self,
        state: RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let credential = request
                .headers()
                .get(AUTHORIZATION_KEY)
                .and_then(|value| value.to_str().ok());
            let state = with_authentication(state, credential, self.runtime.token_engine());
            next.run(state, request).await
        })
    }
}
