//! The middleware trait and its continuation.
//!
//! A middleware receives the request state by value, extends it, and hands
//! the extended state to [`Next`]. Earlier layers never see later changes.
//!
//! # Example
//!
//! ```
//! use keel_middleware::{BoxFuture, Middleware, Next, Request, Response};
//! use keel_core::RequestState;
//!
//! struct Audit;
//!
//! impl Middleware for Audit {
//!     fn name(&self) -> &'static str {
//!         "audit"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         state: RequestState,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             state.logger().debug("audit", &[]);
//!             next.run(state, request).await
//!         })
//!     }
//! }
//! ```

use crate::types::{BoxFuture, Handler, Request, Response};
use keel_core::RequestState;

/// A stage of the HTTP middleware chain.
///
/// Implementations call `next.run()` exactly once unless they answer the
/// request themselves.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the stage name.
    fn name(&self) -> &'static str;

    /// Processes the request through this stage.
    fn process<'a>(
        &'a self,
        state: RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// Continuation invoking the rest of the chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(Handler<'a>),
}

impl<'a> Next<'a> {
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal continuation that invokes `handler`.
    pub fn handler<F>(handler: F) -> Self
    where
        F: FnOnce(RequestState, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(handler)),
        }
    }

    /// Invokes the next stage or the handler. Consumes `self`, so it can run
    /// only once.
    pub async fn run(self, state: RequestState, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(state, request, *next).await,
            NextInner::Handler(handler) => handler(state, request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;
    use keel_core::{RequestId, ScopeSet, UserId};
    use std::sync::{Arc, Mutex};

    struct Tag;

    impl Middleware for Tag {
        fn name(&self) -> &'static str {
            "tag"
        }

        fn process<'a>(
            &'a self,
            state: RequestState,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                let state = state.with_identity(UserId::new(1).unwrap(), ScopeSet::parse("tagged"));
                next.run(state, request).await
            })
        }
    }

    fn request() -> Request {
        http::Request::new(Full::new(Bytes::new()))
    }

    fn echo_status(state: RequestState, _: Request) -> BoxFuture<'static, Response> {
        Box::pin(async move {
            let mut response = Response::new(Full::new(Bytes::new()));
            if !state.scopes().contains("tagged") {
                *response.status_mut() = StatusCode::UNAUTHORIZED;
            }
            response
        })
    }

    #[tokio::test]
    async fn test_handler_receives_state() {
        let id = RequestId::new();
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);

        let next = Next::handler(move |state: RequestState, _| {
            *slot.lock().unwrap() = state.request_id();
            Box::pin(async { Response::new(Full::new(Bytes::new())) }) as BoxFuture<'static, Response>
        });
        let _ = next.run(RequestState::new().with_request_id(id), request()).await;

        assert_eq!(*seen.lock().unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_chain_passes_extended_state() {
        let tag = Tag;
        let next = Next::new(&tag, Next::handler(echo_status));

        let response = next.run(RequestState::new(), request()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(tag.name(), "tag");
    }
}
