//! Mandatory authentication.

use crate::types::{BoxFuture, Request, Response};
use http::StatusCode;
use keel_core::{ErrorCode, RequestState};

/// Description sent to unauthenticated callers of a guarded handler.
pub const UNAUTHENTICATED_DESCRIPTION: &str = "require authentication to access api";

/// Wraps `handler` so it only runs for authenticated callers.
///
/// Callers without a user id get 401 with the `unauthenticated` error body
/// and the handler is never invoked. The check looks only at the state, not
/// at whether the authentication stage ran.
pub fn require_authentication<H>(
    handler: H,
) -> impl FnOnce(RequestState, Request) -> BoxFuture<'static, Response> + Send
where
    H: FnOnce(RequestState, Request) -> BoxFuture<'static, Response> + Send,
{
    move |state: RequestState, request: Request| -> BoxFuture<'static, Response> {
        if state.is_authenticated() {
            return handler(state, request);
        }
        Box::pin(async move {
            keel_response::write_error(
                &state,
                StatusCode::UNAUTHORIZED,
                ErrorCode::UNAUTHENTICATED,
                UNAUTHENTICATED_DESCRIPTION,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use keel_core::{ScopeSet, UserId};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn handler(called: Arc<AtomicBool>) -> impl FnOnce(RequestState, Request) -> BoxFuture<'static, Response> + Send {
        move |_: RequestState, _: Request| -> BoxFuture<'static, Response> {
            called.store(true, Ordering::SeqCst);
            Box::pin(async { Response::new(Full::new(Bytes::from_static(b"secret"))) })
        }
    }

    #[tokio::test]
    async fn test_anonymous_gets_401() {
        let called = Arc::new(AtomicBool::new(false));
        let guarded = require_authentication(handler(Arc::clone(&called)));

        let response = guarded(RequestState::new(), http::Request::new(Full::new(Bytes::new()))).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!called.load(Ordering::SeqCst));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "unauthenticated");
        assert_eq!(body["error_description"], UNAUTHENTICATED_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_authenticated_reaches_handler() {
        let called = Arc::new(AtomicBool::new(false));
        let guarded = require_authentication(handler(Arc::clone(&called)));
        let state = RequestState::new().with_identity(UserId::new(5).unwrap(), ScopeSet::new());

        let response = guarded(state, http::Request::new(Full::new(Bytes::new()))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(called.load(Ordering::SeqCst));
    }
}
