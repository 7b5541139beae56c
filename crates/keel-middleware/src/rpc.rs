//! Unary RPC interceptor.
//!
//! `tonic` interceptors only see the request, so the RPC surface wraps each
//! handler call instead: a generated service method forwards to
//! [`UnaryInterceptor::intercept`] with its full method name and a closure
//! that does the real work.
//!
//! ```
//! use keel_core::fixtures::StaticTokenEngine;
//! use keel_core::{ErrorCode, RequestState};
//! use keel_middleware::{Runtime, UnaryInterceptor};
//! use keel_response::{ResponseFinalizer, Rpc};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let runtime = Arc::new(Runtime::new(Arc::new(StaticTokenEngine::new("Bearer"))));
//! let interceptor = UnaryInterceptor::new(runtime)
//!     .with_basic_context()
//!     .with_timeout()
//!     .with_authenticate()
//!     .with_log_round_trip_time();
//!
//! let status = interceptor
//!     .intercept(tonic::Request::new(7_u64), "/user.v1.UserService/Get", |state: RequestState, id: u64| async move {
//!         let result: anyhow::Result<u64> = Err(ErrorCode::NOT_FOUND.enrich(format!("user {id} not found")).into());
//!         ResponseFinalizer::<Rpc, _>::new(&state, result)
//!             .map(tonic::Code::NotFound, &[ErrorCode::NOT_FOUND])
//!             .into_response()
//!     })
//!     .await
//!     .unwrap_err();
//!
//! assert_eq!(status.code(), tonic::Code::NotFound);
//! # }
//! ```

use crate::context::{with_authentication, with_basic_context, with_timeout, AUTHORIZATION_KEY};
use crate::runtime::Runtime;
use keel_core::{Attr, ErrorCode, RequestState};
use keel_telemetry::fields;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tonic::metadata::MetadataMap;
use tonic::{Response, Status};

/// Per-call enrichment for unary RPC handlers.
///
/// Every step is opt-in; an interceptor with no flags only logs
/// `rpc_request`.
#[derive(Debug, Clone)]
pub struct UnaryInterceptor {
    runtime: Arc<Runtime>,
    basic_context: bool,
    timeout: bool,
    authenticate: bool,
    log_rtt: bool,
}

impl UnaryInterceptor {
    /// Creates an interceptor with every step disabled.
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            runtime,
            basic_context: false,
            timeout: false,
            authenticate: false,
            log_rtt: false,
        }
    }

    /// Attaches request id, session and a request-scoped logger.
    pub fn with_basic_context(mut self) -> Self {
        self.basic_context = true;
        self
    }

    /// Binds each call to the runtime's request deadline.
    pub fn with_timeout(mut self) -> Self {
        self.timeout = true;
        self
    }

    /// Authenticates the caller from the `authorization` metadata.
    pub fn with_authenticate(mut self) -> Self {
        self.authenticate = true;
        self
    }

    /// Logs `rpc_response` with the handler's round-trip time.
    pub fn with_log_round_trip_time(mut self) -> Self {
        self.log_rtt = true;
        self
    }

    /// Enriches the call, then runs `handler` with the state and the message.
    pub async fn intercept<Req, Resp, H, Fut>(
        &self,
        request: tonic::Request<Req>,
        method: &str,
        handler: H,
    ) -> Result<Response<Resp>, Status>
    where
        H: FnOnce(RequestState, Req) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, Status>>,
    {
        let (metadata, _extensions, message) = request.into_parts();
        let mut state = RequestState::with_root_logger(self.runtime.logger().clone());

        if self.basic_context {
            state = with_basic_context(state, &self.runtime, &metadata.clone().into_headers());
        }

        state.logger().debug(
            "rpc_request",
            &[
                Attr::new(fields::FUNCTION, method),
                Attr::new(fields::NODE_ID, self.runtime.node_id()),
            ],
        );

        let mut guard = None;
        if self.timeout {
            let (timed, deadline_guard) =
                with_timeout(state, self.runtime.request_timeout(), ErrorCode::SERVER_TIMEOUT);
            state = timed;
            guard = Some(deadline_guard);
        }

        if self.authenticate {
            state = self.authenticate_metadata(state, &metadata);
        }

        let logger = state.logger().clone();
        let start = Instant::now();
        let result = handler(state, message).await;

        if self.log_rtt {
            logger.debug("rpc_response", &[Attr::new(fields::RTT, format!("{:?}", start.elapsed()))]);
        }
        if let Some(guard) = guard {
            guard.release();
        }
        result
    }

    fn authenticate_metadata(&self, state: RequestState, metadata: &MetadataMap) -> RequestState {
        if metadata.is_empty() {
            state.logger().debug("not-found-metadata", &[]);
            return state;
        }

        let mut values = metadata.get_all(AUTHORIZATION_KEY).iter();
        let credential = match (values.next(), values.next()) {
            (Some(value), None) => value.to_str().ok(),
            _ => None,
        };
        let Some(credential) = credential else {
            state
                .logger()
                .debug("invalid-or-not-found-authorization-metadata", &[]);
            return state;
        };

        with_authentication(state, Some(credential), self.runtime.token_engine())
    }
}
