//! Round-trip timing.

use crate::middleware::{Middleware, Next};
use crate::types::{BoxFuture, Request, Response};
use keel_core::{Attr, RequestState};
use keel_telemetry::fields;
use std::net::SocketAddr;
use tokio::time::Instant;

/// Logs a debug `request` record before the rest of the chain and a debug
/// `response` record with the round-trip time after it.
///
/// The remote address is read from a [`SocketAddr`] request extension, which
/// servers insert when accepting the connection.
#[derive(Debug, Clone, Copy)]
pub struct TimerMiddleware {
    node_id: u16,
}

impl TimerMiddleware {
    /// Creates the stage for node `node_id`.
    pub const fn new(node_id: u16) -> Self {
        Self { node_id }
    }
}

impl Middleware for TimerMiddleware {
    fn name(&self) -> &'static str {
        "timer"
    }

    fn process<'a>(
        &'a self,
        state: RequestState,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let remote = request
                .extensions()
                .get::<SocketAddr>()
                .map(ToString::to_string)
                .unwrap_or_default();
            let logger = state.logger().clone();
            logger.debug(
                "request",
                &[
                    Attr::new(fields::URI, request.uri()),
                    Attr::new(fields::METHOD, request.method()),
                    Attr::new(fields::REMOTE_ADDR, remote),
                    Attr::new(fields::NODE_ID, self.node_id),
                ],
            );

            let start = Instant::now();
            let response = next.run(state, request).await;

            logger.debug("response", &[Attr::new(fields::RTT, format!("{:?}", start.elapsed()))]);
            response
        })
    }
}
