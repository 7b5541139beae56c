//! HTTP types used throughout the middleware chain.

use bytes::Bytes;
use http_body_util::Full;
use keel_core::RequestState;
use std::future::Future;
use std::pin::Pin;

/// The HTTP request type used in the middleware chain.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type; the same type the REST writers produce.
pub type Response = keel_response::HttpResponse;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Terminal handler of the chain: receives the enriched state and the request.
pub type Handler<'a> = Box<dyn FnOnce(RequestState, Request) -> BoxFuture<'static, Response> + Send + 'a>;
