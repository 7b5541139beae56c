//! The HTTP middleware chain.
//!
//! ## Standard stages
//!
//! | Stage | Middleware | Purpose |
//! |-------|------------|---------|
//! | 1 | [`ContextMiddleware`] | request id, session, request-scoped logger |
//! | 2 | [`TimerMiddleware`] | `request` / `response` debug records |
//! | 3 | [`TimeoutMiddleware`] | request deadline |
//! | 4 | [`AuthenticationMiddleware`] | caller identity |
//!
//! [`HttpPipeline::standard`] builds exactly this chain. The builder exists
//! for services that add their own stages after the standard ones, and for
//! tests.

use crate::middleware::{Middleware, Next};
use crate::runtime::Runtime;
use crate::stages::{AuthenticationMiddleware, ContextMiddleware, TimeoutMiddleware, TimerMiddleware};
use crate::types::{BoxFuture, Request, Response};
use keel_core::{LoggerHandle, RequestState};
use std::sync::Arc;

/// A type-erased middleware stage.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Stages of the standard chain, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Request id, session and logger.
    Context = 1,
    /// Round-trip logging.
    Timer = 2,
    /// Request deadline.
    Timeout = 3,
    /// Caller identity.
    Authentication = 4,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Timer => "timer",
            Self::Timeout => "timeout",
            Self::Authentication => "authentication",
        }
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Context, Self::Timer, Self::Timeout, Self::Authentication]
    }

    /// Builds the middleware for this stage over `runtime`.
    pub fn middleware(self, runtime: &Arc<Runtime>) -> BoxedMiddleware {
        match self {
            Self::Context => Arc::new(ContextMiddleware::new(Arc::clone(runtime))),
            Self::Timer => Arc::new(TimerMiddleware::new(runtime.node_id())),
            Self::Timeout => Arc::new(TimeoutMiddleware::new(runtime.request_timeout())),
            Self::Authentication => Arc::new(AuthenticationMiddleware::new(Arc::clone(runtime))),
        }
    }
}

/// An immutable chain of middleware in front of a handler.
///
/// # Example
///
/// ```
/// use keel_core::fixtures::StaticTokenEngine;
/// use keel_middleware::{pipeline::{HttpPipeline, Stage}, Runtime};
/// use std::sync::Arc;
///
/// let runtime = Runtime::new(Arc::new(StaticTokenEngine::new("Bearer")));
/// let pipeline = HttpPipeline::standard(Arc::new(runtime));
///
/// let expected: Vec<_> = Stage::all().iter().map(|s| s.name()).collect();
/// assert_eq!(pipeline.stage_names(), expected);
/// ```
pub struct HttpPipeline {
    stages: Vec<BoxedMiddleware>,
    root_logger: LoggerHandle,
}

impl HttpPipeline {
    /// Creates a pipeline builder.
    #[must_use]
    pub fn builder() -> HttpPipelineBuilder {
        HttpPipelineBuilder::new()
    }

    /// Builds the standard chain over `runtime`.
    pub fn standard(runtime: Arc<Runtime>) -> Self {
        Self::with_stages(&runtime, &Stage::all())
    }

    /// Builds a chain of the given standard stages over `runtime`.
    ///
    /// Stages run in the order given; callers are expected to keep
    /// [`Stage::Context`] first.
    pub fn with_stages(runtime: &Arc<Runtime>, stages: &[Stage]) -> Self {
        stages
            .iter()
            .fold(
                Self::builder().root_logger(runtime.logger().clone()),
                |builder, stage| builder.boxed_stage(stage.middleware(runtime)),
            )
            .build()
    }

    /// Runs `request` through every stage and then `handler`.
    ///
    /// The handler receives a fresh [`RequestState`] extended by each stage.
    pub async fn process<H>(&self, request: Request, handler: H) -> Response
    where
        H: FnOnce(RequestState, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let state = RequestState::with_root_logger(self.root_logger.clone());
        self.build_chain(handler).run(state, request).await
    }

    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(RequestState, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        self.stages
            .iter()
            .rev()
            .fold(Next::handler(handler), |next, stage| Next::new(stage.as_ref(), next))
    }

    /// Returns the stage names in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Builder for [`HttpPipeline`].
pub struct HttpPipelineBuilder {
    stages: Vec<BoxedMiddleware>,
    root_logger: LoggerHandle,
}

impl HttpPipelineBuilder {
    /// Creates an empty builder logging to `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            root_logger: LoggerHandle::tracing(),
        }
    }

    /// Sets the logger every request state starts with.
    #[must_use]
    pub fn root_logger(mut self, logger: LoggerHandle) -> Self {
        self.root_logger = logger;
        self
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn boxed_stage(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> HttpPipeline {
        HttpPipeline {
            stages: self.stages,
            root_logger: self.root_logger,
        }
    }
}

impl Default for HttpPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Middleware for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            state: RequestState,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                self.order.lock().unwrap().push(self.name);
                let response = next.run(state, request).await;
                self.order.lock().unwrap().push(self.name);
                response
            })
        }
    }

    #[tokio::test]
    async fn test_stages_wrap_handler_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let pipeline = HttpPipeline::builder()
            .stage(Recording { name: "outer", order: Arc::clone(&order) })
            .stage(Recording { name: "inner", order: Arc::clone(&order) })
            .build();

        let handler_order = Arc::clone(&order);
        let _ = pipeline
            .process(http::Request::new(Full::new(Bytes::new())), move |_, _| {
                handler_order.lock().unwrap().push("handler");
                Box::pin(async { Response::new(Full::new(Bytes::new())) })
            })
            .await;

        assert_eq!(
            *order.lock().unwrap(),
            vec!["outer", "inner", "handler", "inner", "outer"]
        );
        assert_eq!(pipeline.stage_count(), 2);
    }

    #[test]
    fn test_stage_order() {
        let stages = Stage::all();
        assert!(stages.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(stages[0].name(), "context");
        assert_eq!(stages[3].name(), "authentication");
    }

    #[test]
    fn test_with_stages_follows_given_order() {
        let runtime = Arc::new(Runtime::new(Arc::new(
            keel_core::fixtures::StaticTokenEngine::new("Bearer"),
        )));

        let pipeline = HttpPipeline::with_stages(&runtime, &[Stage::Context, Stage::Authentication]);
        assert_eq!(pipeline.stage_names(), vec!["context", "authentication"]);

        let standard = HttpPipeline::standard(runtime);
        let expected: Vec<_> = Stage::all().iter().map(|stage| stage.name()).collect();
        assert_eq!(standard.stage_names(), expected);
    }

    #[test]
    fn test_stage_names_match_middleware() {
        let runtime = Arc::new(Runtime::new(Arc::new(
            keel_core::fixtures::StaticTokenEngine::new("Bearer"),
        )));
        for stage in Stage::all() {
            assert_eq!(stage.middleware(&runtime).name(), stage.name());
        }
    }
}
