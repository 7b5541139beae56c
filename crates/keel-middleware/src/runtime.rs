//! Shared collaborators every request is enriched from.

use keel_config::KeelConfig;
use keel_core::{CookieSessionManager, LoggerHandle, SessionManager, TokenEngine};
use std::sync::Arc;
use std::time::Duration;

/// Default request time budget.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The process-wide collaborators and settings the pipeline reads.
///
/// Cheap to clone; every field is shared.
///
/// # Example
///
/// ```
/// use keel_config::KeelConfig;
/// use keel_core::fixtures::StaticTokenEngine;
/// use keel_middleware::Runtime;
/// use std::sync::Arc;
///
/// let runtime = Runtime::from_config(
///     &KeelConfig::development(),
///     Arc::new(StaticTokenEngine::new("Bearer")),
/// );
/// assert_eq!(runtime.token_engine().declared_scheme(), "Bearer");
/// ```
#[derive(Debug, Clone)]
pub struct Runtime {
    node_id: u16,
    request_timeout: Duration,
    logger: LoggerHandle,
    session_manager: Arc<dyn SessionManager>,
    token_engine: Arc<dyn TokenEngine>,
}

impl Runtime {
    /// Creates a runtime with default settings, a `tracing` root logger and
    /// cookie sessions.
    pub fn new(token_engine: Arc<dyn TokenEngine>) -> Self {
        Self {
            node_id: 0,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            logger: LoggerHandle::tracing(),
            session_manager: Arc::new(CookieSessionManager::default()),
            token_engine,
        }
    }

    /// Creates a runtime from loaded configuration.
    pub fn from_config(config: &KeelConfig, token_engine: Arc<dyn TokenEngine>) -> Self {
        let session = &config.session;
        Self::new(token_engine)
            .with_node_id(config.server.node_id)
            .with_request_timeout(config.server.request_timeout())
            .with_session_manager(Arc::new(CookieSessionManager::new(
                session.cookie_name.clone(),
                session.path.clone(),
                session.expiration(),
            )))
    }

    /// Sets the node identity logged with every request.
    pub fn with_node_id(mut self, node_id: u16) -> Self {
        self.node_id = node_id;
        self
    }

    /// Sets the request time budget.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the root logger.
    pub fn with_logger(mut self, logger: LoggerHandle) -> Self {
        self.logger = logger;
        self
    }

    /// Sets the session manager.
    pub fn with_session_manager(mut self, manager: Arc<dyn SessionManager>) -> Self {
        self.session_manager = manager;
        self
    }

    /// Returns the node identity.
    pub const fn node_id(&self) -> u16 {
        self.node_id
    }

    /// Returns the request time budget.
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the root logger.
    pub const fn logger(&self) -> &LoggerHandle {
        &self.logger
    }

    /// Returns the session manager.
    pub fn session_manager(&self) -> &Arc<dyn SessionManager> {
        &self.session_manager
    }

    /// Returns the token engine.
    pub fn token_engine(&self) -> &dyn TokenEngine {
        self.token_engine.as_ref()
    }
}
