//! Typed configuration for the Keel runtime layer.
//!
//! This crate provides a strongly-typed configuration system with support for:
//! - TOML and JSON configuration files
//! - `.env` files and environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! [`KeelConfig`] contains every setting the runtime layer reads:
//!
//! - [`ServerConfig`] - node identity and request time budget
//! - [`SessionConfig`] - session cookie name, path and lifetime
//! - [`LoggingConfig`] - log level and output format
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! node_id = 3
//! request_timeout_ms = 30000
//!
//! [session]
//! cookie_name = "session_id"
//! path = "/"
//! expiration_secs = 86400
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! All values can be overridden with `PREFIX__SECTION__KEY` variables:
//!
//! - `KEEL__SERVER__NODE_ID=4`
//! - `KEEL__SERVER__REQUEST_TIMEOUT_MS=5000`
//! - `KEEL__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::KeelConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{LogFormat, LoggingConfig, ServerConfig, SessionConfig, LOG_LEVELS};
