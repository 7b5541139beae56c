//! Structured logging for the Keel runtime layer.
//!
//! Every log record the runtime emits goes through `tracing`. This crate
//! installs the subscriber (JSON for production, pretty for development) and
//! defines the standard field names used by the request pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use keel_config::ConfigLoader;
//! use keel_telemetry::{init_logging, LogConfig};
//!
//! let config = ConfigLoader::new().with_env_prefix("KEEL").load()?;
//! init_logging(&LogConfig::from(&config.logging))?;
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod fields;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
