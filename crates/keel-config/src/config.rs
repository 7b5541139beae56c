//! Main configuration types.
//!
//! This module provides the top-level [`KeelConfig`] struct.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, LogFormat, LoggingConfig, ServerConfig, SessionConfig, LOG_LEVELS};

/// Complete Keel runtime configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use keel_config::KeelConfig;
///
/// let config = KeelConfig::default();
/// assert_eq!(config.server.request_timeout_ms, 30_000);
/// assert_eq!(config.session.cookie_name, "session_id");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct KeelConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Session cookie configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KeelConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The request timeout is zero
    /// - The session cookie name is empty
    /// - The session path does not start with `/`
    /// - The log level is unknown
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "session.cookie_name",
                "must not be empty",
            ));
        }

        if !self.session.path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "session.path",
                format!("must start with '/': {}", self.session.path),
            ));
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("unknown log level: {}", self.logging.level),
            ));
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Debug level, pretty output with ANSI colors.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                ansi_enabled: true,
                ..LoggingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Create a production configuration preset.
    ///
    /// Info level, JSON output.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Json,
                ansi_enabled: false,
                ..LoggingConfig::default()
            },
            ..Self::default()
        }
    }
}
