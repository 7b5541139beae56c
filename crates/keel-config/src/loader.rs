//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::{ConfigError, KeelConfig, LogFormat};

/// Builds a [`KeelConfig`] from stacked layers.
///
/// A preset (defaults, development or production) is the base. Each file or
/// string layer is merged into it key by key, so a layer only overrides the
/// keys it names. Environment variables named `PREFIX__SECTION__KEY` are
/// applied last, in [`load`](Self::load).
///
/// ```no_run
/// use keel_config::ConfigLoader;
///
/// # fn main() -> Result<(), keel_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_production()
///     .with_optional_file("keel.toml")?
///     .with_dotenv()?
///     .with_env_prefix("KEEL")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: KeelConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a loader seeded with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the base to the defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = KeelConfig::default();
        self
    }

    /// Resets the base to the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = KeelConfig::development();
        self
    }

    /// Resets the base to the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = KeelConfig::production();
        self
    }

    /// Merges a `.toml` or `.json` file.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| {
                ConfigError::validation_error(format!(
                    "unsupported configuration file format: {}",
                    path.display()
                ))
            })?;
        self.with_string(&content, &format)
    }

    /// Merges the file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Merges a layer given as text in `format` (`toml` or `json`).
    ///
    /// Unknown sections or keys are rejected here, before the merge.
    ///
    /// ```
    /// use keel_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .with_string("[server]\nnode_id = 7", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.node_id, 7);
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer: Value = match format.to_lowercase().as_str() {
            "toml" => {
                toml::from_str::<KeelConfig>(content)?;
                toml::from_str(content)?
            }
            "json" => {
                let layer: Value = serde_json::from_str(content)?;
                serde_json::from_value::<KeelConfig>(layer.clone())?;
                layer
            }
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };

        let mut merged = serde_json::to_value(&self.config)?;
        merge(&mut merged, layer);
        self.config = serde_json::from_value(merged)?;
        Ok(self)
    }

    /// Applies `PREFIX__SECTION__KEY` environment variables at load time.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads a `.env` file into the process environment, if one exists.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(err) if err.not_found() => Ok(self),
            Err(err) => Err(err.into()),
        }
    }

    /// Applies environment overrides and validates the result.
    pub fn load(mut self) -> Result<KeelConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let marker = format!("{prefix}__");
            for (key, value) in env::vars().filter(|(key, _)| key.starts_with(&marker)) {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the merged configuration without env overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> KeelConfig {
        self.config
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let path = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;
        let parts: Vec<&str> = path.split("__").collect();

        let config = &mut self.config;
        match parts.as_slice() {
            ["SERVER", "NODE_ID"] => {
                config.server.node_id = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer 0-65535"))?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                config.server.request_timeout_ms = parse_u64(key, value)?;
            }
            ["SESSION", "COOKIE_NAME"] => config.session.cookie_name = value.to_string(),
            ["SESSION", "PATH"] => config.session.path = value.to_string(),
            ["SESSION", "EXPIRATION_SECS"] => {
                config.session.expiration_secs = parse_u64(key, value)?;
            }
            ["LOGGING", "ENABLED"] => config.logging.enabled = parse_bool(key, value)?,
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_lowercase(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOGGING", "ANSI_ENABLED"] => config.logging.ansi_enabled = parse_bool(key, value)?,
            _ => {}
        }
        Ok(())
    }
}

/// Overlays `layer` onto `base`; tables merge recursively, scalars replace.
fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => merge_tables(base, layer),
        (base, layer) => *base = layer,
    }
}

fn merge_tables(base: &mut Map<String, Value>, layer: Map<String, Value>) {
    for (key, value) in layer {
        match base.get_mut(&key) {
            Some(existing) => merge(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse_error(key, "expected boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, KeelConfig::default());
    }

    #[test]
    fn test_loader_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_layer_keeps_preset_keys() {
        let config = ConfigLoader::new()
            .with_development()
            .with_string("[server]\nnode_id = 3", "toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.node_id, 3);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_later_layer_overrides_only_named_keys() {
        let config = ConfigLoader::new()
            .with_string("[session]\ncookie_name = \"sid\"\npath = \"/api\"", "toml")
            .unwrap()
            .with_string(r#"{"session": {"path": "/auth"}}"#, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.session.cookie_name, "sid");
        assert_eq!(config.session.path, "/auth");
        assert_eq!(config.session.expiration_secs, 86_400);
    }

    #[test]
    fn test_loader_with_string_unknown_format() {
        let result = ConfigLoader::new().with_string("", "yaml");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_loader_rejects_unknown_section() {
        let result = ConfigLoader::new().with_string("[telemetry]\nenabled = true", "toml");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));

        let result = ConfigLoader::new().with_string(r#"{"server": {"port": 80}}"#, "json");
        assert!(matches!(result, Err(ConfigError::JsonError(_))));
    }

    #[test]
    fn test_loader_with_file_merges_into_preset() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nnode_id = 12\nrequest_timeout_ms = 2500").unwrap();

        let config = ConfigLoader::new()
            .with_production()
            .with_file(file.path())
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.node_id, 12);
        assert_eq!(config.server.request_timeout_ms, 2_500);
        assert_eq!(config.logging, KeelConfig::production().logging);
    }

    #[test]
    fn test_loader_with_file_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let result = ConfigLoader::new().with_file(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/keel.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/keel.toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config, KeelConfig::default());
    }

    #[test]
    fn test_load_validates() {
        let result = ConfigLoader::new()
            .with_string("[server]\nrequest_timeout_ms = 0", "toml")
            .unwrap()
            .load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_loader_load_unvalidated() {
        let config = ConfigLoader::new()
            .with_string("[session]\npath = \"relative\"", "toml")
            .unwrap()
            .load_unvalidated();

        assert_eq!(config.session.path, "relative");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_prefix_ignores_lookalike_variables() {
        env::set_var("KEELLOADERTEST_HOME", "/x");
        env::set_var("KEELLOADERTESTHOME", "/y");
        env::set_var("KEELLOADERTEST__SERVER__NODE_ID", "9");

        let config = ConfigLoader::new()
            .with_env_prefix("KeelLoaderTest")
            .load()
            .unwrap();

        assert_eq!(config.server.node_id, 9);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("K", "TRUE").unwrap());
        assert!(parse_bool("K", "on").unwrap());
        assert!(!parse_bool("K", "0").unwrap());
        assert!(matches!(parse_bool("K", "maybe"), Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_apply_env_var_server() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__SERVER__NODE_ID", "4", "TEST").unwrap();
        loader
            .apply_env_var("TEST__SERVER__REQUEST_TIMEOUT_MS", "5000", "TEST")
            .unwrap();
        assert_eq!(loader.config.server.node_id, 4);
        assert_eq!(loader.config.server.request_timeout_ms, 5_000);
    }

    #[test]
    fn test_apply_env_var_node_id_out_of_range() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__SERVER__NODE_ID", "70000", "TEST");
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_apply_env_var_session_and_logging() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__SESSION__PATH", "/auth", "TEST").unwrap();
        loader.apply_env_var("TEST__LOGGING__FORMAT", "pretty", "TEST").unwrap();
        loader.apply_env_var("TEST__LOGGING__ENABLED", "no", "TEST").unwrap();
        assert_eq!(loader.config.session.path, "/auth");
        assert_eq!(loader.config.logging.format, LogFormat::Pretty);
        assert!(!loader.config.logging.enabled);
    }

    #[test]
    fn test_apply_env_var_invalid_format() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__LOGGING__FORMAT", "xml", "TEST");
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_env_var_unknown_key_ignored() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__SERVER__HTTP_ADDR", "x", "TEST").unwrap();
        assert_eq!(loader.config, KeelConfig::default());
    }
}
