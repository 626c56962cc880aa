//! Configuration management for pipe-exec.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file (JSON)
//! 3. Default values

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::execution::DEFAULT_READ_BUFFER_SIZE;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Executor defaults.
    pub execution: ExecutionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Executor defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Timeout in milliseconds for commands that set none.
    pub default_timeout_ms: Option<u64>,
    /// Chunk size used when draining output.
    pub read_buffer_size: usize,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            default_timeout_ms: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(ms) = std::env::var("PIPE_EXEC_DEFAULT_TIMEOUT_MS") {
            let ms = ms
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PIPE_EXEC_DEFAULT_TIMEOUT_MS", ms))?;
            self.execution.default_timeout_ms = Some(ms);
        }

        if let Ok(size) = std::env::var("PIPE_EXEC_READ_BUFFER_SIZE") {
            self.execution.read_buffer_size = size
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PIPE_EXEC_READ_BUFFER_SIZE", size))?;
        }

        if let Ok(level) = std::env::var("PIPE_EXEC_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Reject settings the executor cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.read_buffer_size == 0 {
            return Err(ConfigError::InvalidValue(
                "read_buffer_size",
                "0".to_string(),
            ));
        }
        if self.execution.default_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "default_timeout_ms",
                "0".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: env vars > config file > defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env()?;
        config.validate()?;

        Ok(config)
    }

    /// The default timeout as a duration.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.execution.default_timeout_ms.map(Duration::from_millis)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// A setting holds a value the executor cannot use.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.execution.default_timeout_ms.is_none());
        assert_eq!(config.execution.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.log_filter(), "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "execution": {
                "default_timeout_ms": 2500,
                "read_buffer_size": 512
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.execution.read_buffer_size, 512);
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "execution": { "default_timeout_ms": 100 } }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.execution.read_buffer_size, DEFAULT_READ_BUFFER_SIZE); // Default
        assert_eq!(config.execution.default_timeout_ms, Some(100));
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_config_missing_file() {
        let result = Config::from_file(Path::new("/nonexistent/pipe-exec.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let mut config = Config::default();
        config.execution.read_buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.execution.default_timeout_ms = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("default_timeout_ms"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"read_buffer_size\""));
        assert!(json.contains("\"level\""));
    }
}
