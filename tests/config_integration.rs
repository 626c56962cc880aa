//! Configuration integration tests.
//!
//! These tests verify configuration loading and how it reaches the executor.

use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

use pipe_exec::config::{Config, ConfigError};
use pipe_exec::CommandExecutor;

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let file = config_file(
        r#"{
        "execution": {
            "default_timeout_ms": 750,
            "read_buffer_size": 2048
        },
        "logging": {
            "level": "trace"
        }
    }"#,
    );

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.default_timeout(), Some(Duration::from_millis(750)));
    assert_eq!(config.execution.read_buffer_size, 2048);
    assert_eq!(config.log_filter(), "trace");
}

#[test]
fn test_config_drives_executor() {
    let file = config_file(r#"{"execution": {"default_timeout_ms": 5000}}"#);
    let config = Config::from_file(file.path()).unwrap();

    let executor = CommandExecutor::from_config(&config);
    assert_eq!(executor.default_timeout(), Some(Duration::from_secs(5)));
}

#[test]
fn test_config_rejects_zero_buffer() {
    let file = config_file(r#"{"execution": {"read_buffer_size": 0}}"#);
    let config = Config::from_file(file.path()).unwrap();

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue("read_buffer_size", _))
    ));
}

#[test]
fn test_config_env_overrides_file() {
    // The only test in this binary that touches the process environment.
    let file = config_file(r#"{"execution": {"default_timeout_ms": 100, "read_buffer_size": 64}}"#);

    std::env::set_var("PIPE_EXEC_DEFAULT_TIMEOUT_MS", "9000");
    std::env::set_var("PIPE_EXEC_LOG_LEVEL", "pipe_exec=debug");
    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(config.default_timeout(), Some(Duration::from_secs(9)));
    assert_eq!(config.execution.read_buffer_size, 64); // From file
    assert_eq!(config.log_filter(), "pipe_exec=debug");

    std::env::set_var("PIPE_EXEC_READ_BUFFER_SIZE", "not-a-number");
    let result = Config::load(Some(file.path()));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue("PIPE_EXEC_READ_BUFFER_SIZE", _))
    ));

    std::env::remove_var("PIPE_EXEC_DEFAULT_TIMEOUT_MS");
    std::env::remove_var("PIPE_EXEC_LOG_LEVEL");
    std::env::remove_var("PIPE_EXEC_READ_BUFFER_SIZE");
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let mut original = Config::default();
    original.execution.default_timeout_ms = Some(1234);
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(loaded.execution.default_timeout_ms, Some(1234));
    assert_eq!(loaded.execution.read_buffer_size, original.execution.read_buffer_size);
}

#[test]
fn test_config_partial_deserialization() {
    let config: Config = serde_json::from_str(r#"{"logging": {"level": "warn"}}"#).unwrap();

    assert_eq!(config.log_filter(), "warn");
    assert!(config.execution.default_timeout_ms.is_none()); // Default
}
