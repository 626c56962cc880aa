//! Error types for pipe-exec.

use std::time::Duration;

use thiserror::Error;

use crate::execution::OutputSource;

/// Failure of a single process invocation.
///
/// Every failure of a `run*` call lands here; nothing is retried.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The command was rejected before anything was spawned.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The process could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading one of the output streams failed.
    #[error("failed to drain {stream}: {source}")]
    Stream {
        stream: OutputSource,
        #[source]
        source: std::io::Error,
    },

    /// The watchdog killed the process.
    #[error("command ({command}) timed out ({} msecs)", .timeout.as_millis())]
    Timeout { command: String, timeout: Duration },

    /// A worker thread or task died before completing.
    #[error("command execution interrupted: {0}")]
    Interrupted(String),

    /// Waiting for the process to exit failed.
    #[error("failed to wait for process exit: {0}")]
    Wait(#[source] std::io::Error),

    /// A pump or watchdog thread could not be started.
    #[error("failed to start worker thread: {0}")]
    Thread(#[source] std::io::Error),
}

impl ExecError {
    /// Whether this failure was raised by the timeout watchdog.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::Timeout { .. })
    }
}

/// Convenience Result type for pipe-exec operations.
pub type Result<T> = std::result::Result<T, ExecError>;
