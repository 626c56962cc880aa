//! Execution result types.

use std::fmt;
use std::process::ExitStatus;
use std::time::Duration;

/// Source of output data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputSource {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl fmt::Display for OutputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSource::Stdout => f.write_str("stdout"),
            OutputSource::Stderr => f.write_str("stderr"),
        }
    }
}

/// Outcome of one completed process invocation.
///
/// Built only after both output streams are drained and the process has
/// been reaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code of the process.
    pub exit_code: i32,
    /// Raw bytes written to standard error.
    pub stderr: Vec<u8>,
    /// Standard error decoded as text.
    pub standard_error_text: String,
    /// Captured standard output, present only for [`run`](super::CommandExecutor::run).
    pub stdout_text: Option<String>,
    /// Bytes drained from standard output into the caller's sink.
    pub stdout_bytes: u64,
    /// Process id of the child.
    pub pid: u32,
    /// Wall-clock time from spawn to reap.
    pub duration: Duration,
}

impl ExecutionResult {
    /// The exit code.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Everything the process wrote to standard error.
    pub fn standard_error_text(&self) -> &str {
        &self.standard_error_text
    }

    /// Captured standard output; empty when output went to a caller sink.
    pub fn stdout(&self) -> &str {
        self.stdout_text.as_deref().unwrap_or_default()
    }

    /// True iff the exit code is non-zero.
    pub fn is_error(&self) -> bool {
        self.exit_code != 0
    }

    /// True iff the exit code is zero.
    pub fn success(&self) -> bool {
        !self.is_error()
    }
}

/// Decode process output as text.
///
/// Strict UTF-8 first; if the bytes are not valid UTF-8, every invalid
/// sequence is replaced with U+FFFD.
pub fn decode_output(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Map an exit status to an integer code.
///
/// A process killed by a signal reports `128 + signal` on Unix. `-1` when
/// neither is available.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
