//! Command execution engine.
//!
//! This module provides process execution with concurrent output capture:
//! - Two pump threads drain stdout and stderr so the child never blocks
//! - An optional watchdog kills the child when it outlives its timeout
//! - Results are returned as immutable values
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use pipe_exec::execution::{Command, CommandExecutor};
//!
//! let executor = CommandExecutor::new();
//!
//! // Capture stdout as text
//! let cmd = Command::new("git").args(["status", "--short"]);
//! let result = executor.run(&cmd).unwrap();
//! println!("{}", result.stdout());
//!
//! // Stream stdout line by line, killing the process after a minute
//! let cmd = Command::new("cargo")
//!     .arg("build")
//!     .timeout(Duration::from_secs(60));
//! let mut print = |line: &str| println!("build: {line}");
//! executor.run_with_line_handler(&cmd, &mut print).unwrap();
//! ```

mod command;
mod executor;
mod pump;
mod result;
mod sink;
mod watchdog;

pub use command::Command;
pub use executor::{run_simple, run_with_timeout, CommandExecutor};
pub use pump::{OutputPump, StreamCopier, DEFAULT_READ_BUFFER_SIZE};
pub use result::{decode_output, exit_code_of, ExecutionResult, OutputSource};
pub use sink::{CaptureSink, LineHandler};
pub use watchdog::{Terminate, Watchdog, WatchdogState};
