//! # pipe-exec
//!
//! Run one external process, capture its output, and kill it if it runs
//! too long.
//!
//! Each call spawns the process, drains stdout and stderr concurrently on
//! dedicated threads so the child never blocks on a full pipe, optionally
//! arms a watchdog that kills the child after a timeout, and returns an
//! immutable [`ExecutionResult`].
//!
//! ## Features
//!
//! - **Concurrent capture**: stdout and stderr are pumped in parallel
//! - **Pluggable sinks**: raw bytes into any `Write`, or one line at a time
//! - **Timeouts**: a watchdog kills runaway processes without losing output
//! - **Async bridge**: run on tokio's blocking pool from async code
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use pipe_exec::{Command, CommandExecutor};
//!
//! fn main() -> pipe_exec::Result<()> {
//!     // Initialize logging
//!     pipe_exec::logging::try_init().ok();
//!
//!     let cmd = Command::new("ls").arg("-la").timeout(Duration::from_secs(5));
//!     let result = CommandExecutor::new().run(&cmd)?;
//!
//!     println!("exit code {}", result.exit_code());
//!     print!("{}", result.stdout());
//!     eprint!("{}", result.standard_error_text());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod logging;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExecError, Result};
pub use execution::{Command, CommandExecutor, ExecutionResult, LineHandler, OutputSource};
