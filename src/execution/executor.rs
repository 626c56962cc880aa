//! Command execution engine.
//!
//! One call spawns one process, drains stdout and stderr on two pump
//! threads, optionally arms a watchdog, then joins everything in a fixed
//! order: stdout pump, stderr pump, process exit, watchdog.

use std::io::{self, Write};
use std::process::{Child, ChildStderr, ChildStdout, ExitStatus, Stdio};
use std::sync::{Mutex, PoisonError};
use std::thread::Scope;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::command::Command;
use super::pump::{OutputPump, StreamCopier, DEFAULT_READ_BUFFER_SIZE};
use super::result::{decode_output, exit_code_of, ExecutionResult, OutputSource};
use super::sink::{CaptureSink, LineHandler};
use super::watchdog::{lock, Terminate, Watchdog};
use crate::config::Config;
use crate::error::ExecError;
use crate::Result;

/// How often the exit status is polled while a watchdog may kill the child.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs commands with concurrent output capture and an optional timeout.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    read_buffer_size: usize,
    default_timeout: Option<Duration>,
}

enum Outcome {
    Exited { status: ExitStatus, stdout_bytes: u64 },
    TimedOut(Duration),
}

impl CommandExecutor {
    /// Create a new command executor with default settings.
    pub fn new() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            default_timeout: None,
        }
    }

    /// Create an executor from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            read_buffer_size: config.execution.read_buffer_size.max(1),
            default_timeout: config.default_timeout(),
        }
    }

    /// Set the chunk size used when draining output.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Timeout applied to commands that do not set their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// The timeout applied to commands without one.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Run the command, copying its stdout verbatim into `sink`.
    pub fn run_capturing_stream<W>(&self, command: &Command, sink: &mut W) -> Result<ExecutionResult>
    where
        W: Write + Send,
    {
        self.execute(command, CaptureSink::bytes(sink))
    }

    /// Run the command, delivering its stdout to `handler` one line at a time.
    pub fn run_with_line_handler<H>(&self, command: &Command, handler: &mut H) -> Result<ExecutionResult>
    where
        H: LineHandler + Send,
    {
        self.execute(command, CaptureSink::lines(handler))
    }

    /// Run the command and capture its stdout as text.
    pub fn run(&self, command: &Command) -> Result<ExecutionResult> {
        let mut stdout = Vec::new();
        let mut result = self.execute(command, CaptureSink::bytes(&mut stdout))?;
        result.stdout_text = Some(decode_output(stdout));
        Ok(result)
    }

    /// Run the command on tokio's blocking pool and capture its stdout.
    pub async fn run_async(&self, command: Command) -> Result<ExecutionResult> {
        let executor = self.clone();
        tokio::task::spawn_blocking(move || executor.run(&command))
            .await
            .map_err(|e| ExecError::Interrupted(format!("execution task failed: {}", e)))?
    }

    fn execute(&self, command: &Command, stdout_sink: CaptureSink<'_>) -> Result<ExecutionResult> {
        command.validate()?;
        let timeout = command.get_timeout().or(self.default_timeout);
        if timeout == Some(Duration::ZERO) {
            return Err(ExecError::InvalidCommand(
                "timeout must be greater than zero".into(),
            ));
        }

        let start = Instant::now();
        let mut child = command
            .to_std()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: command.program().to_string(),
                source,
            })?;

        let pid = child.id();
        debug!(pid, %command, sink = stdout_sink.kind(), "spawned process");

        let Some((stdout, stderr)) = child.stdout.take().zip(child.stderr.take()) else {
            reap(&mut child);
            return Err(ExecError::Stream {
                stream: OutputSource::Stdout,
                source: io::Error::new(io::ErrorKind::BrokenPipe, "output pipe not captured"),
            });
        };

        let mut stderr_buf = Vec::new();
        let stdout_copier =
            StreamCopier::new(stdout, stdout_sink).with_buffer_size(self.read_buffer_size);
        let stderr_copier = StreamCopier::new(stderr, CaptureSink::bytes(&mut stderr_buf))
            .with_buffer_size(self.read_buffer_size);

        let child = Mutex::new(child);
        let outcome = std::thread::scope(|scope| {
            let outcome = supervise(scope, &child, stdout_copier, stderr_copier, timeout);
            if outcome.is_err() {
                // Pumps still running must see EOF before the scope can close.
                let _ = child.terminate();
            }
            outcome
        });

        let mut child = child.into_inner().unwrap_or_else(PoisonError::into_inner);
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                reap(&mut child);
                return Err(e);
            }
        };
        drop(child);

        match outcome {
            Outcome::TimedOut(timeout) => {
                warn!(pid, %command, timeout_ms = timeout.as_millis() as u64, "command timed out");
                Err(ExecError::Timeout {
                    command: command.to_string(),
                    timeout,
                })
            }
            Outcome::Exited {
                status,
                stdout_bytes,
            } => {
                let exit_code = exit_code_of(status);
                let duration = start.elapsed();
                debug!(pid, exit_code, ?duration, "process exited");

                Ok(ExecutionResult {
                    exit_code,
                    standard_error_text: decode_output(stderr_buf.clone()),
                    stderr: stderr_buf,
                    stdout_text: None,
                    stdout_bytes,
                    pid,
                    duration,
                })
            }
        }
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive one process to completion inside `scope`.
///
/// The watchdog is armed before the pumps start. Either pump kills the
/// child as soon as its copy fails, so neither join can outlive a broken
/// stream. The watchdog state is read only after both pumps have joined
/// and the exit status has been collected.
fn supervise<'scope, 'env, 'a, 'b>(
    scope: &'scope Scope<'scope, 'env>,
    child: &'scope Mutex<Child>,
    stdout: StreamCopier<'a, ChildStdout>,
    stderr: StreamCopier<'b, ChildStderr>,
    timeout: Option<Duration>,
) -> Result<Outcome>
where
    'a: 'scope,
    'b: 'scope,
{
    let mut watchdog = timeout
        .map(|timeout| Watchdog::start(scope, child, timeout))
        .transpose()?;

    let stdout_pump = OutputPump::start(scope, OutputSource::Stdout, stdout, child)?;
    let stderr_pump = OutputPump::start(scope, OutputSource::Stderr, stderr, child)?;

    let stdout_joined = stdout_pump.join();
    let stderr_joined = stderr_pump.join();
    let status = wait_for_exit(child, watchdog.is_some());

    if let Some(watchdog) = watchdog.as_mut() {
        watchdog.cancel()?;
        if watchdog.timed_out() {
            return Ok(Outcome::TimedOut(watchdog.timeout()));
        }
    }

    let stdout_bytes = stdout_joined?;
    stderr_joined?;
    let status = status.map_err(ExecError::Wait)?;

    Ok(Outcome::Exited {
        status,
        stdout_bytes,
    })
}

/// Block until the child exits.
///
/// With a watchdog in play the child lock must stay available for the
/// kill, so the status is polled instead of held in a blocking wait.
fn wait_for_exit(child: &Mutex<Child>, shared: bool) -> io::Result<ExitStatus> {
    if !shared {
        return lock(child).wait();
    }
    loop {
        if let Some(status) = lock(child).try_wait()? {
            return Ok(status);
        }
        std::thread::sleep(EXIT_POLL_INTERVAL);
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Simple one-shot execution capturing stdout.
pub fn run_simple<I, S>(argv: I) -> Result<ExecutionResult>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let command = Command::from_argv(argv)?;
    CommandExecutor::new().run(&command)
}

/// One-shot execution with a timeout.
pub fn run_with_timeout<I, S>(argv: I, timeout: Duration) -> Result<ExecutionResult>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let command = Command::from_argv(argv)?.timeout(timeout);
    CommandExecutor::new().run(&command)
}
