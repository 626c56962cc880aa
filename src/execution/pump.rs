//! Stream copiers and the pump threads that run them.
//!
//! A [`StreamCopier`] drains one readable stream into a [`CaptureSink`]
//! until end-of-stream. An [`OutputPump`] runs a copier on its own scoped
//! thread so the child never blocks on a full pipe while the caller is busy
//! elsewhere.

use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::thread::{Scope, ScopedJoinHandle};

use tracing::{debug, error, trace, warn};

use super::result::OutputSource;
use super::sink::{CaptureSink, LineHandler};
use super::watchdog::Terminate;
use crate::error::ExecError;
use crate::Result;

/// Default chunk size for reading process output.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8192;

/// Drains one input stream into a sink.
pub struct StreamCopier<'a, R> {
    source: R,
    sink: CaptureSink<'a>,
    buffer_size: usize,
}

impl<'a, R: Read> StreamCopier<'a, R> {
    /// Create a copier with the default buffer size.
    pub fn new(source: R, sink: CaptureSink<'a>) -> Self {
        Self {
            source,
            sink,
            buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    /// Create with custom buffer size. Zero is treated as one byte.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Copy until end-of-stream, returning the number of bytes drained.
    pub fn copy(self) -> io::Result<u64> {
        match self.sink {
            CaptureSink::Bytes(writer) => copy_bytes(self.source, writer, self.buffer_size),
            CaptureSink::Lines(handler) => copy_lines(
                BufReader::with_capacity(self.buffer_size, self.source),
                handler,
            ),
        }
    }
}

fn copy_bytes<R: Read>(
    mut source: R,
    writer: &mut (dyn io::Write + Send),
    buffer_size: usize,
) -> io::Result<u64> {
    let mut buf = vec![0u8; buffer_size];
    let mut total = 0u64;

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        trace!("pump: read {} bytes", n);
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }

    writer.flush()?;
    Ok(total)
}

/// Split on `\n`, `\r\n` or a lone `\r`, delivering each line once.
/// A trailing unterminated line is flushed at end-of-stream.
fn copy_lines<R: BufRead>(
    mut source: R,
    handler: &mut (dyn LineHandler + Send),
) -> io::Result<u64> {
    let mut line = Vec::new();
    let mut after_cr = false;
    let mut total = 0u64;

    loop {
        let chunk = match source.fill_buf() {
            Ok([]) => break,
            Ok(chunk) => chunk,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let len = chunk.len();
        trace!("pump: read {} bytes", len);

        for &byte in chunk {
            if after_cr {
                after_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => deliver(handler, &mut line),
                b'\r' => {
                    deliver(handler, &mut line);
                    after_cr = true;
                }
                _ => line.push(byte),
            }
        }

        source.consume(len);
        total += len as u64;
    }

    if !line.is_empty() {
        deliver(handler, &mut line);
    }
    Ok(total)
}

fn deliver(handler: &mut (dyn LineHandler + Send), line: &mut Vec<u8>) {
    handler.handle_line(&String::from_utf8_lossy(line));
    line.clear();
}

/// Kills the target when dropped while still armed.
struct KillOnFailure<'t, T: Terminate> {
    source: OutputSource,
    target: Option<&'t T>,
}

impl<T: Terminate> KillOnFailure<'_, T> {
    fn disarm(&mut self) {
        self.target = None;
    }
}

impl<T: Terminate> Drop for KillOnFailure<'_, T> {
    fn drop(&mut self) {
        let Some(target) = self.target.take() else {
            return;
        };
        warn!(source = %self.source, "pump: copy failed, killing process");
        if let Err(e) = target.terminate() {
            error!(source = %self.source, error = %e, "pump: kill failed");
        }
    }
}

/// A stream copier running on its own thread.
///
/// Draining starts as soon as the pump is started; [`join`](Self::join)
/// blocks until end-of-stream or a read failure.
pub struct OutputPump<'scope> {
    source: OutputSource,
    handle: ScopedJoinHandle<'scope, io::Result<u64>>,
}

impl<'scope> OutputPump<'scope> {
    /// Spawn a thread in `scope` that runs `copier` to completion.
    ///
    /// If the copy fails or the sink panics, `on_failure` is terminated
    /// from the pump thread before the thread finishes.
    pub fn start<'env, 'a, R, T>(
        scope: &'scope Scope<'scope, 'env>,
        source: OutputSource,
        copier: StreamCopier<'a, R>,
        on_failure: &'scope T,
    ) -> Result<Self>
    where
        R: Read + Send + 'scope,
        T: Terminate + Sync,
        'a: 'scope,
    {
        debug!(%source, sink = copier.sink.kind(), "pump: starting");
        let handle = std::thread::Builder::new()
            .name(format!("pipe-exec-{}", source))
            .spawn_scoped(scope, move || {
                let mut guard = KillOnFailure {
                    source,
                    target: Some(on_failure),
                };
                let result = copier.copy();
                match &result {
                    Ok(total) => {
                        guard.disarm();
                        debug!(%source, total, "pump: EOF");
                    }
                    Err(e) => debug!(%source, error = %e, "pump: read failed"),
                }
                result
            })
            .map_err(ExecError::Thread)?;

        Ok(Self { source, handle })
    }

    /// Block until the stream is fully drained.
    ///
    /// Returns the byte count, or the read failure that ended the copy.
    pub fn join(self) -> Result<u64> {
        let source = self.source;
        match self.handle.join() {
            Ok(Ok(total)) => Ok(total),
            Ok(Err(e)) => Err(ExecError::Stream { stream: source, source: e }),
            Err(_) => Err(ExecError::Interrupted(format!("{} pump panicked", source))),
        }
    }
}
