//! Destinations for drained process output.

use std::io::Write;

/// Consumer of one decoded line of output at a time.
///
/// Called from a pump thread, in output order, never concurrently with
/// itself. Closures taking `&str` implement this trait.
pub trait LineHandler {
    /// Receive one line with its terminator stripped.
    fn handle_line(&mut self, line: &str);
}

impl<F> LineHandler for F
where
    F: FnMut(&str),
{
    fn handle_line(&mut self, line: &str) {
        self(line)
    }
}

/// Where a pump delivers the bytes it drains.
pub enum CaptureSink<'a> {
    /// Raw bytes, copied verbatim.
    Bytes(&'a mut (dyn Write + Send)),
    /// Newline-delimited records.
    Lines(&'a mut (dyn LineHandler + Send)),
}

impl<'a> CaptureSink<'a> {
    /// Wrap a byte destination.
    pub fn bytes<W: Write + Send>(writer: &'a mut W) -> Self {
        CaptureSink::Bytes(writer)
    }

    /// Wrap a line handler.
    pub fn lines<H: LineHandler + Send>(handler: &'a mut H) -> Self {
        CaptureSink::Lines(handler)
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            CaptureSink::Bytes(_) => "bytes",
            CaptureSink::Lines(_) => "lines",
        }
    }
}

impl std::fmt::Debug for CaptureSink<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CaptureSink::{}", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_line_handler() {
        let mut seen = Vec::new();
        let mut handler = |line: &str| seen.push(line.to_string());
        handler.handle_line("one");
        handler.handle_line("two");
        assert_eq!(seen, ["one", "two"]);
    }

    #[test]
    fn test_sink_kind() {
        let mut buf = Vec::new();
        assert_eq!(CaptureSink::bytes(&mut buf).kind(), "bytes");

        let mut handler = |_: &str| {};
        assert_eq!(CaptureSink::lines(&mut handler).kind(), "lines");
    }
}
