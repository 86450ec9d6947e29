//! Newline-delimited framing over a reader/writer pair.
//!
//! One message per line. A zero-length line or end of input ends the
//! stream. Writes are flushed immediately because the supervisor reads
//! line by line.

use std::io::{self, BufRead, Write};

use thiserror::Error;
use tracing::trace;

/// Errors raised by the line transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Reading from the input stream failed.
    #[error("failed to read from supervisor")]
    Read(#[source] io::Error),
    /// Writing or flushing the output stream failed.
    #[error("failed to write to supervisor")]
    Write(#[source] io::Error),
    /// An outbound message contained a raw line terminator.
    #[error("outbound message contains an embedded newline")]
    EmbeddedNewline,
}

/// Line-oriented transport shared by the dispatch loop and checkpoint
/// handshake.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> LineTransport<R, W>
where
    R: BufRead,
    W: Write,
{
    /// Creates a transport over `reader` and `writer`.
    #[must_use]
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads the next message, blocking until a full line is available.
    ///
    /// Returns `Ok(None)` at end of input or on a zero-length line. The line
    /// terminator (`\n` or `\r\n`) is stripped.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Read`] if the underlying read fails or the
    /// line is not valid UTF-8.
    pub fn read_message(&mut self) -> Result<Option<String>, TransportError> {
        let mut line = String::new();
        let bytes_read = self
            .reader
            .read_line(&mut line)
            .map_err(TransportError::Read)?;
        if bytes_read == 0 {
            trace!("input stream closed");
            return Ok(None);
        }

        let message = line.trim_end_matches(['\n', '\r']);
        if message.is_empty() {
            trace!("zero-length line received");
            return Ok(None);
        }

        trace!(line = message, "received line");
        Ok(Some(message.to_owned()))
    }

    /// Writes `message` followed by a newline and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::EmbeddedNewline`] if `message` spans more
    /// than one line, or [`TransportError::Write`] if writing fails.
    pub fn write_message(&mut self, message: &str) -> Result<(), TransportError> {
        if message.contains(['\n', '\r']) {
            return Err(TransportError::EmbeddedNewline);
        }

        trace!(line = message, "sending line");
        self.writer
            .write_all(message.as_bytes())
            .map_err(TransportError::Write)?;
        self.writer.write_all(b"\n").map_err(TransportError::Write)?;
        self.writer.flush().map_err(TransportError::Write)
    }

    /// Returns the output stream.
    #[must_use]
    pub const fn writer(&self) -> &W {
        &self.writer
    }
}
