//! I/O boundary
//!
//! Wraps the socket primitives so that every failure comes back as an
//! [`IoFailure`] naming the primitive, the OS diagnostic and the call site.
//!
//! Each primitive runs inside a scoped guard: a trace span entered for the
//! duration of the call (the previously active span is restored on every exit
//! path) and the conversion of `io::Error` into `IoFailure`. `Interrupted` is
//! retried inside the guard and never surfaces.

use std::io::{self, Read, Write};
use std::panic::Location;
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use super::socket::{Socket, SocketOption};
use crate::error::IoFailure;

/// Upper bound for a single read from the socket
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Longest line `read_line` buffers while waiting for a terminator
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Buffered, error-converting wrapper over a socket
#[derive(Debug)]
pub struct Io<S> {
    socket: S,

    /// Bytes read ahead by `read_line` and not consumed yet
    buffer: BytesMut,
}

impl<S: Socket> Io<S> {
    pub fn new(socket: S) -> Self {
        Self {
            socket,
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.socket
    }

    /// Release the socket, discarding any read-ahead bytes
    pub fn into_inner(self) -> S {
        self.socket
    }

    /// Bytes held in the read-ahead buffer
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Write `data` with a single primitive call
    ///
    /// A short write is a failure; it is not retried.
    #[track_caller]
    pub fn write(&mut self, data: &[u8]) -> Result<(), IoFailure> {
        let location = Location::caller();
        let socket = &mut self.socket;
        let written = guarded("write", location, || socket.write(data))?;

        if written != data.len() {
            return Err(IoFailure::new(
                "write",
                io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {} of {} bytes", written, data.len()),
                ),
                location,
            ));
        }
        Ok(())
    }

    /// Read up to `max` bytes
    ///
    /// Read-ahead bytes are returned first. An empty result means the peer
    /// closed the stream.
    #[track_caller]
    pub fn read(&mut self, max: usize) -> Result<Bytes, IoFailure> {
        let location = Location::caller();
        if max == 0 {
            return Ok(Bytes::new());
        }

        if self.buffer.is_empty() {
            fill(&mut self.socket, &mut self.buffer, max, "read", location)?;
        }

        let n = max.min(self.buffer.len());
        Ok(self.buffer.split_to(n).freeze())
    }

    /// Read the next line, terminator included
    ///
    /// `None` means the stream was closed before any byte arrived. A line cut
    /// short by end of stream is returned without its terminator, and so are
    /// the first `MAX_LINE_LEN` bytes of a line that runs past that length.
    #[track_caller]
    pub fn read_line(&mut self) -> Result<Option<Bytes>, IoFailure> {
        let location = Location::caller();
        let mut scanned = 0;

        loop {
            if let Some(i) = self.buffer[scanned..].iter().position(|&b| b == b'\n') {
                return Ok(Some(self.buffer.split_to(scanned + i + 1).freeze()));
            }
            scanned = self.buffer.len();
            if scanned >= MAX_LINE_LEN {
                return Ok(Some(self.buffer.split_to(MAX_LINE_LEN).freeze()));
            }

            let n = fill(
                &mut self.socket,
                &mut self.buffer,
                READ_CHUNK_SIZE,
                "read_line",
                location,
            )?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.buffer.split().freeze()));
            }
        }
    }

    #[track_caller]
    pub fn flush(&mut self) -> Result<(), IoFailure> {
        let socket = &mut self.socket;
        guarded("flush", Location::caller(), || socket.flush())
    }

    #[track_caller]
    pub fn close(&mut self) -> Result<(), IoFailure> {
        self.buffer.clear();
        let socket = &mut self.socket;
        guarded("close", Location::caller(), || socket.close())
    }

    /// Apply the read/write deadline
    #[track_caller]
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), IoFailure> {
        let socket = &self.socket;
        guarded("set_timeout", Location::caller(), || socket.set_timeout(timeout))
    }

    /// Current stream position; nonzero once anyone has used the stream
    #[track_caller]
    pub fn tell(&self) -> Result<u64, IoFailure> {
        let socket = &self.socket;
        guarded("tell", Location::caller(), || socket.position())
    }

    #[track_caller]
    pub fn set_option(&self, option: SocketOption) -> Result<(), IoFailure> {
        let socket = &self.socket;
        guarded("set_option", Location::caller(), || socket.set_option(option))
    }
}

/// Append at most `max` freshly read bytes to `buffer`
fn fill<S: Read>(
    socket: &mut S,
    buffer: &mut BytesMut,
    max: usize,
    operation: &'static str,
    location: &'static Location<'static>,
) -> Result<usize, IoFailure> {
    let start = buffer.len();
    buffer.resize(start + max, 0);

    let result = guarded(operation, location, || socket.read(&mut buffer[start..]));
    match result {
        Ok(n) => {
            buffer.truncate(start + n);
            Ok(n)
        }
        Err(e) => {
            buffer.truncate(start);
            Err(e)
        }
    }
}

/// Run one primitive inside the error scope
fn guarded<T>(
    operation: &'static str,
    location: &'static Location<'static>,
    mut primitive: impl FnMut() -> io::Result<T>,
) -> Result<T, IoFailure> {
    let _scope = tracing::trace_span!("io", operation).entered();

    loop {
        match primitive() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result.map_err(|e| IoFailure::new(operation, e, location)),
        }
    }
}
