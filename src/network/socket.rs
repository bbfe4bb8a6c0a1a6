//! Socket abstraction
//!
//! The raw byte-stream primitives a connection is built on, plus the TCP
//! implementation.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::Endpoint;

/// Socket-level options a connection may tune
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketOption {
    /// TCP_NODELAY: disable send coalescing
    NoDelay(bool),

    /// IP_TTL
    Ttl(u32),
}

/// A blocking byte stream usable by a connection
pub trait Socket: Read + Write + Send {
    /// Apply the read and write deadline
    fn set_timeout(&self, timeout: Duration) -> io::Result<()>;

    /// Apply a socket option
    fn set_option(&self, option: SocketOption) -> io::Result<()>;

    /// Bytes moved through the stream so far, by this holder or earlier ones
    fn position(&self) -> io::Result<u64>;

    /// Shut the stream down
    fn close(&mut self) -> io::Result<()>;
}

/// TCP stream that counts the bytes moved through it
#[derive(Debug)]
pub struct TcpSocket {
    stream: TcpStream,
    position: u64,
}

impl TcpSocket {
    /// Connect to an endpoint, trying each resolved address in turn
    pub fn connect(endpoint: &Endpoint, timeout: Duration) -> io::Result<Self> {
        let addrs = (endpoint.host.as_str(), endpoint.port).to_socket_addrs()?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(Self::from_stream(stream)),
                Err(e) => {
                    tracing::trace!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses resolved for {}", endpoint),
            )
        }))
    }

    /// Wrap an already connected stream with a fresh counter
    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream, position: 0 }
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    fn advance(&mut self, n: usize) {
        self.position += n as u64;
    }
}

impl Read for TcpSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.stream.read(buf)?;
        self.advance(n);
        Ok(n)
    }
}

impl Write for TcpSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.stream.write(buf)?;
        self.advance(n);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Socket for TcpSocket {
    fn set_timeout(&self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))
    }

    fn set_option(&self, option: SocketOption) -> io::Result<()> {
        match option {
            SocketOption::NoDelay(on) => self.stream.set_nodelay(on),
            SocketOption::Ttl(ttl) => self.stream.set_ttl(ttl),
        }
    }

    fn position(&self) -> io::Result<u64> {
        Ok(self.position)
    }

    fn close(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            // Peer already gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}
