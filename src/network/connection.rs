//! Client Connection
//!
//! Owns one socket and runs synchronous request/reply exchanges over it.

use std::sync::Arc;
use std::time::Duration;

use super::io::Io;
use super::keepalive::{KeepAlive, TcpKeepAlive};
use super::socket::{Socket, SocketOption, TcpSocket};
use crate::config::{Config, ConnectionMode, Endpoint};
use crate::error::{RespError, Result};
use crate::protocol::{decode_reply, write_command, Command, IntoArg, Reply};

/// Where a connection is in its lifecycle
///
/// A `Connection` only exists once it is `Ready`; connecting happens inside
/// the constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Ready,

    /// An I/O or protocol failure left the stream out of sync
    Faulted,

    Closed,
}

/// A client connection to one server
///
/// One exchange at a time: `call` writes a command and blocks until its
/// reply has been read. Not safe for concurrent use without external
/// serialization.
#[derive(Debug)]
pub struct Connection<S: Socket = TcpSocket> {
    /// Taken out on teardown
    io: Option<Io<S>>,

    /// Persistent only: where the socket goes back on teardown
    channel: Option<Arc<dyn KeepAlive<Socket = S>>>,

    endpoint: Endpoint,

    mode: ConnectionMode,

    /// Persistent only: the handle had been used before we got it
    reused: bool,

    timeout: Duration,

    state: ConnectionState,
}

impl Connection<TcpSocket> {
    /// Open a transient connection that owns its socket
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let endpoint = Endpoint::new(host, port);
        tracing::debug!("Connecting to {}", endpoint);

        let socket = TcpSocket::connect(&endpoint, timeout)
            .map_err(|e| RespError::connection(&endpoint, &e))?;

        Self::from_socket(socket, endpoint, timeout)
    }

    /// Open a persistent connection through the process-wide keep-alive
    /// channel
    pub fn persistent(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        Self::persistent_with(TcpKeepAlive::global(), Endpoint::new(host, port), timeout)
    }

    /// Open a connection as described by `config`
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        match config.mode {
            ConnectionMode::Transient => Self::connect(&config.host, config.port, config.timeout),
            ConnectionMode::Persistent => {
                Self::persistent(&config.host, config.port, config.timeout)
            }
        }
    }
}

impl<S: Socket> Connection<S> {
    /// Build a transient connection over an already connected socket
    pub fn from_socket(socket: S, endpoint: Endpoint, timeout: Duration) -> Result<Self> {
        let mut conn = Self::new(socket, endpoint, None, timeout);
        conn.configure()?;
        Ok(conn)
    }

    /// Open a persistent connection through `channel`
    ///
    /// The handle is held exclusively until teardown hands it back. A handle
    /// someone has already used is probed with `PING` first. If the probe
    /// fails the handle is discarded and closed, and one fresh handle is
    /// acquired in its place.
    pub fn persistent_with<K>(channel: Arc<K>, endpoint: Endpoint, timeout: Duration) -> Result<Self>
    where
        K: KeepAlive<Socket = S> + 'static,
    {
        let channel: Arc<dyn KeepAlive<Socket = S>> = channel;

        let socket = channel.acquire(&endpoint, timeout)?;
        let mut conn = Self::new(socket, endpoint, Some(Arc::clone(&channel)), timeout);
        conn.reused = conn.io()?.tell()? > 0;

        if !conn.reused {
            tracing::debug!("Opened fresh persistent connection to {}", conn.endpoint);
            conn.configure()?;
            return Ok(conn);
        }

        let probe_err = match conn.probe() {
            Ok(()) => {
                tracing::debug!("Reusing persistent connection to {}", conn.endpoint);
                return Ok(conn);
            }
            Err(e) => e,
        };

        tracing::warn!(
            "Persistent connection to {} failed its probe: {}",
            conn.endpoint,
            probe_err
        );
        channel.discard(&conn.endpoint);
        conn.abandon();

        let endpoint = conn.endpoint.clone();
        let socket = channel
            .acquire(&endpoint, timeout)
            .map_err(|e| reconnect_failure(&endpoint, e, probe_err))?;
        tracing::info!("Reconnected persistent connection to {}", endpoint);

        let mut conn = Self::new(socket, endpoint, Some(channel), timeout);
        conn.configure()?;
        Ok(conn)
    }

    fn new(
        socket: S,
        endpoint: Endpoint,
        channel: Option<Arc<dyn KeepAlive<Socket = S>>>,
        timeout: Duration,
    ) -> Self {
        let mode = if channel.is_some() {
            ConnectionMode::Persistent
        } else {
            ConnectionMode::Transient
        };

        Self {
            io: Some(Io::new(socket)),
            channel,
            endpoint,
            mode,
            reused: false,
            timeout,
            state: ConnectionState::Ready,
        }
    }

    fn io(&mut self) -> Result<&mut Io<S>> {
        self.io.as_mut().ok_or_else(|| {
            RespError::Logic(format!("connection to {} is closed", self.endpoint))
        })
    }

    /// Socket tuning plus deadlines
    fn configure(&mut self) -> Result<()> {
        let timeout = self.timeout;
        let io = self.io()?;
        // Lower latency only; the connection works without it
        let nodelay = io.set_option(SocketOption::NoDelay(true));
        if let Err(e) = io.set_timeout(timeout) {
            // No deadline, no way to detect a hung peer
            self.state = ConnectionState::Faulted;
            return Err(e.into());
        }

        if let Err(e) = nodelay {
            tracing::debug!("TCP_NODELAY not applied on {}: {}", self.endpoint, e);
        }
        Ok(())
    }

    /// Liveness check for a reused handle
    fn probe(&mut self) -> Result<()> {
        self.configure()?;
        let reply = self.call(&Command::new("PING"))?;
        if reply.is_status("PONG") {
            Ok(())
        } else {
            Err(RespError::Protocol(format!(
                "unexpected reply to PING: {}",
                reply
            )))
        }
    }

    /// Send one command and read its reply
    pub fn call(&mut self, command: &Command) -> Result<Reply> {
        match self.state {
            ConnectionState::Ready => {}
            ConnectionState::Faulted => {
                return Err(RespError::Logic(format!(
                    "connection to {} is faulted",
                    self.endpoint
                )))
            }
            ConnectionState::Closed => {
                return Err(RespError::Logic(format!(
                    "connection to {} is closed",
                    self.endpoint
                )))
            }
        }

        tracing::trace!(
            "Sending {} with {} args to {}",
            command.name(),
            command.arguments().len(),
            self.endpoint
        );

        let io = self.io()?;
        let result = write_command(io, command).and_then(|()| decode_reply(io));
        if let Err(ref e) = result {
            if e.is_fatal_to_stream() {
                tracing::debug!("Connection to {} faulted: {}", self.endpoint, e);
                self.state = ConnectionState::Faulted;
            }
        }

        result
    }

    /// Shorthand for `call(&Command::new(name).args(args))`
    pub fn command<I>(&mut self, name: &str, args: I) -> Result<Reply>
    where
        I: IntoIterator,
        I::Item: IntoArg,
    {
        self.call(&Command::new(name).args(args))
    }

    /// Change the read/write deadline
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.io()?.set_timeout(timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    /// Tear down now, surfacing a close failure
    ///
    /// Persistent connections hand the open socket back to the keep-alive
    /// channel.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let Some(mut io) = self.io.take() else {
            return Ok(());
        };
        let faulted = self.state == ConnectionState::Faulted;
        self.state = ConnectionState::Closed;

        let Some(channel) = self.channel.take() else {
            tracing::debug!("Closing connection to {}", self.endpoint);
            io.close()?;
            return Ok(());
        };

        // Unread bytes mean a reply is still in flight or arrived unasked
        if faulted || io.buffered() > 0 {
            tracing::debug!(
                "Dropping out-of-sync persistent connection to {}",
                self.endpoint
            );
            io.close()?;
            return Ok(());
        }

        tracing::trace!("Releasing persistent connection to {}", self.endpoint);
        channel.release(&self.endpoint, io.into_inner());
        Ok(())
    }

    /// Close a handle that must not go back to the channel
    fn abandon(&mut self) {
        self.channel = None;
        self.state = ConnectionState::Closed;
        if let Some(mut io) = self.io.take() {
            if let Err(e) = io.close() {
                tracing::debug!("Closing stale handle to {} failed: {}", self.endpoint, e);
            }
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    pub fn is_persistent(&self) -> bool {
        self.mode == ConnectionMode::Persistent
    }

    /// True if this persistent connection took over an already used handle
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The underlying socket; `None` after teardown
    pub fn socket(&self) -> Option<&S> {
        self.io.as_ref().map(Io::get_ref)
    }
}

impl<S: Socket> Drop for Connection<S> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::debug!("Closing connection to {} failed: {}", self.endpoint, e);
        }
    }
}

/// Construction failure for a reconnect, caused by the failed probe
fn reconnect_failure(endpoint: &Endpoint, acquire_err: RespError, probe_err: RespError) -> RespError {
    let (message, code) = match acquire_err {
        RespError::Connection { message, code, .. } => (message, code),
        other => (other.to_string(), None),
    };

    RespError::Connection {
        endpoint: endpoint.to_string(),
        message,
        code,
        source: Some(Box::new(probe_err)),
    }
}
