//! Error types for AtlasRESP
//!
//! Provides a unified error type for all client operations.

use std::fmt;
use std::io;
use std::panic::Location;

use thiserror::Error;

/// Result type alias using RespError
pub type Result<T> = std::result::Result<T, RespError>;

/// Unified error type for AtlasRESP operations
#[derive(Debug, Error)]
pub enum RespError {
    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    /// The socket could not be established or reestablished
    #[error("Connection to {endpoint} failed: {message}")]
    Connection {
        endpoint: String,
        message: String,
        /// OS error code, when the platform reported one
        code: Option<i32>,
        /// Probe failure that triggered a reconnect, if any
        #[source]
        source: Option<Box<RespError>>,
    },

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Io(#[from] IoFailure),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error frame sent by the server; message is kept verbatim
    #[error("{0}")]
    Server(String),

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Logic error: {0}")]
    Logic(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RespError {
    /// Build a connection error from the OS error returned by connect
    pub(crate) fn connection(endpoint: impl fmt::Display, err: &io::Error) -> Self {
        RespError::Connection {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
            code: err.raw_os_error(),
            source: None,
        }
    }

    /// True if the server itself reported the failure
    pub fn is_server_error(&self) -> bool {
        matches!(self, RespError::Server(_))
    }

    /// True if the failure desynchronizes the protocol stream
    pub fn is_fatal_to_stream(&self) -> bool {
        matches!(self, RespError::Io(_) | RespError::Protocol(_))
    }
}

/// How bad an I/O failure is for the connection it happened on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A read or write deadline expired
    Timeout,

    /// The peer went away (reset, aborted, broken pipe, EOF)
    Disconnect,

    /// Anything else
    Fatal,
}

impl Severity {
    fn of(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Severity::Timeout,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => Severity::Disconnect,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Timeout => "timeout",
            Severity::Disconnect => "disconnect",
            Severity::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// A failed socket primitive, with everything the OS told us about it
#[derive(Debug, Error)]
#[error("I/O error during {operation} ({severity}) at {location}: {message}")]
pub struct IoFailure {
    /// Name of the primitive that failed (`write`, `read_line`, ...)
    pub operation: &'static str,
    pub kind: io::ErrorKind,
    pub severity: Severity,
    /// Original diagnostic text
    pub message: String,
    /// Call site that issued the primitive
    pub location: &'static Location<'static>,
    #[source]
    pub source: io::Error,
}

impl IoFailure {
    pub(crate) fn new(
        operation: &'static str,
        source: io::Error,
        location: &'static Location<'static>,
    ) -> Self {
        let kind = source.kind();
        Self {
            operation,
            kind,
            severity: Severity::of(kind),
            message: source.to_string(),
            location,
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.severity == Severity::Timeout
    }
}
