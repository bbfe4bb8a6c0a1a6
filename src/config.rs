//! Configuration for AtlasRESP
//!
//! Centralized connection configuration with sensible defaults.

use std::fmt;
use std::time::Duration;

use crate::error::{RespError, Result};

/// Default server host (loopback)
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Well-known RESP server port
pub const DEFAULT_PORT: u16 = 6379;

/// Default connect and read/write deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Main configuration for a client connection
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Endpoint Configuration
    // -------------------------------------------------------------------------
    /// Server host name or IP address
    pub host: String,

    /// Server TCP port
    pub port: u16,

    // -------------------------------------------------------------------------
    // Socket Configuration
    // -------------------------------------------------------------------------
    /// Connect deadline, and the read/write deadline of every primitive
    pub timeout: Duration,

    /// Whether the socket is owned or borrowed from the keep-alive channel
    pub mode: ConnectionMode,
}

/// Connection lifecycle variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// Fresh socket, closed on teardown
    #[default]
    Transient,

    /// Socket borrowed from the keep-alive channel, never closed on teardown
    Persistent,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            mode: ConnectionMode::Transient,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The endpoint this config points at
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Reject settings no connection can be opened with
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(RespError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(RespError::Config("port must be non-zero".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(RespError::Config("timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the connect and read/write timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the timeout in (possibly fractional) seconds
    ///
    /// Negative, NaN and overflowing values leave the timeout at zero, which
    /// `Config::validate` rejects.
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.config.timeout = Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO);
        self
    }

    /// Set the connection mode
    pub fn mode(mut self, mode: ConnectionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Shorthand for `mode(ConnectionMode::Persistent)`
    pub fn persistent(self) -> Self {
        self.mode(ConnectionMode::Persistent)
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// host:port pair that keys the keep-alive channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
