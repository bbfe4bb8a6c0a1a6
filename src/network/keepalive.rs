//! Keep-alive channel
//!
//! Keeps idle sockets keyed by endpoint so that persistent connections opened
//! at different times reuse one server connection.
//!
//! A handle is checked out exclusively: while a connection holds it, no other
//! connection can acquire it. The holder hands it back on teardown.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;

use super::socket::{Socket, TcpSocket};
use crate::config::Endpoint;
use crate::error::{RespError, Result};

/// Source of reusable sockets
///
/// A handle returned by `acquire` reports a nonzero `position` once an
/// earlier holder has used it. Holders never close a healthy handle on
/// teardown; they `release` it. A holder that finds its handle broken closes
/// it, never releases it, and calls `discard`.
pub trait KeepAlive: Send + Sync + fmt::Debug {
    type Socket: Socket;

    /// Check out an idle socket for `endpoint`, connecting a fresh one if
    /// none is idle
    fn acquire(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Self::Socket>;

    /// Hand a healthy socket back for the next holder
    fn release(&self, endpoint: &Endpoint, socket: Self::Socket);

    /// Forget every idle socket for `endpoint`
    fn discard(&self, endpoint: &Endpoint);
}

/// Registry of idle TCP sockets
#[derive(Debug, Default)]
pub struct TcpKeepAlive {
    idle: Mutex<HashMap<Endpoint, Vec<TcpSocket>>>,
}

impl TcpKeepAlive {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every `Connection::persistent` in the process
    pub fn global() -> Arc<TcpKeepAlive> {
        static GLOBAL: OnceLock<Arc<TcpKeepAlive>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TcpKeepAlive::new())))
    }

    /// Number of idle sockets across all endpoints
    pub fn len(&self) -> usize {
        self.idle.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if an idle socket for `endpoint` is waiting to be reused
    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.idle
            .lock()
            .get(endpoint)
            .is_some_and(|sockets| !sockets.is_empty())
    }
}

impl KeepAlive for TcpKeepAlive {
    type Socket = TcpSocket;

    fn acquire(&self, endpoint: &Endpoint, timeout: Duration) -> Result<TcpSocket> {
        if let Some(socket) = self.idle.lock().get_mut(endpoint).and_then(Vec::pop) {
            return Ok(socket);
        }

        // Connect without holding the lock
        tracing::debug!("Opening keep-alive socket to {}", endpoint);
        TcpSocket::connect(endpoint, timeout).map_err(|e| RespError::connection(endpoint, &e))
    }

    fn release(&self, endpoint: &Endpoint, socket: TcpSocket) {
        self.idle
            .lock()
            .entry(endpoint.clone())
            .or_default()
            .push(socket);
    }

    fn discard(&self, endpoint: &Endpoint) {
        if let Some(sockets) = self.idle.lock().remove(endpoint) {
            tracing::debug!(
                "Discarded {} idle keep-alive sockets to {}",
                sockets.len(),
                endpoint
            );
        }
    }
}
