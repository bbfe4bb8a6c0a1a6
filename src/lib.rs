//! # AtlasRESP
//!
//! A synchronous client for RESP key-value servers with:
//! - Streaming decoding of nested, mixed-type replies
//! - Typed I/O failures that keep every OS diagnostic
//! - Transient connections that own their socket
//! - Persistent connections that check out a kept-alive socket, revalidate
//!   it and hand it back
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Connection::call                           │
//! │        (transient | persistent, one exchange at a time)      │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │ encode_command                │ decode_reply
//!                ▼                               ▼
//!         ┌─────────────┐                 ┌─────────────┐
//!         │   Command   │                 │    Reply    │
//!         │  (builder)  │                 │ ReplyArray  │
//!         └──────┬──────┘                 └──────▲──────┘
//!                │                               │
//!                ▼                               │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Io (error boundary)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │  TcpSocket  │◄─────────│ TcpKeepAlive │
//!   │             │          │ (idle pool)  │
//!   └─────────────┘          └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{IoFailure, RespError, Result, Severity};
pub use config::{Config, ConnectionMode, Endpoint};
pub use network::{Connection, ConnectionState};
pub use protocol::{Command, Reply, ReplyArray};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasRESP
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
