//! Network Module
//!
//! Sockets and client connections.
//!
//! ## Architecture
//! - `Socket`: raw blocking byte-stream primitives
//! - `Io`: error-converting, buffered wrapper over a socket
//! - `KeepAlive`: idle sockets, checked out by one persistent connection at a time
//! - `Connection`: one synchronous request/reply exchange at a time

mod socket;
mod io;
mod keepalive;
mod connection;

pub use socket::{Socket, SocketOption, TcpSocket};
pub use io::{Io, MAX_LINE_LEN, READ_CHUNK_SIZE};
pub use keepalive::{KeepAlive, TcpKeepAlive};
pub use connection::{Connection, ConnectionState};
