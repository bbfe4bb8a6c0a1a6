//! Connection Tests
//!
//! Tests verify:
//! - call writes one frame and reads one reply
//! - Server errors surface as failures without faulting the connection
//! - I/O and protocol failures fault the connection
//! - Transient teardown closes, persistent teardown hands the socket back
//! - Faulted or out-of-sync persistent sockets are never handed back
//! - Persistent reuse probing and the single reconnect

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::time::Duration;

use atlasresp::config::{ConnectionMode, Endpoint};
use atlasresp::network::SocketOption;
use atlasresp::{Command, Connection, ConnectionState, Reply, RespError};
use bytes::Bytes;
use common::{count_frames, scripted_connection, ScriptedKeepAlive, ScriptedSocket};

const PING_FRAME: &[u8] = b"*1\r\n$4\r\nPING\r\n";

fn endpoint() -> Endpoint {
    Endpoint::new("127.0.0.1", 6379)
}

fn timeout() -> Duration {
    Duration::from_millis(250)
}

// =============================================================================
// Call Tests
// =============================================================================

#[test]
fn test_call_round_trip() {
    let (mut conn, socket) = scripted_connection(b"$5\r\nworld\r\n");

    let reply = conn.call(&Command::new("get").arg("hello")).unwrap();

    assert_eq!(reply, Reply::Bulk(Bytes::from_static(b"world")));
    assert_eq!(socket.written(), b"*2\r\n$3\r\nGET\r\n$5\r\nhello\r\n".to_vec());
    assert_eq!(socket.state.lock().flushes, 1);
    assert_eq!(conn.state(), ConnectionState::Ready);
}

#[test]
fn test_command_shorthand() {
    let (mut conn, socket) = scripted_connection(b":3\r\n");

    let reply = conn.command("rpush", ["list", "a", "b"]).unwrap();

    assert_eq!(reply, Reply::Integer(3));
    assert!(socket.written().starts_with(b"*4\r\n$5\r\nRPUSH\r\n"));
}

#[test]
fn test_sequential_calls() {
    let (mut conn, socket) = scripted_connection(b"+OK\r\n$1\r\nv\r\n");

    assert!(conn.call(&Command::new("set").arg("k").arg("v")).unwrap().is_status("OK"));
    assert_eq!(
        conn.call(&Command::new("get").arg("k")).unwrap().as_str(),
        Some("v")
    );
    assert_eq!(count_frames(&socket.written(), b"$3\r\nSET\r\n"), 1);
    assert_eq!(count_frames(&socket.written(), b"$3\r\nGET\r\n"), 1);
}

#[test]
fn test_server_error_surfaces_and_connection_stays_ready() {
    let (mut conn, _socket) = scripted_connection(b"-ERR wrong number of arguments\r\n+PONG\r\n");

    let err = conn.call(&Command::new("get")).unwrap_err();
    assert!(err.is_server_error());
    assert_eq!(err.to_string(), "ERR wrong number of arguments");
    assert_eq!(conn.state(), ConnectionState::Ready);

    assert!(conn.call(&Command::new("ping")).unwrap().is_status("PONG"));
}

#[test]
fn test_protocol_failure_faults_connection() {
    let (mut conn, _socket) = scripted_connection(b"?bogus\r\n");

    let err = conn.call(&Command::new("ping")).unwrap_err();
    assert!(matches!(err, RespError::Protocol(_)));
    assert_eq!(conn.state(), ConnectionState::Faulted);

    let err = conn.call(&Command::new("ping")).unwrap_err();
    assert!(matches!(err, RespError::Logic(ref m) if m.contains("faulted")));
}

#[test]
fn test_io_failure_faults_connection() {
    let (mut conn, socket) = scripted_connection(b"");
    socket.state.lock().read_error = Some(std::io::ErrorKind::TimedOut);

    match conn.call(&Command::new("ping")) {
        Err(RespError::Io(failure)) => assert!(failure.is_timeout()),
        other => panic!("Expected I/O error, got {:?}", other),
    }
    assert_eq!(conn.state(), ConnectionState::Faulted);
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_from_socket_applies_timeout_and_nodelay() {
    let (conn, socket) = scripted_connection(b"");

    assert_eq!(socket.timeout(), Some(Duration::from_secs(1)));
    assert_eq!(socket.state.lock().options, vec![SocketOption::NoDelay(true)]);
    assert_eq!(conn.mode(), ConnectionMode::Transient);
    assert!(!conn.is_persistent());
}

#[test]
fn test_nodelay_failure_is_not_fatal() {
    let socket = ScriptedSocket::new();
    socket.state.lock().reject_options = true;

    let conn = Connection::from_socket(socket.clone(), endpoint(), timeout()).unwrap();

    assert_eq!(conn.state(), ConnectionState::Ready);
    assert_eq!(socket.timeout(), Some(timeout()));
}

#[test]
fn test_set_timeout() {
    let (mut conn, socket) = scripted_connection(b"");

    conn.set_timeout(Duration::from_millis(2500)).unwrap();
    assert_eq!(socket.timeout(), Some(Duration::from_millis(2500)));
    assert_eq!(conn.timeout(), Duration::from_millis(2500));

    let err = conn.set_timeout(Duration::ZERO).unwrap_err();
    assert!(matches!(err, RespError::Io(ref f) if f.operation == "set_timeout"));
    assert_eq!(conn.timeout(), Duration::from_millis(2500));
}

// =============================================================================
// Teardown Tests
// =============================================================================

#[test]
fn test_transient_drop_closes_socket() {
    let (conn, socket) = scripted_connection(b"");
    assert!(!socket.is_closed());

    drop(conn);
    assert!(socket.is_closed());
}

#[test]
fn test_transient_close_closes_socket() {
    let (conn, socket) = scripted_connection(b"");

    conn.close().unwrap();
    assert!(socket.is_closed());
}

#[test]
fn test_persistent_drop_leaves_socket_open() {
    let socket = ScriptedSocket::new();
    let channel = ScriptedKeepAlive::new(vec![socket.clone()]);

    let conn = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap();
    assert!(conn.is_persistent());
    drop(conn);

    assert!(!socket.is_closed());
    assert_eq!(channel.released(), 1);
    assert_eq!(channel.discarded(), 0);
}

#[test]
fn test_persistent_close_leaves_socket_open() {
    let socket = ScriptedSocket::new();
    let channel = ScriptedKeepAlive::new(vec![socket.clone()]);

    let conn = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap();
    conn.close().unwrap();

    assert!(!socket.is_closed());
    assert_eq!(channel.released(), 1);
}

#[test]
fn test_persistent_timeout_is_not_handed_back() {
    let socket = ScriptedSocket::new();
    let channel = ScriptedKeepAlive::new(vec![socket.clone()]);

    let mut conn = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap();
    socket.state.lock().read_error = Some(std::io::ErrorKind::TimedOut);

    // The PONG for this PING may still arrive later on the same stream
    match conn.call(&Command::new("ping")) {
        Err(RespError::Io(failure)) => assert!(failure.is_timeout()),
        other => panic!("Expected timeout, got {:?}", other),
    }
    assert_eq!(conn.state(), ConnectionState::Faulted);
    drop(conn);

    assert_eq!(channel.released(), 0);
    assert!(socket.is_closed());

    // Nothing left for the next holder to inherit
    let err = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap_err();
    assert!(matches!(err, RespError::Connection { .. }));
}

#[test]
fn test_persistent_protocol_fault_is_not_handed_back() {
    let socket = ScriptedSocket::with_reply(b"?bogus\r\n");
    let channel = ScriptedKeepAlive::new(vec![socket.clone()]);

    let mut conn = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap();
    assert!(matches!(conn.call(&Command::new("ping")), Err(RespError::Protocol(_))));
    conn.close().unwrap();

    assert_eq!(channel.released(), 0);
    assert!(socket.is_closed());
}

#[test]
fn test_persistent_unread_bytes_are_not_handed_back() {
    // A second reply nobody asked for
    let socket = ScriptedSocket::with_reply(b"+OK\r\n+LATE\r\n");
    let channel = ScriptedKeepAlive::new(vec![socket.clone()]);

    let mut conn = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap();
    assert!(conn.call(&Command::new("set").arg("k").arg("v")).unwrap().is_status("OK"));
    assert_eq!(conn.state(), ConnectionState::Ready);
    conn.close().unwrap();

    assert_eq!(channel.released(), 0);
    assert!(socket.is_closed());
}

#[test]
fn test_persistent_close_hands_back_configured_socket() {
    let socket = ScriptedSocket::new();
    let channel = ScriptedKeepAlive::new(vec![socket]);

    let conn = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap();
    assert!(conn.socket().is_some());
    conn.close().unwrap();

    // The released handle is the one the connection held
    let released = channel.released.lock();
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].timeout(), Some(timeout()));
}

// =============================================================================
// Persistent Reuse Tests
// =============================================================================

#[test]
fn test_persistent_fresh_handle_is_not_probed() {
    let socket = ScriptedSocket::new();
    let channel = ScriptedKeepAlive::new(vec![socket.clone()]);

    let conn = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap();

    assert!(!conn.is_reused());
    assert!(socket.written().is_empty());
    assert_eq!(socket.timeout(), Some(timeout()));
    assert_eq!(channel.acquired(), 1);
}

#[test]
fn test_persistent_reused_handle_passes_probe() {
    let socket = ScriptedSocket::with_reply(b"+PONG\r\n").used(100);
    let channel = ScriptedKeepAlive::new(vec![socket.clone()]);

    let conn = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap();

    assert!(conn.is_reused());
    assert_eq!(conn.state(), ConnectionState::Ready);
    assert_eq!(socket.written(), PING_FRAME.to_vec());
    assert_eq!(socket.timeout(), Some(timeout()));
    assert_eq!(channel.acquired(), 1);
    assert_eq!(channel.discarded(), 0);
}

#[test]
fn test_persistent_stale_handle_reconnects_once() {
    // Stale handle: the peer is gone, reads hit end of stream
    let stale = ScriptedSocket::new().used(512);
    let fresh = ScriptedSocket::with_reply(b"+OK\r\n");
    let channel = ScriptedKeepAlive::new(vec![stale.clone(), fresh.clone()]);

    let mut conn = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap();

    // Exactly one probe on the stale handle, which was then discarded and closed
    assert_eq!(count_frames(&stale.written(), PING_FRAME), 1);
    assert!(stale.is_closed());
    assert_eq!(channel.discarded(), 1);
    assert_eq!(channel.acquired(), 2);

    // The fresh handle is used directly, without a probe
    assert!(!conn.is_reused());
    assert!(fresh.written().is_empty());
    assert_eq!(fresh.timeout(), Some(timeout()));

    assert!(conn.call(&Command::new("set").arg("a").arg("b")).unwrap().is_status("OK"));
    drop(conn);
    assert!(!fresh.is_closed());
    assert_eq!(channel.released(), 1);
}

#[test]
fn test_persistent_wrong_probe_reply_reconnects() {
    let stale = ScriptedSocket::with_reply(b"$4\r\nPONG\r\n").used(1);
    let fresh = ScriptedSocket::new();
    let channel = ScriptedKeepAlive::new(vec![stale.clone(), fresh]);

    let conn = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap();

    assert!(!conn.is_reused());
    assert!(stale.is_closed());
    assert_eq!(channel.acquired(), 2);
    drop(conn);

    // Only the fresh handle goes back
    assert_eq!(channel.released(), 1);
}

#[test]
fn test_persistent_server_error_probe_reconnects() {
    let stale = ScriptedSocket::with_reply(b"-LOADING dataset in memory\r\n").used(1);
    let fresh = ScriptedSocket::new();
    let channel = ScriptedKeepAlive::new(vec![stale, fresh]);

    let conn = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap();

    assert_eq!(conn.state(), ConnectionState::Ready);
    assert_eq!(channel.acquired(), 2);
}

#[test]
fn test_persistent_reconnect_failure_keeps_probe_cause() {
    let stale = ScriptedSocket::with_reply(b"!garbage\r\n").used(7);
    let channel = ScriptedKeepAlive::new(vec![stale.clone()]);

    let err = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap_err();

    match err {
        RespError::Connection {
            endpoint,
            message,
            code,
            source,
        } => {
            assert_eq!(endpoint, "127.0.0.1:6379");
            assert_eq!(message, "Connection refused");
            assert_eq!(code, Some(111));
            let cause = source.expect("probe failure as cause");
            assert!(matches!(*cause, RespError::Protocol(ref m) if m.contains("unknown reply type")));
        }
        other => panic!("Expected connection error, got {:?}", other),
    }

    // One probe, one reacquisition attempt, nothing more
    assert_eq!(count_frames(&stale.written(), PING_FRAME), 1);
    assert_eq!(channel.acquired(), 2);
    assert_eq!(channel.discarded(), 1);
}

#[test]
fn test_persistent_initial_acquire_failure() {
    let channel = ScriptedKeepAlive::new(vec![]);

    let err = Connection::persistent_with(Arc::clone(&channel), endpoint(), timeout()).unwrap_err();

    assert!(matches!(err, RespError::Connection { source: None, .. }));
    assert_eq!(channel.acquired(), 1);
}
