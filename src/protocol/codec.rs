//! Protocol codec
//!
//! Encoding of commands and streaming decoding of replies.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! *<argc>\r\n
//! $<len>\r\n<name>\r\n
//! $<len>\r\n<arg 1>\r\n
//! ...
//! ```
//! `<len>` is a byte count and never includes the terminator.
//!
//! ### Reply Format
//! ```text
//! +<text>\r\n                  status
//! -<text>\r\n                  server error
//! :<digits>\r\n                integer
//! $<len>\r\n<bytes>\r\n        bulk      ($-1\r\n is nil)
//! *<count>\r\n<replies...>     array     (*-1\r\n is nil)
//! ```

use bytes::BytesMut;

use super::{Command, Reply, ReplyArray};
use crate::error::{RespError, Result};
use crate::network::{Io, Socket, MAX_LINE_LEN, READ_CHUNK_SIZE};

/// Line terminator
pub const CRLF: &[u8] = b"\r\n";

/// Largest bulk payload accepted from a server (512 MB)
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Cap on up-front allocation driven by a declared length or count
const MAX_PREALLOC: usize = 64 * 1024;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a command as an array of bulk strings
pub fn encode_command(command: &Command) -> Vec<u8> {
    let payload: usize = command.arguments().iter().map(|a| a.len() + 16).sum();
    let mut buf = Vec::with_capacity(16 + command.name().len() + 16 + payload);

    put_header(&mut buf, b'*', command.argc() as i64);
    put_bulk(&mut buf, command.name().as_bytes());
    for arg in command.arguments() {
        put_bulk(&mut buf, arg);
    }

    buf
}

/// Encode a reply frame
///
/// Used to script peers; the client itself only decodes replies.
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    let mut buf = Vec::new();
    put_reply(&mut buf, reply);
    buf
}

fn put_reply(buf: &mut Vec<u8>, reply: &Reply) {
    match reply {
        Reply::Status(s) => put_line(buf, b'+', s.as_bytes()),
        Reply::Integer(i) => put_header(buf, b':', *i),
        Reply::Numeric(s) => put_line(buf, b':', s.as_bytes()),
        Reply::Bulk(b) => put_bulk(buf, b),
        Reply::Nil => put_header(buf, b'$', -1),
        Reply::Array(items) => {
            put_header(buf, b'*', items.len() as i64);
            for item in items {
                put_reply(buf, item);
            }
        }
    }
}

fn put_line(buf: &mut Vec<u8>, tag: u8, text: &[u8]) {
    buf.push(tag);
    buf.extend_from_slice(text);
    buf.extend_from_slice(CRLF);
}

fn put_header(buf: &mut Vec<u8>, tag: u8, n: i64) {
    put_line(buf, tag, n.to_string().as_bytes());
}

fn put_bulk(buf: &mut Vec<u8>, data: &[u8]) {
    put_header(buf, b'$', data.len() as i64);
    buf.extend_from_slice(data);
    buf.extend_from_slice(CRLF);
}

// =============================================================================
// Decoding
// =============================================================================

/// Encode `command`, write it and flush
pub fn write_command<S: Socket>(io: &mut Io<S>, command: &Command) -> Result<()> {
    let bytes = encode_command(command);
    io.write(&bytes)?;
    io.flush()?;
    Ok(())
}

/// Read exactly one reply from the stream
///
/// Arrays are decoded recursively. A server error frame is returned as
/// `Err(RespError::Server)`.
pub fn decode_reply<S: Socket>(io: &mut Io<S>) -> Result<Reply> {
    let line = io.read_line()?.ok_or_else(|| {
        RespError::Protocol("connection closed while waiting for a reply".to_string())
    })?;

    if line.len() <= CRLF.len() {
        return Err(RespError::Protocol("empty line where a reply was expected".to_string()));
    }
    if line.len() >= MAX_LINE_LEN && !line.ends_with(b"\n") {
        return Err(RespError::Protocol(format!(
            "reply line exceeds maximum {} bytes",
            MAX_LINE_LEN
        )));
    }
    if !line.ends_with(CRLF) {
        return Err(RespError::Protocol(format!(
            "reply line not terminated by CRLF ({} bytes)",
            line.len()
        )));
    }

    let tag = line[0];
    let payload = &line[1..line.len() - CRLF.len()];

    match tag {
        b'+' => Ok(Reply::Status(text(payload, "status")?)),
        b'-' => Err(RespError::Server(String::from_utf8_lossy(payload).into_owned())),
        b':' => decode_integer(payload),
        b'$' => decode_bulk(io, payload),
        b'*' => decode_array(io, payload),
        other => Err(RespError::Protocol(format!(
            "unknown reply type: {:?}",
            other as char
        ))),
    }
}

/// Integer if the text survives an i64 round trip, otherwise the text itself
fn decode_integer(payload: &[u8]) -> Result<Reply> {
    let text = text(payload, "integer")?;
    match text.parse::<i64>() {
        Ok(i) if i.to_string() == text => Ok(Reply::Integer(i)),
        _ => Ok(Reply::Numeric(text)),
    }
}

fn decode_bulk<S: Socket>(io: &mut Io<S>, payload: &[u8]) -> Result<Reply> {
    let Some(len) = parse_length(payload, "bulk length")? else {
        return Ok(Reply::Nil);
    };
    if len > MAX_BULK_LEN {
        return Err(RespError::Protocol(format!(
            "bulk length {} exceeds maximum {}",
            len, MAX_BULK_LEN
        )));
    }

    let total = len + CRLF.len();
    let mut remaining = total;
    let mut bulk = BytesMut::with_capacity(total.min(MAX_PREALLOC));

    while remaining > 0 {
        let chunk = io.read(remaining.min(READ_CHUNK_SIZE))?;
        if chunk.is_empty() {
            return Err(RespError::Protocol(format!(
                "connection closed with {} of {} bulk bytes unread",
                remaining, total
            )));
        }
        remaining -= chunk.len();
        bulk.extend_from_slice(&chunk);
    }

    if !bulk.ends_with(CRLF) {
        return Err(RespError::Protocol(
            "bulk payload not terminated by CRLF".to_string(),
        ));
    }
    bulk.truncate(len);

    Ok(Reply::Bulk(bulk.freeze()))
}

fn decode_array<S: Socket>(io: &mut Io<S>, payload: &[u8]) -> Result<Reply> {
    let Some(count) = parse_length(payload, "array count")? else {
        return Ok(Reply::Nil);
    };

    let mut items = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        items.push(decode_reply(io)?);
    }

    Ok(Reply::Array(ReplyArray::new(items)))
}

/// Parse a length or count field; `-1` means nil
fn parse_length(payload: &[u8], what: &str) -> Result<Option<usize>> {
    let text = text(payload, what)?;
    let n: i64 = text
        .parse()
        .map_err(|_| RespError::Protocol(format!("invalid {}: {:?}", what, text)))?;

    match n {
        -1 => Ok(None),
        n if n < 0 => Err(RespError::Protocol(format!("negative {}: {}", what, n))),
        n => usize::try_from(n)
            .map(Some)
            .map_err(|_| RespError::Protocol(format!("{} out of range: {}", what, n))),
    }
}

fn text(payload: &[u8], what: &str) -> Result<String> {
    String::from_utf8(payload.to_vec())
        .map_err(|_| RespError::Protocol(format!("{} payload is not valid UTF-8", what)))
}
