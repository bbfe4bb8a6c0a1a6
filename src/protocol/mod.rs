//! Protocol Module
//!
//! Client side of the RESP wire protocol.
//!
//! ## Request Format
//! ```text
//! ┌──────────────┬──────────────────────┬─────┬──────────────────────┐
//! │ *<argc>\r\n  │ $<len>\r\n<name>\r\n │ ... │ $<len>\r\n<arg>\r\n  │
//! └──────────────┴──────────────────────┴─────┴──────────────────────┘
//! ```
//!
//! ## Reply Types
//! - `+`: status        -> `Reply::Status`
//! - `-`: server error  -> `RespError::Server`
//! - `:`: integer       -> `Reply::Integer` / `Reply::Numeric`
//! - `$`: bulk string   -> `Reply::Bulk` / `Reply::Nil`
//! - `*`: array         -> `Reply::Array` / `Reply::Nil`

mod command;
mod reply;
mod codec;

pub use command::{Command, IntoArg};
pub use reply::{KeyedView, Reply, ReplyArray};
pub use codec::{
    decode_reply, encode_command, encode_reply, write_command, CRLF, MAX_BULK_LEN,
};
