//! Reply definitions
//!
//! Represents decoded server replies.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;
use std::slice;
use std::sync::OnceLock;

use bytes::Bytes;

use crate::error::{RespError, Result};

/// A decoded reply
///
/// Error frames never show up here; they are returned as
/// [`RespError::Server`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `+OK`, `+PONG`, ...
    Status(String),

    /// `:` reply that fits in an i64
    Integer(i64),

    /// `:` reply kept as text because it does not round-trip through i64
    Numeric(String),

    /// `$` reply
    Bulk(Bytes),

    /// `*` reply
    Array(ReplyArray),

    /// `$-1` or `*-1`
    Nil,
}

impl Reply {
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// True for a status reply with exactly this text
    pub fn is_status(&self, text: &str) -> bool {
        matches!(self, Reply::Status(s) if s == text)
    }

    /// Raw bytes of a textual reply (status, numeric or bulk)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Reply::Status(s) | Reply::Numeric(s) => Some(s.as_bytes()),
            Reply::Bulk(b) => Some(b),
            _ => None,
        }
    }

    /// Textual reply as UTF-8, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reply::Status(s) | Reply::Numeric(s) => Some(s),
            Reply::Bulk(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ReplyArray> {
        match self {
            Reply::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<ReplyArray> {
        match self {
            Reply::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Bytes used when this reply is a key of a keyed view
    fn key_bytes(&self) -> Result<Bytes> {
        match self {
            Reply::Status(s) | Reply::Numeric(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            Reply::Integer(i) => Ok(Bytes::from(i.to_string())),
            Reply::Bulk(b) => Ok(b.clone()),
            // Would collide with a real empty key
            Reply::Nil => Err(RespError::Logic("nil cannot be used as a key".to_string())),
            Reply::Array(_) => Err(RespError::Logic(
                "array element cannot be used as a key".to_string(),
            )),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) | Reply::Numeric(s) => f.write_str(s),
            Reply::Integer(i) => write!(f, "{}", i),
            Reply::Bulk(b) => f.write_str(&String::from_utf8_lossy(b)),
            Reply::Array(a) => {
                f.write_str("[")?;
                for (i, item) in a.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Reply::Nil => f.write_str("(nil)"),
        }
    }
}

/// Read-only view over a decoded array reply
///
/// Positional access works on the list as received. `as_map` reads the same
/// list as alternating key/value pairs; the index is built on first use and
/// kept for the lifetime of the array.
#[derive(Debug, Clone, Default)]
pub struct ReplyArray {
    items: Vec<Reply>,

    /// key bytes -> position of the value in `items`
    index: OnceLock<HashMap<Bytes, usize>>,
}

impl ReplyArray {
    pub fn new(items: Vec<Reply>) -> Self {
        Self {
            items,
            index: OnceLock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Reply> {
        self.items.get(position)
    }

    pub fn iter(&self) -> slice::Iter<'_, Reply> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Reply] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Reply> {
        self.items
    }

    /// Keyed view of the list as alternating key/value pairs
    ///
    /// Fails with a logic error if the list has odd length or a key is an
    /// array or nil. Integer and status keys are looked up by their text.
    /// When a key repeats, the last value wins.
    pub fn as_map(&self) -> Result<KeyedView<'_>> {
        if let Some(index) = self.index.get() {
            return Ok(KeyedView { array: self, index });
        }

        if self.items.len() % 2 != 0 {
            return Err(RespError::Logic(format!(
                "array of length {} cannot be read as key/value pairs",
                self.items.len()
            )));
        }

        let mut index = HashMap::with_capacity(self.items.len() / 2);
        for (i, pair) in self.items.chunks_exact(2).enumerate() {
            index.insert(pair[0].key_bytes()?, i * 2 + 1);
        }

        let index = self.index.get_or_init(|| index);
        Ok(KeyedView { array: self, index })
    }

    /// Value stored under `key` in the keyed view
    pub fn get_key(&self, key: impl AsRef<[u8]>) -> Result<Option<&Reply>> {
        Ok(self.as_map()?.get(key))
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        Ok(self.as_map()?.contains_key(key))
    }
}

impl PartialEq for ReplyArray {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl From<Vec<Reply>> for ReplyArray {
    fn from(items: Vec<Reply>) -> Self {
        Self::new(items)
    }
}

impl Index<usize> for ReplyArray {
    type Output = Reply;

    fn index(&self, position: usize) -> &Reply {
        &self.items[position]
    }
}

impl<'a> IntoIterator for &'a ReplyArray {
    type Item = &'a Reply;
    type IntoIter = slice::Iter<'a, Reply>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for ReplyArray {
    type Item = Reply;
    type IntoIter = std::vec::IntoIter<Reply>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Key/value reading of a [`ReplyArray`], borrowing its storage
#[derive(Debug, Clone, Copy)]
pub struct KeyedView<'a> {
    array: &'a ReplyArray,
    index: &'a HashMap<Bytes, usize>,
}

impl<'a> KeyedView<'a> {
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&'a Reply> {
        self.index
            .get(key.as_ref())
            .map(|&position| &self.array.items[position])
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.index.contains_key(key.as_ref())
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Pairs in list order, skipping entries shadowed by a later duplicate key
    pub fn iter(&self) -> impl Iterator<Item = (&'a Reply, &'a Reply)> + 'a {
        let index = self.index;
        self.array
            .items
            .chunks_exact(2)
            .enumerate()
            .filter(move |(i, pair)| {
                pair[0]
                    .key_bytes()
                    .ok()
                    .and_then(|key| index.get(&key).copied())
                    == Some(i * 2 + 1)
            })
            .map(|(_, pair)| (&pair[0], &pair[1]))
    }
}
