//! Record and key primitives
//!
//! A record is the atomic storage unit: a key plus an opaque payload. The
//! on-disk image is `[key_len: u32 LE][data_len: u32 LE][key][data]`,
//! packed contiguously with no padding, checksum, or version tag.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Size of the two length prefixes preceding every record
pub const HEADER_LEN: u64 = 8;

/// A persisted key + payload pair
#[derive(Clone, PartialEq, Eq)]
pub struct Record {
    /// Record key; opaque bytes, unique across the file
    pub key: Vec<u8>,
    /// Record payload
    pub data: Vec<u8>,
}

impl Record {
    /// Create a new record
    pub fn new(key: impl Into<Vec<u8>>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
        }
    }

    /// Occupied span on disk: header plus both fields
    pub fn size(&self) -> usize {
        HEADER_LEN as usize + self.key.len() + self.data.len()
    }

    /// Serialize to the on-disk image
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size());
        buf.put_u32_le(self.key.len() as u32);
        buf.put_u32_le(self.data.len() as u32);
        buf.put_slice(&self.key);
        buf.put_slice(&self.data);
        buf.freeze()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("key", &String::from_utf8_lossy(&self.key))
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// An owned byte-sequence key with content equality and hashing.
///
/// Used as the index map key; equality and hash are defined over the byte
/// content, and prefix testing is independent of any map ordering.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key(Vec<u8>);

impl Key {
    /// Wrap raw key bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The key's byte content
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the key, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Whether this key's bytes begin with `prefix`
    pub fn has_prefix(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Debug for Key {
    // Keys are usually printable "<name>:<id>" strings; show them as such
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}
