//! Converter contract between typed values and raw record payloads
//!
//! The core never interprets payload bytes itself; everything typed goes
//! through a [`Converter`]. The bundled [`JsonConverter`] covers the common
//! case, but any codec satisfying the contract plugs in.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Pluggable codec boundary between application values and payload bytes
pub trait Converter: Send + Sync + 'static {
    /// Encode a value to bytes. A failure here propagates before any file
    /// mutation is attempted.
    fn to_bytes<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode a value from bytes
    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON codec backed by serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl Converter for JsonConverter {
    fn to_bytes<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}
