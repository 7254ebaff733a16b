//! Error types for Spool

use thiserror::Error;

/// Result type alias for Spool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Spool error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data file corruption detected (malformed record header, failed shift)
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Converter failed to encode or decode a value
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Collection name is empty or contains a reserved character
    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),
}

impl Error {
    /// Check if the error indicates an unusable data file
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }
}
