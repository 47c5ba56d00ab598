//! Error types for store operations.

use record::RecordError;
use std::io;
use thiserror::Error;

/// Result type alias using [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors a store operation can return.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key has no live record. Structural absence, never a fault.
    #[error("key not found")]
    KeyNotFound,

    /// A CRC mismatch, a key that does not match its recorded offset, or
    /// declared sizes inconsistent with the segment. Fatal for the current
    /// operation; recovery refuses to open a directory containing one.
    #[error("data corruption: {0}")]
    Corruption(String),

    /// A boundary violation by the caller, e.g. an empty key or a value
    /// whose length equals the tombstone sentinel.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An underlying filesystem failure, propagated verbatim.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A broken internal contract, e.g. the key dir pointing at a segment
    /// that no longer exists. Signals a bug, not user error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RecordError> for StoreError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Io(e) => StoreError::Io(e),
            RecordError::Corrupt => StoreError::Corruption("crc mismatch".into()),
        }
    }
}
