//! Error types for backing store operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested offset cannot be represented on this platform.
    #[error("offset {offset} is out of range for this store")]
    OffsetOutOfRange {
        /// The offending offset.
        offset: u64,
    },

    /// The store is closed.
    #[error("store is closed")]
    Closed,
}
