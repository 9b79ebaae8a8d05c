//! Error types for the page cache.

use crate::types::{PageNo, RegionId};
use std::io;
use thiserror::Error;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Broad classification of a [`PoolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something the pool cannot do as configured.
    Invalid,
    /// A page could not be flushed although the write itself did not fail.
    Permission,
    /// An I/O operation failed.
    Io,
    /// Memory for a transient structure could not be allocated.
    NoMemory,
    /// A cache resource (buffers, file slots) is exhausted or gone.
    Resource,
}

/// Errors that can occur in page cache operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Backing store error.
    #[error("storage error: {0}")]
    Storage(#[from] mpool_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An operation that needs a log manager was called on a pool without one.
    #[error("{operation}: requires logging")]
    LoggingRequired {
        /// The operation that was refused.
        operation: &'static str,
    },

    /// The page write reported that nothing was written.
    #[error("{file}: unable to flush page: {pgno}")]
    PageNotWritten {
        /// Name of the file owning the page.
        file: String,
        /// The page that could not be flushed.
        pgno: PageNo,
    },

    /// The backing store accepted only part of a page.
    #[error("{file}: short write of page {pgno}: wrote {written} of {expected} bytes")]
    ShortWrite {
        /// Name of the file owning the page.
        file: String,
        /// The page being written.
        pgno: PageNo,
        /// Bytes the store accepted.
        written: usize,
        /// Bytes in the page.
        expected: usize,
    },

    /// Memory for the pin set could not be allocated.
    #[error("out of memory allocating {requested} pin slots")]
    OutOfMemory {
        /// Number of slots requested.
        requested: usize,
    },

    /// No buffer in the region can be evicted.
    #[error("{region}: no evictable buffers")]
    CacheFull {
        /// The exhausted region.
        region: RegionId,
    },

    /// A modification was attempted through a read-only handle.
    #[error("{file}: file is read-only")]
    ReadOnly {
        /// Name of the file.
        file: String,
    },

    /// The file was discarded and its pages can no longer be used.
    #[error("{file}: file has been discarded")]
    DeadFile {
        /// Name of the file.
        file: String,
    },

    /// Invalid pool or file configuration.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl PoolError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a page-not-written error.
    pub fn page_not_written(file: impl Into<String>, pgno: PageNo) -> Self {
        Self::PageNotWritten {
            file: file.into(),
            pgno,
        }
    }

    /// Creates a read-only error.
    pub fn read_only(file: impl Into<String>) -> Self {
        Self::ReadOnly { file: file.into() }
    }

    /// Creates a dead-file error.
    pub fn dead_file(file: impl Into<String>) -> Self {
        Self::DeadFile { file: file.into() }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LoggingRequired { .. } | Self::Config { .. } | Self::ReadOnly { .. } => {
                ErrorKind::Invalid
            }
            Self::PageNotWritten { .. } => ErrorKind::Permission,
            Self::Storage(_) | Self::Io(_) | Self::ShortWrite { .. } => ErrorKind::Io,
            Self::OutOfMemory { .. } => ErrorKind::NoMemory,
            Self::CacheFull { .. } | Self::DeadFile { .. } => ErrorKind::Resource,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_not_written_is_permission() {
        let err = PoolError::page_not_written("a.db", 7);
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert_eq!(err.to_string(), "a.db: unable to flush page: 7");
    }

    #[test]
    fn logging_required_is_invalid() {
        let err = PoolError::LoggingRequired { operation: "sync" };
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(err.to_string(), "sync: requires logging");
    }

    #[test]
    fn storage_errors_are_io() {
        let err: PoolError = mpool_storage::StorageError::Closed.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
