//! # mpool storage
//!
//! Backing store trait and implementations for the mpool page cache.
//!
//! This crate provides the lowest-level storage abstraction for the pool.
//! Backing stores are **positional byte stores** - they do not know about
//! pages, buffer headers or checkpoints.
//!
//! ## Design Principles
//!
//! - Stores are simple byte stores (read at, write at, sync)
//! - No knowledge of page sizes, regions or the log
//! - Must be `Send + Sync`: the pool writes from whichever thread holds a region lock
//! - A write that reports zero bytes is a legal outcome the caller must handle
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral files
//! - [`FileStore`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use mpool_storage::{BackingStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! let written = store.write_at(0, b"hello world").unwrap();
//! assert_eq!(written, 11);
//!
//! let mut buf = [0u8; 5];
//! assert_eq!(store.read_at(6, &mut buf).unwrap(), 5);
//! assert_eq!(&buf, b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::BackingStore;
