//! # mpool core
//!
//! A shared page cache for files of fixed-size pages.
//!
//! This crate provides:
//! - A buffer pool split into independently locked regions
//! - Pinned page access with LRU eviction and write-back
//! - Cache-wide checkpoint flush with progress queries
//! - Per-file flush followed by fsync
//! - Write-ahead ordering against an optional log manager
//!
//! ## Checkpoints
//!
//! [`MemPool::sync`] writes every dirty page in the cache. Pages pinned by
//! other threads are marked and written when their last pin is released,
//! so a checkpoint may return [`SyncStatus::Incomplete`]. Calling again with
//! the same LSN reports whether those pages have been written since.
//!
//! ## Example
//!
//! ```rust
//! use mpool_core::{FileLog, FileOptions, Lsn, MemPool, PoolConfig, SyncStatus};
//! use mpool_storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! let log = Arc::new(FileLog::open(Arc::new(InMemoryStore::new())).unwrap());
//! let pool = MemPool::with_log(PoolConfig::new(), log.clone()).unwrap();
//! let file = pool
//!     .open_store("users.db", Arc::new(InMemoryStore::new()), FileOptions::new())
//!     .unwrap();
//!
//! let page = pool.get_page(&file, 0).unwrap();
//! page.write(|bytes| bytes[..5].copy_from_slice(b"hello")).unwrap();
//! page.release().unwrap();
//!
//! let mut lsn = log.append(b"checkpoint").unwrap();
//! assert_eq!(pool.sync(Some(&mut lsn)).unwrap(), SyncStatus::Complete);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod config;
mod error;
mod file;
mod fsync;
mod log;
mod page;
mod pinset;
mod pool;
mod region;
mod stats;
mod sync;
mod types;
mod write;

pub use buffer::{BufferFlags, BufferInfo};
pub use config::{FileOptions, PoolConfig, DEFAULT_PAGE_SIZE};
pub use error::{ErrorKind, PoolError, PoolResult};
pub use file::FileHandle;
pub use log::{FileLog, LogManager};
pub use page::Page;
pub use pool::MemPool;
pub use region::RegionStats;
pub use stats::{SyncStats, SyncStatsSnapshot};
pub use types::{FileId, Lsn, PageNo, RegionId, SlotId, SyncStatus};
