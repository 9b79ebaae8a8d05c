//! Write-ahead log interface used by the page cache.
//!
//! The cache never interprets log records. It only needs to make sure that
//! the log records describing a page change are durable before the page is
//! written, which it does through [`LogManager::flush`].
//!
//! [`FileLog`] is a minimal append-only log over a [`BackingStore`], enough
//! to drive checkpoints from tools and tests.

use crate::error::{PoolError, PoolResult};
use crate::types::Lsn;
use mpool_storage::BackingStore;
use parking_lot::Mutex;
use std::sync::Arc;

/// The log manager as seen by the page cache.
///
/// LSN comparison is the `Ord` implementation of [`Lsn`]; a pool has
/// logging on exactly when it was built with a log manager.
pub trait LogManager: Send + Sync {
    /// Makes the log durable up to and including `lsn`, or entirely when
    /// `lsn` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be made durable.
    fn flush(&self, lsn: Option<Lsn>) -> PoolResult<()>;
}

/// Record header: payload length (4).
const HEADER_SIZE: usize = 4;

/// LSN file number used by [`FileLog`]; it never switches log files.
const LOG_FILE: u32 = 1;

#[derive(Debug)]
struct LogState {
    /// Offset the next record is appended at.
    end: u64,
    /// Last LSN known to be durable.
    flushed: Lsn,
    /// LSN of the last appended record.
    last: Lsn,
}

/// An append-only log in a single backing store.
///
/// Records are length-prefixed and addressed by the LSN of their header.
pub struct FileLog {
    store: Arc<dyn BackingStore>,
    state: Mutex<LogState>,
}

impl FileLog {
    /// Opens a log over `store`, appending after any existing content.
    ///
    /// # Errors
    ///
    /// Returns an error if the store size cannot be read.
    pub fn open(store: Arc<dyn BackingStore>) -> PoolResult<Self> {
        let end = store.size()?;
        Ok(Self {
            store,
            state: Mutex::new(LogState {
                end,
                flushed: Lsn::ZERO,
                last: Lsn::ZERO,
            }),
        })
    }

    /// Appends a record and returns its LSN.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not fit the log or the write fails.
    pub fn append(&self, payload: &[u8]) -> PoolResult<Lsn> {
        let len = u32::try_from(payload.len())
            .map_err(|_| PoolError::config("log record payload too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(payload);

        let mut state = self.state.lock();
        let offset = u32::try_from(state.end)
            .map_err(|_| PoolError::config("log file exceeds addressable size"))?;
        let written = self.store.write_at(state.end, &data)?;
        if written != data.len() {
            return Err(PoolError::ShortWrite {
                file: "log".to_string(),
                pgno: 0,
                written,
                expected: data.len(),
            });
        }

        let lsn = Lsn::new(LOG_FILE, offset);
        state.end += data.len() as u64;
        state.last = lsn;
        Ok(lsn)
    }

    /// Returns the last LSN known to be durable.
    #[must_use]
    pub fn flushed_lsn(&self) -> Lsn {
        self.state.lock().flushed
    }

    /// Returns the LSN of the last appended record.
    #[must_use]
    pub fn last_lsn(&self) -> Lsn {
        self.state.lock().last
    }
}

impl LogManager for FileLog {
    fn flush(&self, lsn: Option<Lsn>) -> PoolResult<()> {
        let mut state = self.state.lock();
        if let Some(lsn) = lsn {
            if lsn <= state.flushed {
                return Ok(());
            }
        }

        self.store.sync()?;
        state.flushed = state.last;
        Ok(())
    }
}

impl std::fmt::Debug for FileLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FileLog")
            .field("end", &state.end)
            .field("flushed", &state.flushed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpool_storage::InMemoryStore;

    fn create_log() -> (Arc<InMemoryStore>, FileLog) {
        let store = Arc::new(InMemoryStore::new());
        let log = FileLog::open(store.clone()).unwrap();
        (store, log)
    }

    #[test]
    fn append_returns_increasing_lsns() {
        let (_, log) = create_log();
        let a = log.append(b"first").unwrap();
        let b = log.append(b"second").unwrap();

        assert_eq!(a, Lsn::new(1, 0));
        assert_eq!(b, Lsn::new(1, 9));
        assert!(a < b);
        assert_eq!(log.last_lsn(), b);
    }

    #[test]
    fn flush_all_syncs_and_advances() {
        let (store, log) = create_log();
        let lsn = log.append(b"record").unwrap();

        log.flush(None).unwrap();
        assert_eq!(store.sync_count(), 1);
        assert_eq!(log.flushed_lsn(), lsn);
    }

    #[test]
    fn flush_to_durable_lsn_is_noop() {
        let (store, log) = create_log();
        let lsn = log.append(b"record").unwrap();
        log.flush(Some(lsn)).unwrap();
        log.flush(Some(lsn)).unwrap();

        assert_eq!(store.sync_count(), 1);
    }

    #[test]
    fn reopen_appends_after_existing_content() {
        let store = Arc::new(InMemoryStore::with_data(vec![0u8; 20]));
        let log = FileLog::open(store).unwrap();
        assert_eq!(log.append(b"x").unwrap(), Lsn::new(1, 20));
    }
}
