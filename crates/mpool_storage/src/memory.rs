//! In-memory backing store for testing.

use crate::error::{StorageError, StorageResult};
use crate::store::BackingStore;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// An in-memory backing store.
///
/// This store keeps the whole file in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Page files that never need to outlive the process
///
/// Writes past the current end zero-fill the gap, like a sparse file.
///
/// # Example
///
/// ```rust
/// use mpool_storage::{BackingStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// store.write_at(8, b"data").unwrap();
/// assert_eq!(store.size().unwrap(), 12);
/// store.sync().unwrap();
/// assert_eq!(store.sync_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<Vec<u8>>,
    syncs: AtomicU64,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory store with pre-existing contents.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
            syncs: AtomicU64::new(0),
        }
    }

    /// Returns a copy of all data in the store.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Returns how many times [`BackingStore::sync`] has been called.
    #[must_use]
    pub fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::Relaxed)
    }
}

fn to_index(offset: u64) -> StorageResult<usize> {
    usize::try_from(offset).map_err(|_| StorageError::OffsetOutOfRange { offset })
}

impl BackingStore for InMemoryStore {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<usize> {
        let data = self.data.read();
        let start = to_index(offset)?;
        if start >= data.len() {
            return Ok(0);
        }

        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, offset: u64, new_data: &[u8]) -> StorageResult<usize> {
        let start = to_index(offset)?;
        let end = start
            .checked_add(new_data.len())
            .ok_or(StorageError::OffsetOutOfRange { offset })?;

        let mut data = self.data.write();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(new_data);
        Ok(new_data.len())
    }

    fn sync(&self) -> StorageResult<()> {
        // Nothing to make durable, only counted.
        self.syncs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert_eq!(store.size().unwrap(), 0);
        assert!(store.data().is_empty());
    }

    #[test]
    fn memory_write_returns_length() {
        let store = InMemoryStore::new();
        assert_eq!(store.write_at(0, b"hello").unwrap(), 5);
        assert_eq!(store.write_at(5, b" world").unwrap(), 6);
        assert_eq!(store.size().unwrap(), 11);
    }

    #[test]
    fn memory_write_past_end_zero_fills() {
        let store = InMemoryStore::new();
        store.write_at(4, b"ab").unwrap();
        assert_eq!(store.data(), vec![0, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn memory_overwrite_in_place() {
        let store = InMemoryStore::with_data(b"hello world".to_vec());
        store.write_at(0, b"HELLO").unwrap();
        assert_eq!(store.data(), b"HELLO world".to_vec());
    }

    #[test]
    fn memory_read_at_returns_correct_data() {
        let store = InMemoryStore::with_data(b"hello world".to_vec());
        let mut buf = [0u8; 5];
        assert_eq!(store.read_at(6, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn memory_read_past_end_is_short() {
        let store = InMemoryStore::with_data(b"hello".to_vec());
        let mut buf = [0xFFu8; 4];
        assert_eq!(store.read_at(3, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(buf[2], 0xFF);
        assert_eq!(store.read_at(10, &mut buf).unwrap(), 0);
    }

    #[test]
    fn memory_sync_is_counted() {
        let store = InMemoryStore::new();
        store.sync().unwrap();
        store.sync().unwrap();
        assert_eq!(store.sync_count(), 2);
    }
}
