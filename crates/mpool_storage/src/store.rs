//! Backing store trait definition.

use crate::error::StorageResult;

/// The file underneath a cached page file.
///
/// Backing stores are **positional byte stores**. The page cache translates
/// page numbers into byte offsets; the store only moves bytes.
///
/// # Invariants
///
/// - `write_at` returns the number of bytes it accepted; `0` for a non-empty
///   buffer means nothing was written and is not an error at this layer
/// - `read_at` past the end of the store returns fewer bytes than requested
///   (possibly zero) rather than failing
/// - `sync` makes every accepted write durable
/// - Stores take `&self` and must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent and temporary files
pub trait BackingStore: Send + Sync {
    /// Reads into `buf` starting at `offset`.
    ///
    /// Returns the number of bytes read. Bytes beyond the end of the store
    /// are not touched.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<usize>;

    /// Writes `data` at `offset`, extending the store if needed.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<usize>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&self) -> StorageResult<()>;

    /// Returns the current size of the store in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;
}
