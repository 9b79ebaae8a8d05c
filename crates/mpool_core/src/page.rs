//! Pinned pages handed out by [`MemPool::get_page`].

use crate::error::{PoolError, PoolResult};
use crate::file::FileRecord;
use crate::pool::MemPool;
use crate::types::{FileId, PageNo, RegionId, SlotId};
use std::sync::Arc;
use tracing::warn;

/// A pinned page.
///
/// The page stays in the cache until the guard is released or dropped.
/// Prefer [`Page::release`] when the caller cares about write-back errors:
/// dropping the last pin of a page a checkpoint is waiting on writes it, and
/// `Drop` can only log a failure.
pub struct Page<'a> {
    pool: &'a MemPool,
    file: Arc<FileRecord>,
    readonly: bool,
    region: RegionId,
    slot: SlotId,
    pgno: PageNo,
    released: bool,
}

impl<'a> Page<'a> {
    pub(crate) fn new(
        pool: &'a MemPool,
        file: Arc<FileRecord>,
        readonly: bool,
        region: RegionId,
        slot: SlotId,
        pgno: PageNo,
    ) -> Self {
        Self {
            pool,
            file,
            readonly,
            region,
            slot,
            pgno,
            released: false,
        }
    }

    /// Returns the page number.
    #[must_use]
    pub fn pgno(&self) -> PageNo {
        self.pgno
    }

    /// Returns the owning file.
    #[must_use]
    pub fn file_id(&self) -> FileId {
        self.file.id
    }

    /// Returns the region caching the page.
    #[must_use]
    pub fn region(&self) -> RegionId {
        self.region
    }

    #[cfg(test)]
    pub(crate) fn slot_for_tests(&self) -> SlotId {
        self.slot
    }

    /// Reads the page contents.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        self.pool.with_region_locked(self.region, |region| {
            let data = region.buffer(self.slot).map_or(&[][..], |bh| &bh.data[..]);
            f(data)
        })
    }

    /// Modifies the page contents and marks the page dirty.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ReadOnly`] for a read-only handle.
    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> PoolResult<R> {
        if self.readonly {
            return Err(PoolError::read_only(&self.file.name));
        }
        self.pool.with_region_locked(self.region, |region| {
            region.set_dirty(self.slot);
            let bh = region
                .buffer_mut(self.slot)
                .ok_or_else(|| PoolError::dead_file(&self.file.name))?;
            // Changed after the checkpoint flushed the log.
            if bh.flags.sync {
                bh.flags.sync_log_flush = true;
            }
            Ok(f(&mut bh.data))
        })
    }

    /// Marks the page dirty without changing it.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ReadOnly`] for a read-only handle.
    pub fn mark_dirty(&self) -> PoolResult<()> {
        self.write(|_| ())
    }

    /// Unpins the page.
    ///
    /// # Errors
    ///
    /// Returns the write-back error if this was the last pin of a page a
    /// checkpoint is waiting on and writing it failed.
    pub fn release(mut self) -> PoolResult<()> {
        self.released = true;
        self.pool.put_page(&self.file, self.region, self.slot)
    }
}

impl Drop for Page<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.pool.put_page(&self.file, self.region, self.slot) {
            warn!(file = %self.file.name, pgno = self.pgno, error = %err, "write-back on release failed");
        }
    }
}

impl std::fmt::Debug for Page<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("file", &self.file.name)
            .field("pgno", &self.pgno)
            .field("region", &self.region)
            .field("readonly", &self.readonly)
            .finish()
    }
}
