//! Per-file flush.
//!
//! Writes every dirty, unpinned buffer of one file and then fsyncs the
//! file. Unlike a checkpoint it leaves no marks behind: buffers pinned by
//! other threads only make the result [`SyncStatus::Incomplete`].

use crate::error::{PoolError, PoolResult};
use crate::file::{FileHandle, FileRecord};
use crate::pinset::{Allocation, PinSet, PinnedBuffer};
use crate::pool::{MemPool, Primary};
use crate::region::Region;
use crate::sync::MAX_PASSES;
use crate::types::SyncStatus;
use mpool_storage::BackingStore;
use parking_lot::MutexGuard;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, error, trace};

impl MemPool {
    /// Flushes the dirty pages of one file and fsyncs it.
    ///
    /// Read-only and temporary files return [`SyncStatus::Complete`]
    /// without doing anything. [`SyncStatus::Incomplete`] means some pages
    /// were pinned or under I/O and are still dirty; the file is fsynced
    /// either way unless a write failed.
    ///
    /// # Errors
    ///
    /// - [`PoolError::OutOfMemory`] if the pin set cannot be allocated.
    /// - [`PoolError::PageNotWritten`] if a page could not be written.
    /// - The backing store's error if a write or the fsync fails.
    pub fn sync_file(&self, handle: &FileHandle) -> PoolResult<SyncStatus> {
        if handle.readonly || handle.record.temporary {
            trace!(file = %handle.record.name, "nothing to flush");
            return Ok(SyncStatus::Complete);
        }
        self.flush_file(&handle.record)
    }

    /// Returns the store backing `handle`, flushing its pages first if the
    /// file has none yet.
    ///
    /// A temporary file with nothing to flush still gets an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails or no store can be created.
    pub fn backing_store(&self, handle: &FileHandle) -> PoolResult<Arc<dyn BackingStore>> {
        let file = &handle.record;
        if let Some(store) = file.store() {
            return Ok(store);
        }

        let _ = self.flush_file(file)?;
        self.store_for(file)?
            .ok_or_else(|| PoolError::dead_file(&file.name))
    }

    pub(crate) fn flush_file(&self, file: &FileRecord) -> PoolResult<SyncStatus> {
        self.stats.record_file_sync();

        let mut others = self.guard_slots();
        let primary = self.primary.lock();
        let (mut primary, mut pins) = match self.allocate_pins(primary)? {
            Allocation::Ready(pins, primary) => (primary, pins),
            Allocation::Empty => {
                self.fsync(file)?;
                return Ok(SyncStatus::Complete);
            }
        };

        let result = self.run_file_passes(&mut primary, &mut others, &mut pins, file);
        drop(primary);
        drop(pins);

        let status = match result {
            Ok(status) => status,
            Err(err) => {
                self.stats.record_error();
                return Err(err);
            }
        };
        self.fsync(file)?;
        debug!(file = %file.name, %status, "file flushed");
        Ok(status)
    }

    fn run_file_passes<'a>(
        &'a self,
        primary: &mut MutexGuard<'a, Primary>,
        others: &mut Vec<MutexGuard<'a, Region>>,
        pins: &mut PinSet,
        file: &FileRecord,
    ) -> PoolResult<SyncStatus> {
        for pass in 1..=MAX_PASSES {
            pins.clear();
            self.lock_secondary(others);
            let (exhausted, mut incomplete) = pin_file_pages(primary, others, pins, file);
            others.clear();

            if pins.is_empty() {
                return Ok(status(incomplete));
            }

            MutexGuard::unlocked(primary, || pins.sort());

            let entries = pins.entries();
            for (i, entry) in entries.iter().enumerate() {
                let outcome = self.with_region(primary, entry.region, |region| {
                    let Some(bh) = region.buffer_mut(entry.slot) else {
                        return Ok(true);
                    };
                    if bh.refcount > 1 {
                        bh.unpin();
                        return Ok(false);
                    }
                    let wrote = self.write_page(region, entry.slot, file);
                    if let Some(bh) = region.buffer_mut(entry.slot) {
                        bh.unpin();
                    }
                    wrote.and_then(|wrote| {
                        if wrote {
                            Ok(true)
                        } else {
                            Err(PoolError::page_not_written(&file.name, entry.pgno))
                        }
                    })
                });

                match outcome {
                    Ok(true) => {}
                    Ok(false) => {
                        self.stats.record_page_skipped();
                        incomplete = true;
                    }
                    Err(err) => {
                        error!("{err}");
                        self.drain(primary, &entries[i + 1..], false);
                        return Err(err);
                    }
                }
            }

            if !exhausted {
                return Ok(status(incomplete));
            }
            self.stats.record_pin_set_exhausted();
            if pass < MAX_PASSES {
                self.stats.record_retry();
            }
        }
        Ok(SyncStatus::Incomplete)
    }

    fn fsync(&self, file: &FileRecord) -> PoolResult<()> {
        if let Some(store) = file.store() {
            store.sync()?;
            self.stats.record_fsync();
        }
        Ok(())
    }
}

/// Pins the dirty, idle buffers of `file`.
///
/// Runs with every region lock held. Returns whether the pin set filled up
/// and whether a dirty buffer was found pinned or under I/O.
fn pin_file_pages(
    primary: &mut Primary,
    others: &mut [MutexGuard<'_, Region>],
    pins: &mut PinSet,
    file: &FileRecord,
) -> (bool, bool) {
    let mut exhausted = false;
    let mut incomplete = false;

    let regions = std::iter::once(&mut primary.region).chain(others.iter_mut().map(|r| &mut **r));
    for region in regions {
        let id = region.id();
        let flow = region.for_each_queued(|slot, bh| {
            if bh.file != file.id || !bh.flags.dirty {
                return ControlFlow::Continue(());
            }
            if bh.refcount != 0 || bh.flags.locked {
                incomplete = true;
                return ControlFlow::Continue(());
            }
            bh.pin();
            let full = pins.push(PinnedBuffer {
                file: bh.file,
                pgno: bh.pgno,
                region: id,
                slot,
            });
            if full {
                exhausted = true;
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });
        if flow.is_break() {
            break;
        }
    }
    (exhausted, incomplete)
}

fn status(incomplete: bool) -> SyncStatus {
    if incomplete {
        SyncStatus::Incomplete
    } else {
        SyncStatus::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileOptions, PoolConfig};
    use mpool_storage::InMemoryStore;

    fn pool_with_file(buffers: usize) -> (MemPool, FileHandle) {
        let pool = MemPool::new(PoolConfig::new().regions(1).buffers_per_region(buffers)).unwrap();
        let file = pool
            .open_store("a.db", Arc::new(InMemoryStore::new()), FileOptions::new().page_size(64))
            .unwrap();
        (pool, file)
    }

    fn dirty(pool: &MemPool, file: &FileHandle, pages: std::ops::Range<u32>) {
        for pgno in pages {
            let page = pool.get_page(file, pgno).unwrap();
            page.write(|bytes| bytes.fill(3)).unwrap();
            page.release().unwrap();
        }
    }

    #[test]
    fn full_pin_set_leaves_file_incomplete() {
        let (pool, file) = pool_with_file(16);
        dirty(&pool, &file, 0..9);

        let mut pins = PinSet::with_capacity(3).unwrap();
        let mut others = pool.guard_slots();
        let mut primary = pool.primary.lock();
        let status = pool
            .run_file_passes(&mut primary, &mut others, &mut pins, &file.record)
            .unwrap();
        drop(primary);

        assert_eq!(status, SyncStatus::Incomplete);
        assert_eq!(pool.stats().pages_written(), 6);
        assert_eq!(pool.stats().snapshot().pin_set_exhausted, 2);
    }

    #[test]
    fn flush_writes_and_fsyncs() {
        let (pool, file) = pool_with_file(8);
        dirty(&pool, &file, 0..4);

        assert_eq!(pool.sync_file(&file).unwrap(), SyncStatus::Complete);
        let stats = pool.stats().snapshot();
        assert_eq!(stats.pages_written, 4);
        assert_eq!(stats.fsyncs, 1);
        assert_eq!(stats.file_syncs, 1);
        assert!(pool.buffers().iter().all(|b| !b.flags.dirty));
    }

    #[test]
    fn other_holders_make_flush_incomplete() {
        let (pool, file) = pool_with_file(8);
        dirty(&pool, &file, 0..2);
        let held = pool.get_page(&file, 6).unwrap();
        held.write(|bytes| bytes.fill(4)).unwrap();

        assert_eq!(pool.sync_file(&file).unwrap(), SyncStatus::Incomplete);
        assert_eq!(pool.stats().pages_written(), 2);
        assert_eq!(pool.stats().snapshot().fsyncs, 1);
        drop(held);
    }

    #[test]
    fn backing_store_of_temp_file_is_created() {
        let (pool, _) = pool_with_file(8);
        let temp = pool.open_temp(FileOptions::new().page_size(64)).unwrap();
        dirty(&pool, &temp, 0..2);

        let store = pool.backing_store(&temp).unwrap();
        assert_eq!(store.size().unwrap(), 128);
    }
}
