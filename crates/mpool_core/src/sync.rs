//! Cache-wide checkpoint flush.
//!
//! A checkpoint marks every dirty or pinned buffer in the cache, writes the
//! unpinned ones in file/page order and leaves the pinned ones to be written
//! by whichever thread drops the last pin. The pool-wide pending counter
//! tracks how many marked buffers are still outstanding; a later call with
//! the same LSN answers from it without scanning the cache.
//!
//! One pass holds every region lock while marking, releases them all to
//! sort the pin set and flush the log, then writes entry by entry taking
//! only the locks each entry needs. A pass whose pin set fills up is
//! followed by exactly one more.

use crate::error::{PoolError, PoolResult};
use crate::file::FileRecord;
use crate::pinset::{Allocation, PinSet, PinnedBuffer};
use crate::pool::{MemPool, Primary};
use crate::region::Region;
use crate::types::{Lsn, SyncStatus};
use parking_lot::MutexGuard;
use std::ops::ControlFlow;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Passes before giving up on a pin set that keeps filling up.
pub(crate) const MAX_PASSES: usize = 2;

/// What the caller of a pass does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pass {
    Done(SyncStatus),
    Retry,
}

impl MemPool {
    /// Flushes every dirty page in the cache up to a checkpoint LSN.
    ///
    /// With `Some(lsn)` the pool must have a log manager. If `lsn` is not
    /// newer than the last checkpoint and nothing invalidated it, this is a
    /// progress query: it returns [`SyncStatus::Complete`] once the buffers
    /// marked by that checkpoint are all written, storing the checkpoint's
    /// LSN into `lsn`, and [`SyncStatus::Incomplete`] otherwise. Any other
    /// LSN starts a new checkpoint.
    ///
    /// `None` flushes the whole cache.
    ///
    /// # Errors
    ///
    /// - [`PoolError::LoggingRequired`] for an LSN on a pool without logging.
    /// - [`PoolError::OutOfMemory`] if the pin set cannot be allocated.
    /// - [`PoolError::PageNotWritten`] if a page could not be written.
    /// - The log manager's or backing store's error if flushing fails.
    ///
    /// After an error the next call starts a fresh checkpoint.
    pub fn sync(&self, lsn: Option<&mut Lsn>) -> PoolResult<SyncStatus> {
        if lsn.is_some() && self.log.is_none() {
            error!("sync: requires logging");
            return Err(PoolError::LoggingRequired { operation: "sync" });
        }
        self.stats.record_cache_sync();

        // Reserved up front; marking allocates nothing under a region lock.
        let mut others = self.guard_slots();
        let serial = self.sync_mutex.lock();
        let primary = self.primary.lock();

        let target = match lsn {
            Some(lsn) => {
                if !lsn.is_zero() && !self.retry.load(Ordering::Acquire) && *lsn <= primary.lsn {
                    self.stats.record_progress_query();
                    if self.pending.load(Ordering::Acquire) != 0 {
                        return Ok(SyncStatus::Incomplete);
                    }
                    *lsn = primary.lsn;
                    return Ok(SyncStatus::Complete);
                }
                *lsn
            }
            None => {
                // No LSN to answer later queries against.
                self.retry.store(true, Ordering::Release);
                Lsn::ZERO
            }
        };

        let (mut primary, mut pins) = match self.allocate_pins(primary) {
            Ok(Allocation::Ready(pins, primary)) => (primary, pins),
            Ok(Allocation::Empty) => return Ok(SyncStatus::Complete),
            Err(err) => {
                self.stats.record_error();
                return Err(err);
            }
        };

        debug!(lsn = %target, capacity = pins.capacity(), "starting checkpoint");
        let result = self.run_cache_passes(&mut primary, &mut others, &mut pins, target);

        drop(primary);
        drop(serial);
        drop(pins);

        match &result {
            Ok(status) => debug!(lsn = %target, %status, "checkpoint finished"),
            Err(err) => {
                self.stats.record_error();
                warn!(lsn = %target, error = %err, "checkpoint failed");
            }
        }
        result
    }

    fn run_cache_passes<'a>(
        &'a self,
        primary: &mut MutexGuard<'a, Primary>,
        others: &mut Vec<MutexGuard<'a, Region>>,
        pins: &mut PinSet,
        target: Lsn,
    ) -> PoolResult<SyncStatus> {
        for pass in 1..=MAX_PASSES {
            if let Pass::Done(status) = self.cache_pass(primary, others, pins, target)? {
                return Ok(status);
            }
            self.stats.record_pin_set_exhausted();
            if pass < MAX_PASSES {
                debug!(pinned = pins.len(), "pin set full, starting another pass");
                self.stats.record_retry();
            }
        }

        self.retry.store(true, Ordering::Release);
        Ok(SyncStatus::Incomplete)
    }

    /// Marks, sorts and writes once.
    fn cache_pass<'a>(
        &'a self,
        primary: &mut MutexGuard<'a, Primary>,
        others: &mut Vec<MutexGuard<'a, Region>>,
        pins: &mut PinSet,
        target: Lsn,
    ) -> PoolResult<Pass> {
        pins.clear();
        let exhausted = self.mark_for_checkpoint(primary, others, pins, target);

        if pins.is_empty() {
            return Ok(Pass::Done(self.checkpoint_status()));
        }

        let flushed = MutexGuard::unlocked(primary, || {
            pins.sort();
            match &self.log {
                Some(log) => {
                    self.stats.record_log_flush();
                    log.flush(None)
                }
                None => Ok(()),
            }
        });
        if let Err(err) = flushed {
            error!(error = %err, "log flush failed, abandoning checkpoint");
            self.drain(primary, pins.entries(), true);
            primary.lsn = Lsn::ZERO;
            self.retry.store(true, Ordering::Release);
            return Err(err);
        }

        let entries = pins.entries();
        for (i, entry) in entries.iter().enumerate() {
            let outcome = self.with_region(primary, entry.region, |region| {
                let Some(bh) = region.buffer_mut(entry.slot) else {
                    return Ok(true);
                };
                // Someone else holds it; their release writes it.
                if bh.refcount > 1 {
                    bh.unpin();
                    self.stats.record_page_skipped();
                    return Ok(true);
                }
                let wrote = self.write_buffer(region, entry.slot);
                if let Some(bh) = region.buffer_mut(entry.slot) {
                    bh.unpin();
                }
                wrote
            });

            let err = match outcome {
                Ok(true) => continue,
                Ok(false) => {
                    let name = self
                        .files
                        .get(entry.file)
                        .map_or_else(|| entry.file.to_string(), |f| f.name.clone());
                    let err = PoolError::page_not_written(name, entry.pgno);
                    error!("{err}");
                    err
                }
                Err(err) => err,
            };

            primary.lsn = Lsn::ZERO;
            self.retry.store(true, Ordering::Release);
            self.drain(primary, &entries[i + 1..], true);
            return Err(err);
        }

        if exhausted {
            return Ok(Pass::Retry);
        }
        Ok(Pass::Done(self.checkpoint_status()))
    }

    /// Starts a checkpoint at `target` and marks the buffers it covers.
    ///
    /// Locks the secondary regions into `others` and releases them before
    /// returning. Nothing is allocated while they are held. Returns true if
    /// the pin set filled up before the walk finished.
    fn mark_for_checkpoint<'a>(
        &'a self,
        primary: &mut Primary,
        others: &mut Vec<MutexGuard<'a, Region>>,
        pins: &mut PinSet,
        target: Lsn,
    ) -> bool {
        self.lock_secondary(others);

        self.retry.store(false, Ordering::Release);
        primary.lsn = target;
        self.pending.store(0, Ordering::Release);

        let exhausted = self.files.with_all(|files| {
            for file in files {
                file.reset_pending();
            }
            self.mark_regions(primary, &mut others[..], files, pins)
        });
        others.clear();
        exhausted
    }

    fn mark_regions(
        &self,
        primary: &mut Primary,
        others: &mut [MutexGuard<'_, Region>],
        files: &[Arc<FileRecord>],
        pins: &mut PinSet,
    ) -> bool {
        let mut exhausted = false;
        let regions = std::iter::once(&mut primary.region).chain(others.iter_mut().map(|r| &mut **r));
        for region in regions {
            let id = region.id();
            let flow = region.for_each_queued(|slot, bh| {
                if !bh.flags.dirty && bh.refcount == 0 {
                    // Left over from an abandoned checkpoint.
                    bh.clear_sync();
                    return ControlFlow::Continue(());
                }

                bh.flags.sync = true;
                // This pass's log flush covers any earlier change.
                bh.flags.sync_log_flush = false;
                self.count_pending(files.get(bh.file.index()).map(|f| &**f));

                if bh.refcount != 0 {
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
        exhausted
    }

    fn checkpoint_status(&self) -> SyncStatus {
        SyncStatus::from_pending(self.pending.load(Ordering::Acquire))
    }

    /// Unpins entries a failed pass never got to.
    ///
    /// With `clear_marks`, their checkpoint marks are dropped too: the
    /// checkpoint is abandoned and the next one re-marks from scratch.
    pub(crate) fn drain(&self, primary: &mut Primary, entries: &[PinnedBuffer], clear_marks: bool) {
        for entry in entries {
            self.with_region(primary, entry.region, |region| {
                if let Some(bh) = region.buffer_mut(entry.slot) {
                    bh.unpin();
                    if clear_marks {
                        bh.clear_sync();
                    }
                }
            });
        }
    }
}
