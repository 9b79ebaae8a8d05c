//! Buffer headers: the per-page metadata of the cache.

use crate::types::{FileId, PageNo, RegionId};

/// State flags of a cached page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferFlags {
    /// The cached copy differs from the on-disk copy.
    pub dirty: bool,
    /// I/O on the buffer is in flight.
    pub locked: bool,
    /// The buffer is counted by the in-flight checkpoint and not yet written.
    pub sync: bool,
    /// The buffer was modified after the checkpoint flushed the log, so the
    /// log must be flushed again before it is written.
    pub sync_log_flush: bool,
}

/// Metadata and contents of one cached page.
///
/// Every field is only touched through `&mut Region`, i.e. with the owning
/// region's lock held.
#[derive(Debug)]
pub(crate) struct BufferHeader {
    pub(crate) file: FileId,
    pub(crate) pgno: PageNo,
    pub(crate) refcount: u32,
    pub(crate) flags: BufferFlags,
    pub(crate) data: Box<[u8]>,
}

impl BufferHeader {
    pub(crate) fn new(file: FileId, pgno: PageNo, data: Box<[u8]>) -> Self {
        Self {
            file,
            pgno,
            refcount: 0,
            flags: BufferFlags::default(),
            data,
        }
    }

    pub(crate) fn pin(&mut self) {
        self.refcount += 1;
    }

    /// Drops one pin and returns the remaining count.
    pub(crate) fn unpin(&mut self) -> u32 {
        debug_assert!(self.refcount > 0, "unpinned buffer with refcount 0");
        self.refcount = self.refcount.saturating_sub(1);
        self.refcount
    }

    /// Buffers that are pinned, counted by a checkpoint or under I/O stay.
    pub(crate) fn is_evictable(&self) -> bool {
        self.refcount == 0 && !self.flags.sync && !self.flags.locked
    }

    /// Clears the checkpoint marks, returning whether the buffer was counted.
    pub(crate) fn clear_sync(&mut self) -> bool {
        let was_counted = self.flags.sync;
        self.flags.sync = false;
        self.flags.sync_log_flush = false;
        was_counted
    }
}

/// Point-in-time view of a buffer header, for statistics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferInfo {
    /// Region holding the buffer.
    pub region: RegionId,
    /// File the page belongs to.
    pub file: FileId,
    /// Page number.
    pub pgno: PageNo,
    /// Number of pins.
    pub refcount: u32,
    /// State flags.
    pub flags: BufferFlags,
}
