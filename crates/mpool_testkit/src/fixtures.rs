//! Pool fixtures and cache invariant checks.

use crate::recording::{EventLog, RecordingLog, RecordingStore};
use mpool_core::{FileHandle, FileOptions, MemPool, Page, PageNo, PoolConfig};
use std::sync::Arc;
use tempfile::TempDir;

/// Page size used by fixtures; small enough to keep traces readable.
pub const FIXTURE_PAGE_SIZE: usize = 64;

/// A pool wired to recording stores and, optionally, a recording log.
pub struct PoolFixture {
    /// The pool under test.
    pub pool: MemPool,
    /// The log manager, if the pool has logging.
    pub log: Option<Arc<RecordingLog>>,
    /// Trace shared by the log and every store opened through the fixture.
    pub events: EventLog,
    /// Directory temporary files are created in.
    _temp_dir: TempDir,
}

impl PoolFixture {
    /// Creates a pool without logging.
    pub fn new(regions: usize, buffers_per_region: usize) -> Self {
        Self::build(regions, buffers_per_region, false)
    }

    /// Creates a pool with a recording log.
    pub fn with_log(regions: usize, buffers_per_region: usize) -> Self {
        Self::build(regions, buffers_per_region, true)
    }

    fn build(regions: usize, buffers_per_region: usize, logging: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = PoolConfig::new()
            .regions(regions)
            .buffers_per_region(buffers_per_region)
            .temp_dir(temp_dir.path());
        let events = EventLog::new();

        let (pool, log) = if logging {
            let log = Arc::new(RecordingLog::new(events.clone()));
            let pool = MemPool::with_log(config, log.clone()).expect("Failed to create pool");
            (pool, Some(log))
        } else {
            (MemPool::new(config).expect("Failed to create pool"), None)
        };

        Self {
            pool,
            log,
            events,
            _temp_dir: temp_dir,
        }
    }

    /// Registers a file backed by a new recording store.
    pub fn open(&self, name: &str) -> (FileHandle, Arc<RecordingStore>) {
        self.open_with(name, FileOptions::new())
    }

    /// Registers a file with custom options; the page size is always
    /// [`FIXTURE_PAGE_SIZE`].
    pub fn open_with(&self, name: &str, options: FileOptions) -> (FileHandle, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::new(name, FIXTURE_PAGE_SIZE, self.events.clone()));
        let handle = self
            .pool
            .open_store(name, store.clone(), options.page_size(FIXTURE_PAGE_SIZE))
            .expect("Failed to open file");
        (handle, store)
    }

    /// Writes [`stamp`] into each page and releases it.
    pub fn dirty(&self, file: &FileHandle, pages: impl IntoIterator<Item = PageNo>) {
        for pgno in pages {
            let page = self.pool.get_page(file, pgno).expect("Failed to get page");
            page.write(|bytes| bytes.fill(stamp(file, pgno)))
                .expect("Failed to write page");
            page.release().expect("Failed to release page");
        }
    }

    /// Dirties a page and keeps it pinned.
    pub fn pin_dirty(&self, file: &FileHandle, pgno: PageNo) -> Page<'_> {
        let page = self.pool.get_page(file, pgno).expect("Failed to get page");
        page.write(|bytes| bytes.fill(stamp(file, pgno)))
            .expect("Failed to write page");
        page
    }

    /// Number of buffers carrying a checkpoint mark.
    pub fn sync_marked(&self) -> usize {
        self.pool.buffers().iter().filter(|b| b.flags.sync).count()
    }

    /// Number of dirty buffers.
    pub fn dirty_count(&self) -> usize {
        self.pool.region_stats().iter().map(|r| r.page_dirty).sum()
    }

    /// Asserts the pending counters agree with each other and with the
    /// checkpoint marks. `files` must list every file with cached pages.
    pub fn assert_pending_consistent(&self, files: &[&FileHandle]) {
        let per_file: u32 = files.iter().map(|f| f.pending()).sum();
        assert_eq!(
            per_file,
            self.pool.pending(),
            "per-file pending counts disagree with the pool"
        );
        assert_eq!(
            self.sync_marked(),
            self.pool.pending() as usize,
            "marked buffers disagree with the pending count"
        );
    }

    /// Asserts the region counters match the buffers actually cached.
    pub fn assert_region_counts(&self) {
        let buffers = self.pool.buffers();
        for stats in self.pool.region_stats() {
            let in_region: Vec<_> = buffers
                .iter()
                .filter(|b| b.region.0 == stats.region)
                .collect();
            let dirty = in_region.iter().filter(|b| b.flags.dirty).count();
            assert_eq!(stats.page_dirty, dirty, "dirty count of region {}", stats.region);
            assert_eq!(stats.pages(), in_region.len(), "size of region {}", stats.region);
        }
    }
}

/// Byte pattern [`PoolFixture::dirty`] writes into a page.
pub fn stamp(file: &FileHandle, pgno: PageNo) -> u8 {
    (file.id().as_u32().wrapping_mul(31).wrapping_add(pgno) % 251) as u8 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_pages_are_counted() {
        let fixture = PoolFixture::new(2, 8);
        let (file, _) = fixture.open("a.db");

        fixture.dirty(&file, 0..4);
        assert_eq!(fixture.dirty_count(), 4);
        fixture.assert_region_counts();
        fixture.assert_pending_consistent(&[&file]);
    }

    #[test]
    fn stamp_is_never_zero() {
        let fixture = PoolFixture::new(1, 4);
        let (file, _) = fixture.open("a.db");
        for pgno in 0..1000 {
            assert_ne!(stamp(&file, pgno), 0);
        }
    }
}
