//! Benchmark utilities.

use mpool_core::{FileHandle, FileOptions, LogManager, Lsn, MemPool, PageNo, PoolConfig, PoolResult};
use mpool_storage::InMemoryStore;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// Page size used by the benchmarks.
pub const BENCH_PAGE_SIZE: usize = 4096;

/// A log whose flushes are free, so checkpoints measure the cache alone.
#[derive(Debug, Default)]
pub struct NullLog;

impl LogManager for NullLog {
    fn flush(&self, _lsn: Option<Lsn>) -> PoolResult<()> {
        Ok(())
    }
}

/// Generate random page data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Page numbers `0..count` in random order.
pub fn shuffled_pages(count: PageNo) -> Vec<PageNo> {
    let mut pages: Vec<PageNo> = (0..count).collect();
    pages.shuffle(&mut rand::thread_rng());
    pages
}

/// Creates a pool with a [`NullLog`].
pub fn logged_pool(regions: usize, buffers_per_region: usize) -> MemPool {
    let config = PoolConfig::new()
        .regions(regions)
        .buffers_per_region(buffers_per_region);
    MemPool::with_log(config, Arc::new(NullLog)).expect("Failed to create pool")
}

/// Registers an in-memory file with [`BENCH_PAGE_SIZE`] pages.
pub fn memory_file(pool: &MemPool, name: &str) -> FileHandle {
    pool.open_store(
        name,
        Arc::new(InMemoryStore::new()),
        FileOptions::new().page_size(BENCH_PAGE_SIZE),
    )
    .expect("Failed to open file")
}

/// Copies `data` into each page and releases it.
pub fn dirty(pool: &MemPool, file: &FileHandle, pages: &[PageNo], data: &[u8]) {
    for &pgno in pages {
        let page = pool.get_page(file, pgno).expect("Failed to get page");
        page.write(|bytes| bytes.copy_from_slice(data))
            .expect("Failed to write page");
        page.release().expect("Failed to release page");
    }
}
