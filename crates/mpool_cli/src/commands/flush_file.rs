//! Flush-file command implementation.

use super::report::SyncReport;
use super::{dirty_pages, PoolShape};
use mpool_core::{FileOptions, MemPool, PageNo, PoolConfig};
use std::path::Path;
use tracing::info;

/// Runs the flush-file command.
pub fn run(
    path: &Path,
    shape: PoolShape,
    name: &str,
    pages: PageNo,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    execute(path, shape, name, pages)?.print(format)
}

/// Dirties `pages` pages of `name` and flushes that file alone.
pub fn execute(
    path: &Path,
    shape: PoolShape,
    name: &str,
    pages: PageNo,
) -> Result<SyncReport, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(path)?;

    let config = PoolConfig::new()
        .regions(shape.regions)
        .buffers_per_region(shape.buffers)
        .temp_dir(path);
    let pool = MemPool::new(config)?;
    let file = pool.open_file(&path.join(name), FileOptions::new().page_size(shape.page_size))?;

    let dirtied = dirty_pages(&pool, &file, pages, None)?;
    let status = pool.sync_file(&file)?;
    info!(file = name, %status, "file flushed");

    let report = SyncReport::new(path, "flush-file", dirtied, status, &pool);
    pool.close_file(file);
    Ok(report)
}
