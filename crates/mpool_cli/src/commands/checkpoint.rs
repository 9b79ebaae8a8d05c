//! Checkpoint command implementation.
//!
//! Builds a file-backed pool with a log in the target directory, dirties
//! pages of several data files and checkpoints up to the last logged LSN.

use super::report::SyncReport;
use super::{dirty_pages, PoolShape};
use mpool_core::{FileLog, FileOptions, MemPool, PageNo, PoolConfig};
use mpool_storage::FileStore;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Log file name inside the pool directory.
pub const LOG_FILE: &str = "mpool.log";

/// Runs the checkpoint command.
pub fn run(
    path: &Path,
    shape: PoolShape,
    files: usize,
    pages: PageNo,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    execute(path, shape, files, pages)?.print(format)
}

/// Dirties `pages` pages in each of `files` data files and checkpoints.
pub fn execute(
    path: &Path,
    shape: PoolShape,
    files: usize,
    pages: PageNo,
) -> Result<SyncReport, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(path)?;

    let log = Arc::new(FileLog::open(Arc::new(FileStore::open(&path.join(LOG_FILE))?))?);
    let config = PoolConfig::new()
        .regions(shape.regions)
        .buffers_per_region(shape.buffers)
        .temp_dir(path);
    let pool = MemPool::with_log(config, log.clone())?;

    let mut dirtied = 0;
    for i in 0..files {
        let file = pool.open_file(
            &path.join(format!("data{i}.db")),
            FileOptions::new().page_size(shape.page_size),
        )?;
        dirtied += dirty_pages(&pool, &file, pages, Some(&*log))?;
    }
    info!(files, pages = dirtied, "pages dirtied");

    let mut lsn = log.last_lsn();
    let status = pool.sync(Some(&mut lsn))?;
    info!(%lsn, %status, "checkpoint finished");

    let mut report = SyncReport::new(path, "checkpoint", dirtied, status, &pool);
    report.lsn = Some(pool.checkpoint_lsn().to_string());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SHAPE: PoolShape = PoolShape {
        regions: 2,
        buffers: 16,
        page_size: 512,
    };

    #[test]
    fn checkpoint_writes_every_page() {
        let dir = TempDir::new().unwrap();
        let report = execute(dir.path(), SHAPE, 2, 4).unwrap();

        assert_eq!(report.status, "complete");
        assert_eq!(report.pages_dirtied, 8);
        assert_eq!(report.stats.pages_written, 8);
        assert_eq!(report.stats.log_flushes, 1);
        assert!(report.regions.iter().all(|r| r.dirty == 0));

        let size = std::fs::metadata(dir.path().join("data1.db")).unwrap().len();
        assert_eq!(size, 4 * 512);
        assert!(dir.path().join(LOG_FILE).exists());
    }

    #[test]
    fn small_cache_evicts_while_dirtying() {
        let dir = TempDir::new().unwrap();
        let shape = PoolShape {
            regions: 1,
            buffers: 4,
            page_size: 512,
        };
        let report = execute(dir.path(), shape, 1, 10).unwrap();

        assert_eq!(report.status, "complete");
        assert!(report.stats.evictions >= 6);
        assert_eq!(report.stats.pages_written, 10);
    }
}
