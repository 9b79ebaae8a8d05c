//! CLI command implementations.

pub mod checkpoint;
pub mod flush_file;
pub mod report;

use mpool_core::{FileHandle, FileLog, MemPool, PageNo};

/// Cache shape shared by the sync commands.
#[derive(Debug, Clone, Copy)]
pub struct PoolShape {
    /// Number of regions.
    pub regions: usize,
    /// Buffers per region.
    pub buffers: usize,
    /// Page size in bytes.
    pub page_size: usize,
}

/// Overwrites pages `0..pages` of `file` with a pattern derived from the
/// page number, logging each change first when `log` is given.
///
/// Returns the number of pages dirtied.
pub fn dirty_pages(
    pool: &MemPool,
    file: &FileHandle,
    pages: PageNo,
    log: Option<&FileLog>,
) -> Result<usize, Box<dyn std::error::Error>> {
    for pgno in 0..pages {
        if let Some(log) = log {
            let mut record = Vec::with_capacity(8);
            record.extend_from_slice(&file.id().as_u32().to_le_bytes());
            record.extend_from_slice(&pgno.to_le_bytes());
            log.append(&record)?;
        }

        let page = pool.get_page(file, pgno)?;
        page.write(|bytes| {
            for (i, b) in bytes.iter_mut().enumerate() {
                *b = (pgno as usize).wrapping_add(i) as u8;
            }
        })?;
        page.release()?;
    }
    Ok(pages as usize)
}
