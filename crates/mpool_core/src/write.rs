//! Writing single buffers back to their files.
//!
//! Both entry points run with the owning region's lock held and return
//! `Ok(true)` when the buffer no longer needs writing, `Ok(false)` when the
//! page could not be written although nothing failed (no store could be
//! found for it, or the store accepted zero bytes).

use crate::error::{PoolError, PoolResult};
use crate::file::FileRecord;
use crate::pool::MemPool;
use crate::region::Region;
use crate::types::SlotId;
use mpool_storage::{BackingStore, FileStore};
use std::sync::Arc;
use tracing::{debug, error, trace};

impl MemPool {
    /// Writes a buffer, finding its file through the file table.
    ///
    /// Buffers of discarded files are marked clean without any I/O.
    pub(crate) fn write_buffer(&self, region: &mut Region, slot: SlotId) -> PoolResult<bool> {
        let Some(file_id) = region.buffer(slot).map(|bh| bh.file) else {
            return Ok(true);
        };
        let Some(file) = self.files.get(file_id) else {
            return Ok(false);
        };
        self.write_page(region, slot, &file)
    }

    /// Writes a buffer of `file`.
    pub(crate) fn write_page(
        &self,
        region: &mut Region,
        slot: SlotId,
        file: &FileRecord,
    ) -> PoolResult<bool> {
        let Some(bh) = region.buffer(slot) else {
            return Ok(true);
        };
        if !bh.flags.dirty {
            self.settle_written(region, slot, file);
            return Ok(true);
        }
        if file.is_dead() {
            trace!(file = %file.name, pgno = bh.pgno, "discarding page of dead file");
            region.set_clean(slot);
            self.settle_written(region, slot, file);
            return Ok(true);
        }

        let Some(store) = self.store_for(file)? else {
            return Ok(false);
        };

        if let Some(log) = &self.log {
            let flags = bh.flags;
            // Outside a checkpoint, or changed since the checkpoint's flush.
            if !flags.sync || flags.sync_log_flush {
                log.flush(None)?;
            }
        }

        let offset = file.offset_of(bh.pgno);
        let Some(bh) = region.buffer_mut(slot) else {
            return Ok(true);
        };
        bh.flags.locked = true;
        let result = store.write_at(offset, &bh.data);
        bh.flags.locked = false;

        let (pgno, expected) = (bh.pgno, bh.data.len());
        let written = result.map_err(|err| {
            error!(file = %file.name, pgno, error = %err, "page write failed");
            PoolError::from(err)
        })?;
        if written == 0 {
            return Ok(false);
        }
        if written != expected {
            return Err(PoolError::ShortWrite {
                file: file.name.clone(),
                pgno,
                written,
                expected,
            });
        }

        region.set_clean(slot);
        self.settle_written(region, slot, file);
        self.stats.record_page_written();
        trace!(file = %file.name, pgno, "wrote page");
        Ok(true)
    }

    /// Clears the checkpoint marks of a buffer that no longer needs writing.
    fn settle_written(&self, region: &mut Region, slot: SlotId, file: &FileRecord) {
        if let Some(bh) = region.buffer_mut(slot) {
            if bh.clear_sync() {
                self.settle_pending(file);
            }
        }
    }

    /// Finds the store pages of `file` are written to.
    ///
    /// A temporary file gets its backing file on first use; a file whose
    /// last handle was closed is reopened from its path.
    pub(crate) fn store_for(&self, file: &FileRecord) -> PoolResult<Option<Arc<dyn BackingStore>>> {
        if let Some(store) = file.store() {
            return Ok(Some(store));
        }

        if file.temporary {
            let store = match &self.config.temp_dir {
                Some(dir) => FileStore::temporary_in(dir)?,
                None => FileStore::temporary()?,
            };
            debug!(file = %file.name, "created backing file for temporary file");
            return Ok(Some(file.install_store(Arc::new(store))));
        }

        if let Some(path) = &file.path {
            match FileStore::open(path) {
                Ok(store) => {
                    debug!(file = %file.name, "reopened closed file for write-back");
                    return Ok(Some(file.install_store(Arc::new(store))));
                }
                Err(err) => {
                    debug!(file = %file.name, error = %err, "cannot reopen file");
                }
            }
        }
        Ok(None)
    }
}
