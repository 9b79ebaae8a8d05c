//! The shared page cache.
//!
//! ## Locking
//!
//! ```text
//! sync_mutex  ->  region 0 (primary)  ->  region 1 .. region n-1 (ascending)
//! ```
//!
//! - `sync_mutex` serializes cache-wide checkpoints and is taken first.
//! - The primary region's lock also guards the checkpoint LSN.
//! - A thread holding only region *k* never takes another region lock; only
//!   a holder of the primary lock may stack secondary region locks on top.
//! - The file table lock is a leaf.
//!
//! The pending counters (pool-wide and per file) are atomics so that a
//! client releasing a page in region *k* can settle them without climbing
//! back up to the primary lock. They are only changed while the region
//! lock owning the counted buffer is held, or while every region lock is
//! held for a checkpoint's reset.

use crate::buffer::{BufferHeader, BufferInfo};
use crate::config::{FileOptions, PoolConfig};
use crate::error::{PoolError, PoolResult};
use crate::file::{saturating_decrement, FileHandle, FileRecord, FileTable};
use crate::log::LogManager;
use crate::page::Page;
use crate::region::{Region, RegionStats, Victim};
use crate::stats::SyncStats;
use crate::types::{Lsn, PageNo, RegionId, SlotId};
use mpool_storage::{BackingStore, FileStore};
use parking_lot::{Mutex, MutexGuard};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// State guarded by the primary region's lock.
#[derive(Debug)]
pub(crate) struct Primary {
    /// LSN of the in-flight (or last) checkpoint.
    pub(crate) lsn: Lsn,
    pub(crate) region: Region,
}

/// A page cache partitioned into independently locked regions.
///
/// # Example
///
/// ```rust
/// use mpool_core::{FileOptions, MemPool, PoolConfig, SyncStatus};
/// use mpool_storage::InMemoryStore;
/// use std::sync::Arc;
///
/// let pool = MemPool::new(PoolConfig::new().regions(2)).unwrap();
/// let file = pool
///     .open_store("a.db", Arc::new(InMemoryStore::new()), FileOptions::new())
///     .unwrap();
///
/// let page = pool.get_page(&file, 3).unwrap();
/// page.write(|bytes| bytes[0] = 42).unwrap();
/// page.release().unwrap();
///
/// assert_eq!(pool.sync(None).unwrap(), SyncStatus::Complete);
/// ```
pub struct MemPool {
    pub(crate) config: PoolConfig,
    pub(crate) sync_mutex: Mutex<()>,
    pub(crate) primary: Mutex<Primary>,
    pub(crate) secondary: Vec<Mutex<Region>>,
    pub(crate) files: FileTable,
    pub(crate) log: Option<Arc<dyn LogManager>>,
    /// Buffers counted by the in-flight checkpoint and not yet written.
    pub(crate) pending: AtomicU32,
    /// Set when no progress answer may rely on the last checkpoint.
    pub(crate) retry: AtomicBool,
    pub(crate) stats: SyncStats,
}

impl MemPool {
    /// Creates a pool without logging.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Config`] if the configuration is invalid.
    pub fn new(config: PoolConfig) -> PoolResult<Self> {
        Self::build(config, None)
    }

    /// Creates a pool whose page writes are ordered after `log` flushes.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Config`] if the configuration is invalid.
    pub fn with_log(config: PoolConfig, log: Arc<dyn LogManager>) -> PoolResult<Self> {
        Self::build(config, Some(log))
    }

    fn build(config: PoolConfig, log: Option<Arc<dyn LogManager>>) -> PoolResult<Self> {
        config.validate()?;

        let capacity = config.buffers_per_region;
        let secondary = (1..config.regions)
            .map(|i| Mutex::new(Region::new(RegionId::new(i as u16), capacity)))
            .collect();

        debug!(
            regions = config.regions,
            buffers_per_region = capacity,
            logging = log.is_some(),
            "creating page cache"
        );

        Ok(Self {
            primary: Mutex::new(Primary {
                lsn: Lsn::ZERO,
                region: Region::new(RegionId::PRIMARY, capacity),
            }),
            secondary,
            sync_mutex: Mutex::new(()),
            files: FileTable::default(),
            log,
            pending: AtomicU32::new(0),
            retry: AtomicBool::new(false),
            stats: SyncStats::new(),
            config,
        })
    }

    /// Returns the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the number of regions.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.secondary.len() + 1
    }

    /// Returns true if the pool was built with a log manager.
    #[must_use]
    pub fn has_logging(&self) -> bool {
        self.log.is_some()
    }

    /// Returns the sync statistics.
    #[must_use]
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// LSN of the in-flight or most recent checkpoint.
    #[must_use]
    pub fn checkpoint_lsn(&self) -> Lsn {
        self.primary.lock().lsn
    }

    /// Buffers the in-flight checkpoint is still waiting on.
    #[must_use]
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    /// True when the next checkpoint must start from scratch.
    #[must_use]
    pub fn needs_retry(&self) -> bool {
        self.retry.load(Ordering::Acquire)
    }

    /// Per-region page counters.
    #[must_use]
    pub fn region_stats(&self) -> Vec<RegionStats> {
        let primary = self.primary.lock();
        let mut stats = vec![primary.region.stats()];
        stats.extend(self.secondary.iter().map(|r| r.lock().stats()));
        stats
    }

    /// Snapshot of every buffer header, region by region in queue order.
    #[must_use]
    pub fn buffers(&self) -> Vec<BufferInfo> {
        let mut others = self.guard_slots();
        let primary = self.primary.lock();
        self.lock_secondary(&mut others);
        let mut infos: Vec<BufferInfo> = primary.region.infos().collect();
        for region in &others {
            infos.extend(region.infos());
        }
        infos
    }

    // === File registry ===

    /// Opens (or creates) a page file on disk.
    ///
    /// Opening a path that is already registered shares its file record.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or the file cannot be opened.
    pub fn open_file(&self, path: &Path, options: FileOptions) -> PoolResult<FileHandle> {
        options.validate()?;
        let name = path.display().to_string();
        let readonly = options.readonly;

        if let Some(record) = self.files.find_shared(&name) {
            record.add_open();
            if record.store().is_none() {
                record.install_store(Arc::new(FileStore::open(path)?));
            }
            return Ok(FileHandle { record, readonly });
        }

        let store: Arc<dyn BackingStore> = Arc::new(FileStore::open(path)?);
        let record = self.register(name, &options, Some(path.to_path_buf()), Some(store))?;
        Ok(FileHandle { record, readonly })
    }

    /// Registers a file backed by an arbitrary store.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    pub fn open_store(
        &self,
        name: &str,
        store: Arc<dyn BackingStore>,
        options: FileOptions,
    ) -> PoolResult<FileHandle> {
        options.validate()?;
        let readonly = options.readonly;

        if !options.temporary {
            if let Some(record) = self.files.find_shared(name) {
                record.add_open();
                record.install_store(store);
                return Ok(FileHandle { record, readonly });
            }
        }

        let record = self.register(name.to_string(), &options, None, Some(store))?;
        Ok(FileHandle { record, readonly })
    }

    /// Registers a temporary file.
    ///
    /// No backing file exists until a page has to be written.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    pub fn open_temp(&self, options: FileOptions) -> PoolResult<FileHandle> {
        let options = options.temporary(true);
        options.validate()?;
        let readonly = options.readonly;

        let record = self
            .files
            .register(|id| FileRecord::new(id, format!("temporary.{}", id.as_u32()), &options, None, None))
            .ok_or_else(|| PoolError::config("file table is full"))?;
        Ok(FileHandle { record, readonly })
    }

    fn register(
        &self,
        name: String,
        options: &FileOptions,
        path: Option<std::path::PathBuf>,
        store: Option<Arc<dyn BackingStore>>,
    ) -> PoolResult<Arc<FileRecord>> {
        debug!(file = %name, page_size = options.page_size, "registering file");
        self.files
            .register(|id| FileRecord::new(id, name, options, path, store))
            .ok_or_else(|| PoolError::config("file table is full"))
    }

    /// Closes a handle.
    ///
    /// When the last handle of a temporary file closes, the file is
    /// discarded and its cached pages are never written. The last close of
    /// a file opened from a path drops its store; pages still cached reopen
    /// it on write-back. A store passed to [`MemPool::open_store`] is the
    /// only way to reach that file, so it stays until the pool is dropped.
    pub fn close_file(&self, handle: FileHandle) {
        let record = handle.record;
        if record.remove_open() > 0 {
            return;
        }
        if record.temporary {
            record.mark_dead();
            record.drop_store();
        } else if record.path.is_some() {
            record.drop_store();
        }
        debug!(file = %record.name, dead = record.is_dead(), "closed file");
    }

    // === Page access ===

    /// Pins a page of `handle`, reading it in if it is not cached.
    ///
    /// Pages beyond the end of the file read as zeroes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file was discarded, no buffer can be evicted,
    /// or reading the page fails.
    pub fn get_page(&self, handle: &FileHandle, pgno: PageNo) -> PoolResult<Page<'_>> {
        let file = &handle.record;
        if file.is_dead() {
            return Err(PoolError::dead_file(&file.name));
        }

        let region = self.region_of(pgno);
        let slot = self.with_region_locked(region, |r| self.fetch(r, file, pgno))?;
        Ok(Page::new(self, Arc::clone(file), handle.readonly, region, slot, pgno))
    }

    fn fetch(&self, region: &mut Region, file: &FileRecord, pgno: PageNo) -> PoolResult<SlotId> {
        if let Some(slot) = region.lookup(file.id, pgno) {
            if let Some(bh) = region.buffer_mut(slot) {
                bh.pin();
                return Ok(slot);
            }
        }

        if !region.has_free_slot() {
            self.evict(region)?;
        }

        let data = vec![0u8; file.page_size].into_boxed_slice();
        let mut bh = BufferHeader::new(file.id, pgno, data);
        bh.pin();
        bh.flags.locked = true;
        let slot = region.insert(bh).ok_or(PoolError::CacheFull { region: region.id() })?;

        let read = match (file.store(), region.buffer_mut(slot)) {
            (Some(store), Some(bh)) => store.read_at(file.offset_of(pgno), &mut bh.data).map(|_| ()),
            _ => Ok(()),
        };
        if let Some(bh) = region.buffer_mut(slot) {
            bh.flags.locked = false;
        }
        if let Err(err) = read {
            region.remove(slot);
            return Err(err.into());
        }
        Ok(slot)
    }

    fn evict(&self, region: &mut Region) -> PoolResult<()> {
        let slot = match region.victim() {
            Some(Victim::Clean(slot)) => slot,
            Some(Victim::Dirty(slot)) => {
                if !self.write_buffer(region, slot)? {
                    let (file, pgno) = self.describe(region, slot);
                    return Err(PoolError::page_not_written(file, pgno));
                }
                slot
            }
            None => return Err(PoolError::CacheFull { region: region.id() }),
        };
        region.remove(slot);
        self.stats.record_eviction();
        Ok(())
    }

    /// Releases a pin.
    ///
    /// When the last pin of a buffer counted by a checkpoint goes away, the
    /// buffer is written if it is dirty, or its pending count is settled if
    /// it is not. A failed write is left for the next checkpoint.
    pub(crate) fn put_page(&self, file: &FileRecord, region: RegionId, slot: SlotId) -> PoolResult<()> {
        self.with_region_locked(region, |r| {
            let Some(bh) = r.buffer_mut(slot) else {
                return Ok(());
            };
            if bh.unpin() > 0 {
                return Ok(());
            }
            let (sync, dirty) = (bh.flags.sync, bh.flags.dirty);
            r.touch(slot);
            if !sync {
                return Ok(());
            }

            if !dirty {
                if let Some(bh) = r.buffer_mut(slot) {
                    bh.clear_sync();
                }
                self.settle_pending(file);
                return Ok(());
            }

            match self.write_buffer(r, slot) {
                Ok(true) => Ok(()),
                Ok(false) => {
                    self.retry.store(true, Ordering::Release);
                    Ok(())
                }
                Err(err) => {
                    self.retry.store(true, Ordering::Release);
                    Err(err)
                }
            }
        })
    }

    // === Locking helpers ===

    pub(crate) fn region_of(&self, pgno: PageNo) -> RegionId {
        RegionId::new((pgno as usize % self.region_count()) as u16)
    }

    /// Runs `f` holding only the lock of region `id`.
    pub(crate) fn with_region_locked<R>(&self, id: RegionId, f: impl FnOnce(&mut Region) -> R) -> R {
        if id.is_primary() {
            let mut primary = self.primary.lock();
            f(&mut primary.region)
        } else {
            let mut region = self.secondary[id.index() - 1].lock();
            f(&mut *region)
        }
    }

    /// Runs `f` on region `id` while the primary lock is already held.
    pub(crate) fn with_region<R>(
        &self,
        primary: &mut Primary,
        id: RegionId,
        f: impl FnOnce(&mut Region) -> R,
    ) -> R {
        if id.is_primary() {
            f(&mut primary.region)
        } else {
            let mut region = self.secondary[id.index() - 1].lock();
            f(&mut *region)
        }
    }

    /// Room for one guard per secondary region, reserved before any region
    /// lock is taken.
    pub(crate) fn guard_slots(&self) -> Vec<MutexGuard<'_, Region>> {
        Vec::with_capacity(self.secondary.len())
    }

    /// Locks every secondary region in ascending order into `guards`.
    ///
    /// Only call with the primary lock held and `guards` from
    /// [`MemPool::guard_slots`], emptied; it never grows past that capacity.
    pub(crate) fn lock_secondary<'a>(&'a self, guards: &mut Vec<MutexGuard<'a, Region>>) {
        debug_assert!(guards.is_empty());
        guards.extend(self.secondary.iter().map(|region| region.lock()));
    }

    // === Pending counters ===

    pub(crate) fn count_pending(&self, file: Option<&FileRecord>) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if let Some(file) = file {
            file.count_pending();
        }
    }

    pub(crate) fn settle_pending(&self, file: &FileRecord) {
        saturating_decrement(&self.pending);
        file.settle_pending();
    }

    /// Name and page number of a buffer, for diagnostics.
    pub(crate) fn describe(&self, region: &Region, slot: SlotId) -> (String, PageNo) {
        match region.buffer(slot) {
            Some(bh) => {
                let name = self
                    .files
                    .get(bh.file)
                    .map_or_else(|| bh.file.to_string(), |f| f.name.clone());
                (name, bh.pgno)
            }
            None => (String::from("unknown"), 0),
        }
    }
}

impl std::fmt::Debug for MemPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemPool")
            .field("config", &self.config)
            .field("logging", &self.log.is_some())
            .field("pending", &self.pending())
            .field("retry", &self.needs_retry())
            .finish_non_exhaustive()
    }
}
