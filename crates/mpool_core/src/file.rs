//! File registry: the shared per-file records and per-open handles.

use crate::config::FileOptions;
use crate::types::{FileId, PageNo};
use mpool_storage::BackingStore;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared state of a file known to the pool.
///
/// The record outlives individual handles: buffers of a file may stay in the
/// cache after every handle is closed, and the record is what they point at.
pub(crate) struct FileRecord {
    pub(crate) id: FileId,
    pub(crate) name: String,
    pub(crate) page_size: usize,
    pub(crate) temporary: bool,
    /// Where the store can be reopened from once it has been dropped.
    pub(crate) path: Option<PathBuf>,
    /// Buffers of a dead file are discarded instead of written.
    dead: AtomicBool,
    /// Buffers of this file counted by the in-flight checkpoint.
    pending: AtomicU32,
    opens: AtomicUsize,
    store: RwLock<Option<Arc<dyn BackingStore>>>,
}

impl FileRecord {
    pub(crate) fn new(
        id: FileId,
        name: String,
        options: &FileOptions,
        path: Option<PathBuf>,
        store: Option<Arc<dyn BackingStore>>,
    ) -> Self {
        Self {
            id,
            name,
            page_size: options.page_size,
            temporary: options.temporary,
            path,
            dead: AtomicBool::new(false),
            pending: AtomicU32::new(0),
            opens: AtomicUsize::new(1),
            store: RwLock::new(store),
        }
    }

    pub(crate) fn store(&self) -> Option<Arc<dyn BackingStore>> {
        self.store.read().clone()
    }

    /// Installs `store` unless another thread got there first; returns the winner.
    pub(crate) fn install_store(&self, store: Arc<dyn BackingStore>) -> Arc<dyn BackingStore> {
        let mut slot = self.store.write();
        match slot.as_ref() {
            Some(existing) => Arc::clone(existing),
            None => {
                *slot = Some(Arc::clone(&store));
                store
            }
        }
    }

    pub(crate) fn drop_store(&self) {
        *self.store.write() = None;
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dead(&self) {
        self.dead.store(true, Ordering::Release);
    }

    pub(crate) fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn count_pending(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn settle_pending(&self) {
        saturating_decrement(&self.pending);
    }

    pub(crate) fn reset_pending(&self) {
        self.pending.store(0, Ordering::Release);
    }

    pub(crate) fn add_open(&self) {
        self.opens.fetch_add(1, Ordering::AcqRel);
    }

    /// Drops one open and returns how many remain.
    pub(crate) fn remove_open(&self) -> usize {
        self.opens.fetch_sub(1, Ordering::AcqRel).saturating_sub(1)
    }

    pub(crate) fn is_open(&self) -> bool {
        self.opens.load(Ordering::Acquire) > 0
    }

    pub(crate) fn offset_of(&self, pgno: PageNo) -> u64 {
        u64::from(pgno) * self.page_size as u64
    }
}

impl std::fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("page_size", &self.page_size)
            .field("temporary", &self.temporary)
            .field("dead", &self.is_dead())
            .field("open", &self.is_open())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Decrements a pending counter without wrapping.
///
/// A pass abandoned on pin-set exhaustion leaves stale marks on buffers it
/// never reached, and settling those must not drive the counter below zero.
pub(crate) fn saturating_decrement(counter: &AtomicU32) {
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
}

/// An open file in the pool.
///
/// Handles are created by [`crate::MemPool::open_file`] and friends and
/// closed with [`crate::MemPool::close_file`].
#[derive(Debug)]
pub struct FileHandle {
    pub(crate) record: Arc<FileRecord>,
    pub(crate) readonly: bool,
}

impl FileHandle {
    /// Returns the file ID.
    #[must_use]
    pub fn id(&self) -> FileId {
        self.record.id
    }

    /// Returns the file name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Returns the page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.record.page_size
    }

    /// Returns true if this handle cannot modify pages.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Returns true if the file is temporary.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.record.temporary
    }

    /// Returns the path the file was opened from, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.record.path.as_deref()
    }

    /// Number of this file's buffers the in-flight checkpoint is waiting on.
    #[must_use]
    pub fn pending(&self) -> u32 {
        self.record.pending()
    }
}

/// All files ever registered, indexed by [`FileId`].
///
/// This lock is a leaf: it may be taken while region locks are held, never
/// the other way round.
#[derive(Debug, Default)]
pub(crate) struct FileTable {
    files: RwLock<Vec<Arc<FileRecord>>>,
}

impl FileTable {
    pub(crate) fn get(&self, id: FileId) -> Option<Arc<FileRecord>> {
        self.files.read().get(id.index()).cloned()
    }

    /// Returns a live, shareable record registered under `name`.
    pub(crate) fn find_shared(&self, name: &str) -> Option<Arc<FileRecord>> {
        self.files
            .read()
            .iter()
            .find(|f| f.name == name && !f.temporary && !f.is_dead())
            .cloned()
    }

    pub(crate) fn register(
        &self,
        build: impl FnOnce(FileId) -> FileRecord,
    ) -> Option<Arc<FileRecord>> {
        let mut files = self.files.write();
        let id = FileId::new(u32::try_from(files.len()).ok()?);
        let record = Arc::new(build(id));
        files.push(Arc::clone(&record));
        Some(record)
    }

    /// Runs `f` over every record under the table's read lock.
    pub(crate) fn with_all<R>(&self, f: impl FnOnce(&[Arc<FileRecord>]) -> R) -> R {
        f(&self.files.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpool_storage::InMemoryStore;

    fn record(id: u32) -> FileRecord {
        FileRecord::new(
            FileId::new(id),
            format!("f{id}"),
            &FileOptions::new().page_size(512),
            None,
            None,
        )
    }

    #[test]
    fn pending_never_wraps() {
        let rec = record(0);
        rec.settle_pending();
        assert_eq!(rec.pending(), 0);

        rec.count_pending();
        rec.count_pending();
        rec.settle_pending();
        assert_eq!(rec.pending(), 1);

        rec.reset_pending();
        assert_eq!(rec.pending(), 0);
    }

    #[test]
    fn offsets_follow_page_size() {
        let rec = record(0);
        assert_eq!(rec.offset_of(0), 0);
        assert_eq!(rec.offset_of(3), 1536);
    }

    #[test]
    fn install_store_keeps_first() {
        let rec = record(0);
        let first: Arc<dyn BackingStore> = Arc::new(InMemoryStore::new());
        let second: Arc<dyn BackingStore> = Arc::new(InMemoryStore::new());

        let winner = rec.install_store(Arc::clone(&first));
        assert!(Arc::ptr_eq(&winner, &first));
        let winner = rec.install_store(second);
        assert!(Arc::ptr_eq(&winner, &first));
    }

    #[test]
    fn table_assigns_sequential_ids() {
        let table = FileTable::default();
        let a = table.register(|id| record(id.as_u32())).unwrap();
        let b = table.register(|id| record(id.as_u32())).unwrap();

        assert_eq!(a.id, FileId::new(0));
        assert_eq!(b.id, FileId::new(1));
        assert_eq!(table.get(FileId::new(1)).unwrap().name, "f1");
        assert!(table.get(FileId::new(2)).is_none());
        assert!(table.find_shared("f0").is_some());
    }

    #[test]
    fn opens_are_counted() {
        let rec = record(0);
        assert!(rec.is_open());
        rec.add_open();
        assert_eq!(rec.remove_open(), 1);
        assert_eq!(rec.remove_open(), 0);
        assert!(!rec.is_open());
    }
}
