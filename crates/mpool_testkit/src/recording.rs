//! Recording stores and logs.
//!
//! Every store and log built from the same [`EventLog`] appends to one
//! trace, so tests can check the relative order of log flushes, page writes
//! and fsyncs across files.

use mpool_core::{LogManager, Lsn, PageNo, PoolError, PoolResult};
use mpool_storage::{BackingStore, InMemoryStore, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One observable I/O operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The log was flushed.
    LogFlush,
    /// A page was written.
    PageWrite {
        /// Store name.
        file: String,
        /// Page number derived from the write offset.
        pgno: PageNo,
    },
    /// A store was fsynced.
    Fsync {
        /// Store name.
        file: String,
    },
}

/// Shared, ordered trace of [`Event`]s.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn push(&self, event: Event) {
        self.events.lock().push(event);
    }

    /// Returns a copy of the trace.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Page writes in the order they happened.
    pub fn page_writes(&self) -> Vec<(String, PageNo)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::PageWrite { file, pgno } => Some((file.clone(), *pgno)),
                _ => None,
            })
            .collect()
    }

    /// Number of log flushes.
    pub fn log_flushes(&self) -> usize {
        self.count(|e| matches!(e, Event::LogFlush))
    }

    /// Number of fsyncs of `file`.
    pub fn fsyncs(&self, file: &str) -> usize {
        self.count(|e| matches!(e, Event::Fsync { file: f } if f == file))
    }

    /// Index of the first event matching `pred`.
    pub fn position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events.lock().iter().position(pred)
    }

    fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

/// How an injected page write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The write reports zero bytes written.
    ZeroBytes,
    /// The write returns an I/O error.
    Error,
}

/// An in-memory store that records its writes and fsyncs.
pub struct RecordingStore {
    name: String,
    page_size: usize,
    inner: InMemoryStore,
    events: EventLog,
    faults: Mutex<HashMap<PageNo, Fault>>,
    fail_sync: AtomicBool,
}

impl RecordingStore {
    /// Creates an empty store named `name` for pages of `page_size` bytes.
    pub fn new(name: impl Into<String>, page_size: usize, events: EventLog) -> Self {
        Self {
            name: name.into(),
            page_size,
            inner: InMemoryStore::new(),
            events,
            faults: Mutex::new(HashMap::new()),
            fail_sync: AtomicBool::new(false),
        }
    }

    /// Returns the store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Makes every write of `pgno` fail with `fault`.
    pub fn fail_page(&self, pgno: PageNo, fault: Fault) {
        self.faults.lock().insert(pgno, fault);
    }

    /// Removes all page faults.
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Makes fsync fail while `fail` is set.
    pub fn fail_sync(&self, fail: bool) {
        self.fail_sync.store(fail, Ordering::Release);
    }

    /// Returns the bytes of page `pgno`, zero-padded to a full page.
    pub fn page(&self, pgno: PageNo) -> Vec<u8> {
        let mut page = vec![0u8; self.page_size];
        let offset = u64::from(pgno) * self.page_size as u64;
        let _ = self.inner.read_at(offset, &mut page);
        page
    }

    /// Returns how many times the store was fsynced.
    pub fn sync_count(&self) -> u64 {
        self.inner.sync_count()
    }
}

impl BackingStore for RecordingStore {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> StorageResult<usize> {
        self.inner.read_at(offset, buf)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<usize> {
        let pgno = PageNo::try_from(offset / self.page_size as u64)
            .map_err(|_| StorageError::OffsetOutOfRange { offset })?;
        match self.faults.lock().get(&pgno) {
            Some(Fault::ZeroBytes) => return Ok(0),
            Some(Fault::Error) => {
                return Err(StorageError::Io(io::Error::other("injected write failure")));
            }
            None => {}
        }

        let written = self.inner.write_at(offset, data)?;
        self.events.push(Event::PageWrite {
            file: self.name.clone(),
            pgno,
        });
        Ok(written)
    }

    fn sync(&self) -> StorageResult<()> {
        if self.fail_sync.load(Ordering::Acquire) {
            return Err(StorageError::Io(io::Error::other("injected fsync failure")));
        }
        self.inner.sync()?;
        self.events.push(Event::Fsync {
            file: self.name.clone(),
        });
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }
}

impl std::fmt::Debug for RecordingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingStore")
            .field("name", &self.name)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// A log manager that only records flushes.
#[derive(Debug, Default)]
pub struct RecordingLog {
    events: EventLog,
    fail: AtomicBool,
    last: Mutex<Option<Lsn>>,
}

impl RecordingLog {
    /// Creates a log appending to `events`.
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            fail: AtomicBool::new(false),
            last: Mutex::new(None),
        }
    }

    /// Makes flushes fail while `fail` is set.
    pub fn fail_flush(&self, fail: bool) {
        self.fail.store(fail, Ordering::Release);
    }

    /// The LSN argument of the last successful flush.
    pub fn last_flush(&self) -> Option<Option<Lsn>> {
        if self.events.log_flushes() == 0 {
            return None;
        }
        Some(*self.last.lock())
    }
}

impl LogManager for RecordingLog {
    fn flush(&self, lsn: Option<Lsn>) -> PoolResult<()> {
        if self.fail.load(Ordering::Acquire) {
            return Err(PoolError::Io(io::Error::other("injected log flush failure")));
        }
        *self.last.lock() = lsn;
        self.events.push(Event::LogFlush);
        Ok(())
    }
}
