//! Checkpoint and write-back counters.
//!
//! All counters are atomic and may be read while a checkpoint is running.
//!
//! ```rust
//! use mpool_core::{MemPool, PoolConfig};
//!
//! let pool = MemPool::new(PoolConfig::new()).unwrap();
//! let _ = pool.sync(None).unwrap();
//!
//! let stats = pool.stats().snapshot();
//! assert_eq!(stats.cache_syncs, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Page cache synchronization statistics.
#[derive(Debug, Default)]
pub struct SyncStats {
    // Entry points
    /// Cache-wide sync calls.
    cache_syncs: AtomicU64,
    /// Per-file sync calls.
    file_syncs: AtomicU64,
    /// Cache-wide syncs answered from the previous checkpoint.
    progress_queries: AtomicU64,

    // Write-back
    /// Pages written to their backing store.
    pages_written: AtomicU64,
    /// Pinned pages left to their last holder.
    pages_skipped: AtomicU64,
    /// Passes cut short by a full pin set.
    pin_set_exhausted: AtomicU64,
    /// Second passes started.
    retries: AtomicU64,
    /// Log flushes issued by checkpoints.
    log_flushes: AtomicU64,
    /// Backing store fsyncs.
    fsyncs: AtomicU64,
    /// Buffers evicted to make room.
    evictions: AtomicU64,

    /// Syncs that failed.
    errors: AtomicU64,
}

impl SyncStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_cache_sync(&self) {
        self.cache_syncs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_file_sync(&self) {
        self.file_syncs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_progress_query(&self) {
        self.progress_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_page_written(&self) {
        self.pages_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_page_skipped(&self) {
        self.pages_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pin_set_exhausted(&self) {
        self.pin_set_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_log_flush(&self) {
        self.log_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fsync(&self) {
        self.fsyncs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of pages written.
    pub fn pages_written(&self) -> u64 {
        self.pages_written.load(Ordering::Relaxed)
    }

    /// Returns the number of checkpoint log flushes.
    pub fn log_flushes(&self) -> u64 {
        self.log_flushes.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            cache_syncs: self.cache_syncs.load(Ordering::Relaxed),
            file_syncs: self.file_syncs.load(Ordering::Relaxed),
            progress_queries: self.progress_queries.load(Ordering::Relaxed),
            pages_written: self.pages_written(),
            pages_skipped: self.pages_skipped.load(Ordering::Relaxed),
            pin_set_exhausted: self.pin_set_exhausted.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            log_flushes: self.log_flushes(),
            fsyncs: self.fsyncs.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`SyncStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStatsSnapshot {
    /// Cache-wide sync calls.
    pub cache_syncs: u64,
    /// Per-file sync calls.
    pub file_syncs: u64,
    /// Cache-wide syncs answered from the previous checkpoint.
    pub progress_queries: u64,
    /// Pages written to their backing store.
    pub pages_written: u64,
    /// Pinned pages left to their last holder.
    pub pages_skipped: u64,
    /// Passes cut short by a full pin set.
    pub pin_set_exhausted: u64,
    /// Second passes started.
    pub retries: u64,
    /// Log flushes issued by checkpoints.
    pub log_flushes: u64,
    /// Backing store fsyncs.
    pub fsyncs: u64,
    /// Buffers evicted to make room.
    pub evictions: u64,
    /// Syncs that failed.
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = SyncStats::new();
        assert_eq!(stats.snapshot(), SyncStatsSnapshot::default());
    }

    #[test]
    fn record_and_snapshot() {
        let stats = SyncStats::new();
        stats.record_cache_sync();
        stats.record_page_written();
        stats.record_page_written();
        stats.record_log_flush();
        stats.record_retry();

        let snap = stats.snapshot();
        assert_eq!(snap.cache_syncs, 1);
        assert_eq!(snap.pages_written, 2);
        assert_eq!(snap.log_flushes, 1);
        assert_eq!(snap.retries, 1);
        assert_eq!(snap.errors, 0);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(SyncStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_page_written();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.pages_written(), 800);
    }
}
