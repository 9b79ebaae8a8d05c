//! Shared output for the sync commands.

use mpool_core::{MemPool, RegionStats, SyncStatsSnapshot, SyncStatus};
use serde::Serialize;
use std::path::Path;

/// Outcome of a sync command.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    /// Pool directory.
    pub path: String,
    /// Command that produced the report.
    pub operation: &'static str,
    /// Pages dirtied before syncing.
    pub pages_dirtied: usize,
    /// `complete` or `incomplete`.
    pub status: String,
    /// Checkpoint LSN, for checkpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lsn: Option<String>,
    /// Pool counters after the sync.
    pub stats: StatsReport,
    /// Per-region buffer counts.
    pub regions: Vec<RegionReport>,
}

impl SyncReport {
    /// Collects the pool's counters after `status` was returned.
    pub fn new(
        path: &Path,
        operation: &'static str,
        pages_dirtied: usize,
        status: SyncStatus,
        pool: &MemPool,
    ) -> Self {
        Self {
            path: path.display().to_string(),
            operation,
            pages_dirtied,
            status: status.to_string(),
            lsn: None,
            stats: pool.stats().snapshot().into(),
            regions: pool.region_stats().iter().map(RegionReport::from).collect(),
        }
    }

    /// Prints the report as text or, with `format == "json"`, as JSON.
    pub fn print(&self, format: &str) -> Result<(), Box<dyn std::error::Error>> {
        match format {
            "json" => println!("{}", serde_json::to_string_pretty(self)?),
            _ => self.print_text(),
        }
        Ok(())
    }

    fn print_text(&self) {
        println!("mpool {}", self.operation);
        println!("==========================");
        println!();
        println!("Path:   {}", self.path);
        println!("Status: {}", self.status);
        if let Some(lsn) = &self.lsn {
            println!("LSN:    {}", lsn);
        }
        println!();
        println!("Pages:");
        println!("  Dirtied:   {}", self.pages_dirtied);
        println!("  Written:   {}", self.stats.pages_written);
        println!("  Skipped:   {}", self.stats.pages_skipped);
        println!("  Evicted:   {}", self.stats.evictions);
        println!();
        println!("Sync:");
        println!("  Log flushes:      {}", self.stats.log_flushes);
        println!("  Fsyncs:           {}", self.stats.fsyncs);
        println!("  Pin set refills:  {}", self.stats.pin_set_exhausted);
        println!("  Errors:           {}", self.stats.errors);
        println!();
        println!("Regions:");
        for region in &self.regions {
            println!(
                "  [{}] {}/{} buffers, {} dirty",
                region.region, region.pages, region.capacity, region.dirty
            );
        }
    }
}

/// Serializable copy of [`SyncStatsSnapshot`].
#[derive(Debug, Serialize)]
pub struct StatsReport {
    /// Cache-wide sync calls.
    pub cache_syncs: u64,
    /// Per-file sync calls.
    pub file_syncs: u64,
    /// Pages written.
    pub pages_written: u64,
    /// Pinned pages left to their holder.
    pub pages_skipped: u64,
    /// Passes cut short by a full pin set.
    pub pin_set_exhausted: u64,
    /// Log flushes.
    pub log_flushes: u64,
    /// Fsyncs.
    pub fsyncs: u64,
    /// Evictions.
    pub evictions: u64,
    /// Failed syncs.
    pub errors: u64,
}

impl From<SyncStatsSnapshot> for StatsReport {
    fn from(s: SyncStatsSnapshot) -> Self {
        Self {
            cache_syncs: s.cache_syncs,
            file_syncs: s.file_syncs,
            pages_written: s.pages_written,
            pages_skipped: s.pages_skipped,
            pin_set_exhausted: s.pin_set_exhausted,
            log_flushes: s.log_flushes,
            fsyncs: s.fsyncs,
            evictions: s.evictions,
            errors: s.errors,
        }
    }
}

/// Buffer counts of one region.
#[derive(Debug, Serialize)]
pub struct RegionReport {
    /// Region index.
    pub region: u16,
    /// Buffers the region can hold.
    pub capacity: usize,
    /// Buffers in use.
    pub pages: usize,
    /// Dirty buffers.
    pub dirty: usize,
}

impl From<&RegionStats> for RegionReport {
    fn from(stats: &RegionStats) -> Self {
        Self {
            region: stats.region,
            capacity: stats.capacity,
            pages: stats.pages(),
            dirty: stats.page_dirty,
        }
    }
}
