//! Stress harnesses for concurrent page writers and checkpoints.

use crate::fixtures::PoolFixture;
use mpool_core::{FileHandle, PageNo, SyncStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Configuration for a contention run.
#[derive(Debug, Clone)]
pub struct ContentionConfig {
    /// Writer threads; each owns a disjoint page range in every file.
    pub writers: usize,
    /// Pages per writer per file.
    pub pages_per_writer: PageNo,
    /// Times each writer rewrites its pages.
    pub rounds: usize,
    /// Cache-wide syncs issued while the writers run.
    pub checkpoints: usize,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            writers: 4,
            pages_per_writer: 8,
            rounds: 50,
            checkpoints: 20,
        }
    }
}

impl ContentionConfig {
    /// Pages the run touches across `files` files.
    pub fn pages(&self, files: usize) -> usize {
        self.writers * self.pages_per_writer as usize * files
    }
}

/// Result of a contention run.
#[derive(Debug, Clone)]
pub struct ContentionResult {
    /// Page modifications performed.
    pub page_updates: usize,
    /// Checkpoints that returned [`SyncStatus::Complete`].
    pub complete: usize,
    /// Checkpoints that returned [`SyncStatus::Incomplete`].
    pub incomplete: usize,
    /// Operations that returned an error.
    pub errors: usize,
    /// Wall time of the run.
    pub duration: Duration,
}

impl ContentionResult {
    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Page updates: {}", self.page_updates);
        println!("Checkpoints: {} complete, {} incomplete", self.complete, self.incomplete);
        println!("Errors: {}", self.errors);
        println!("Duration: {:?}", self.duration);
    }
}

/// Runs writers against `files` while another thread checkpoints.
///
/// The cache must hold every page the run touches
/// ([`ContentionConfig::pages`]), or writers will see full regions.
pub fn run_checkpoint_contention(
    fixture: &PoolFixture,
    files: &[FileHandle],
    config: &ContentionConfig,
) -> ContentionResult {
    let pool = &fixture.pool;
    let updates = AtomicUsize::new(0);
    let errors = AtomicUsize::new(0);
    let complete = AtomicUsize::new(0);
    let incomplete = AtomicUsize::new(0);

    let start = Instant::now();
    thread::scope(|s| {
        for writer in 0..config.writers {
            let updates = &updates;
            let errors = &errors;
            s.spawn(move || {
                let first = writer as PageNo * config.pages_per_writer;
                for round in 0..config.rounds {
                    for file in files {
                        for pgno in first..first + config.pages_per_writer {
                            let result = pool.get_page(file, pgno).and_then(|page| {
                                page.write(|bytes| bytes[0] = round as u8)?;
                                page.release()
                            });
                            match result {
                                Ok(()) => updates.fetch_add(1, Ordering::Relaxed),
                                Err(_) => errors.fetch_add(1, Ordering::Relaxed),
                            };
                        }
                    }
                }
            });
        }

        let (complete, incomplete, errors) = (&complete, &incomplete, &errors);
        s.spawn(move || {
            for _ in 0..config.checkpoints {
                match pool.sync(None) {
                    Ok(SyncStatus::Complete) => complete.fetch_add(1, Ordering::Relaxed),
                    Ok(SyncStatus::Incomplete) => incomplete.fetch_add(1, Ordering::Relaxed),
                    Err(_) => errors.fetch_add(1, Ordering::Relaxed),
                };
                thread::yield_now();
            }
        });
    });

    ContentionResult {
        page_updates: updates.into_inner(),
        complete: complete.into_inner(),
        incomplete: incomplete.into_inner(),
        errors: errors.into_inner(),
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_contention_run() {
        let config = ContentionConfig {
            writers: 2,
            pages_per_writer: 4,
            rounds: 10,
            checkpoints: 5,
        };
        let fixture = PoolFixture::new(2, 16);
        let (file, _) = fixture.open("a.db");
        let files = [file];

        let result = run_checkpoint_contention(&fixture, &files, &config);
        assert_eq!(result.errors, 0);
        assert_eq!(result.page_updates, 2 * 4 * 10);
        assert_eq!(result.complete + result.incomplete, 5);
    }
}
