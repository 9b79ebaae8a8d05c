//! Pool and file configuration.

use crate::error::{PoolError, PoolResult};
use std::path::PathBuf;

/// Default page size for files that do not set one.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Configuration for creating a [`crate::MemPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of cache regions the pool is partitioned into.
    pub regions: usize,

    /// Number of buffers each region can hold.
    pub buffers_per_region: usize,

    /// Directory for the backing files of temporary page files.
    /// `None` uses the OS temporary directory.
    pub temp_dir: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            regions: 1,
            buffers_per_region: 256,
            temp_dir: None,
        }
    }
}

impl PoolConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of regions.
    #[must_use]
    pub const fn regions(mut self, regions: usize) -> Self {
        self.regions = regions;
        self
    }

    /// Sets the number of buffers per region.
    #[must_use]
    pub const fn buffers_per_region(mut self, buffers: usize) -> Self {
        self.buffers_per_region = buffers;
        self
    }

    /// Sets the directory for temporary files.
    #[must_use]
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Total number of buffers in the pool.
    #[must_use]
    pub const fn total_buffers(&self) -> usize {
        self.regions * self.buffers_per_region
    }

    /// Checks the configuration for values the pool cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Config`] describing the first problem found.
    pub fn validate(&self) -> PoolResult<()> {
        if self.regions == 0 {
            return Err(PoolError::config("pool needs at least one region"));
        }
        if self.regions > usize::from(u16::MAX) {
            return Err(PoolError::config(format!(
                "too many regions: {}",
                self.regions
            )));
        }
        if self.buffers_per_region == 0 {
            return Err(PoolError::config("regions need at least one buffer"));
        }
        if u32::try_from(self.buffers_per_region).is_err() {
            return Err(PoolError::config(format!(
                "too many buffers per region: {}",
                self.buffers_per_region
            )));
        }
        Ok(())
    }
}

/// Options for registering a file with the pool.
#[derive(Debug, Clone)]
pub struct FileOptions {
    /// Page size in bytes.
    pub page_size: usize,

    /// Whether the handle may only read pages.
    pub readonly: bool,

    /// Whether the file is temporary: never flushed by a per-file sync and
    /// discarded when its last handle closes.
    pub temporary: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            readonly: false,
            temporary: false,
        }
    }
}

impl FileOptions {
    /// Creates default file options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    #[must_use]
    pub const fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Sets whether the handle is read-only.
    #[must_use]
    pub const fn readonly(mut self, value: bool) -> Self {
        self.readonly = value;
        self
    }

    /// Sets whether the file is temporary.
    #[must_use]
    pub const fn temporary(mut self, value: bool) -> Self {
        self.temporary = value;
        self
    }

    pub(crate) fn validate(&self) -> PoolResult<()> {
        if self.page_size == 0 {
            return Err(PoolError::config("page size must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.regions, 1);
        assert!(config.temp_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = PoolConfig::new()
            .regions(4)
            .buffers_per_region(250)
            .temp_dir("/tmp/mpool");

        assert_eq!(config.regions, 4);
        assert_eq!(config.total_buffers(), 1000);
        assert_eq!(config.temp_dir, Some(PathBuf::from("/tmp/mpool")));
    }

    #[test]
    fn zero_regions_rejected() {
        assert!(PoolConfig::new().regions(0).validate().is_err());
        assert!(PoolConfig::new().buffers_per_region(0).validate().is_err());
    }

    #[test]
    fn file_options_builder() {
        let options = FileOptions::new().page_size(512).temporary(true);
        assert_eq!(options.page_size, 512);
        assert!(options.temporary);
        assert!(!options.readonly);
        assert!(FileOptions::new().page_size(0).validate().is_err());
    }
}
