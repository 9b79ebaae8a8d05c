//! Core type definitions for the page cache.

use std::fmt;

/// Page number within a file.
pub type PageNo = u32;

/// Log sequence number.
///
/// An LSN names a position in the write-ahead log as a (log file, offset)
/// pair. Ordering is lexicographic, which is exactly how two LSNs compare
/// in the log. The all-zero LSN means "no position".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lsn {
    /// Log file number, starting at 1.
    pub file: u32,
    /// Byte offset within the log file.
    pub offset: u32,
}

impl Lsn {
    /// The zero LSN.
    pub const ZERO: Self = Self { file: 0, offset: 0 };

    /// Creates a new LSN.
    #[must_use]
    pub const fn new(file: u32, offset: u32) -> Self {
        Self { file, offset }
    }

    /// Returns true if this is the zero LSN.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.file == 0
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.file, self.offset)
    }
}

/// Identifier of a file registered with the pool.
///
/// File ids are handed out in registration order and never reused, so they
/// are the primary sort key when a flush orders its writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u32);

impl FileId {
    /// Creates a new file ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file:{}", self.0)
    }
}

/// Index of a cache region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub u16);

impl RegionId {
    /// The primary region; its lock also guards the pool-wide checkpoint state.
    pub const PRIMARY: Self = Self(0);

    /// Creates a new region ID.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the region index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns true for the primary region.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region:{}", self.0)
    }
}

/// Stable handle of a buffer header inside its region's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub u32);

impl SlotId {
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Outcome of a flush that did not fail.
///
/// `Incomplete` is a normal, retryable outcome: some buffers were pinned by
/// other threads and will be written when they are released, or could not
/// be flushed this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SyncStatus {
    /// Every buffer the flush was responsible for is on disk.
    Complete,
    /// Some buffers are still outstanding; call again later.
    Incomplete,
}

impl SyncStatus {
    /// Returns true for [`SyncStatus::Complete`].
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }

    pub(crate) const fn from_pending(pending: u32) -> Self {
        if pending == 0 {
            Self::Complete
        } else {
            Self::Incomplete
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => f.write_str("complete"),
            Self::Incomplete => f.write_str("incomplete"),
        }
    }
}
