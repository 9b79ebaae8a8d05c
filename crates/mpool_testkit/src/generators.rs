//! Property-based test generators using proptest.

use mpool_core::PageNo;
use proptest::prelude::*;

/// A dirty page: file index into the caller's file list, and page number.
pub type PageRef = (usize, PageNo);

/// Strategy for a pool shape: regions and buffers per region.
pub fn pool_shape_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..=4, 4usize..=32)
}

/// Strategy for distinct pages spread over `files` files.
pub fn page_set_strategy(files: usize, max_pgno: PageNo, max_pages: usize) -> impl Strategy<Value = Vec<PageRef>> {
    prop::collection::btree_set((0..files, 0..max_pgno), 0..=max_pages)
        .prop_map(|set| set.into_iter().collect())
}

/// One step of a single-threaded cache workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Dirty a page and release it.
    Dirty(PageRef),
    /// Dirty a page and keep it pinned.
    Pin(PageRef),
    /// Release the pin at this index (modulo the number of pins held).
    Release(usize),
    /// Cache-wide sync.
    Sync,
    /// Flush one file.
    SyncFile(usize),
}

/// Strategy for a workload over `files` files.
pub fn op_strategy(files: usize, max_pgno: PageNo) -> impl Strategy<Value = Op> {
    let page = (0..files, 0..max_pgno);
    prop_oneof![
        4 => page.clone().prop_map(Op::Dirty),
        1 => page.prop_map(Op::Pin),
        2 => any::<usize>().prop_map(Op::Release),
        1 => Just(Op::Sync),
        1 => (0..files).prop_map(Op::SyncFile),
    ]
}

/// Strategy for a sequence of workload steps.
pub fn workload_strategy(files: usize, max_pgno: PageNo, len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(files, max_pgno), 1..=len)
}
