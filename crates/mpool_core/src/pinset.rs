//! The pin set: buffers pinned by a sync pass for writing.

use crate::error::{PoolError, PoolResult};
use crate::pool::{MemPool, Primary};
use crate::types::{FileId, PageNo, RegionId, SlotId};
use parking_lot::MutexGuard;
use std::cmp::Ordering;

/// Smallest pin set ever allocated.
pub(crate) const MIN_PINS: usize = 10;

/// Number of pin slots for a cache holding `ndirty` dirty and `nclean`
/// clean buffers.
///
/// Half again the dirty count plus some slack for pages dirtied while the
/// set is filled, capped at 80% of the cache but never below [`MIN_PINS`].
pub(crate) fn pin_capacity(ndirty: usize, nclean: usize) -> usize {
    let maxpin = ((ndirty + nclean) * 8 / 10).max(MIN_PINS);
    (ndirty + ndirty / 2 + MIN_PINS).min(maxpin)
}

/// A buffer pinned by a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PinnedBuffer {
    pub(crate) file: FileId,
    pub(crate) pgno: PageNo,
    pub(crate) region: RegionId,
    pub(crate) slot: SlotId,
}

/// Write order: by file, then by page number.
pub(crate) fn compare(a: &PinnedBuffer, b: &PinnedBuffer) -> Ordering {
    if std::ptr::eq(a, b) {
        return Ordering::Equal;
    }
    a.file.cmp(&b.file).then_with(|| a.pgno.cmp(&b.pgno))
}

/// Fixed-capacity list of pinned buffers.
#[derive(Debug)]
pub(crate) struct PinSet {
    entries: Vec<PinnedBuffer>,
    capacity: usize,
}

impl PinSet {
    pub(crate) fn with_capacity(capacity: usize) -> PoolResult<Self> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity)
            .map_err(|_| PoolError::OutOfMemory {
                requested: capacity,
            })?;
        Ok(Self { entries, capacity })
    }

    /// Appends an entry and returns true if the set is now full.
    pub(crate) fn push(&mut self, entry: PinnedBuffer) -> bool {
        debug_assert!(self.entries.len() < self.capacity, "pin set overflow");
        self.entries.push(entry);
        self.entries.len() >= self.capacity
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn entries(&self) -> &[PinnedBuffer] {
        &self.entries
    }

    /// Sorts into write order. Runs with no lock held.
    pub(crate) fn sort(&mut self) {
        if self.entries.len() > 1 {
            self.entries.sort_by(compare);
        }
    }
}

/// Result of sizing and allocating a pin set.
pub(crate) enum Allocation<'a> {
    /// Nothing in the cache is dirty; the primary lock has been released.
    Empty,
    /// A pin set and the re-acquired primary lock.
    Ready(PinSet, MutexGuard<'a, Primary>),
}

impl MemPool {
    /// Sizes and allocates a pin set.
    ///
    /// Called with the primary lock held. The lock is released for the
    /// allocation and re-acquired before returning [`Allocation::Ready`];
    /// on error it is left released.
    pub(crate) fn allocate_pins<'a>(
        &'a self,
        primary: MutexGuard<'a, Primary>,
    ) -> PoolResult<Allocation<'a>> {
        let mut ndirty = primary.region.page_dirty();
        let mut nclean = primary.region.page_clean();
        for region in &self.secondary {
            let region = region.lock();
            ndirty += region.page_dirty();
            nclean += region.page_clean();
        }
        drop(primary);

        if ndirty == 0 {
            return Ok(Allocation::Empty);
        }

        let pins = PinSet::with_capacity(pin_capacity(ndirty, nclean))?;
        Ok(Allocation::Ready(pins, self.primary.lock()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(file: u32, pgno: PageNo) -> PinnedBuffer {
        PinnedBuffer {
            file: FileId::new(file),
            pgno,
            region: RegionId::PRIMARY,
            slot: SlotId(pgno),
        }
    }

    #[test]
    fn capacity_boundaries() {
        assert_eq!(pin_capacity(0, 0), 10);
        assert_eq!(pin_capacity(1, 0), 10);
        assert_eq!(pin_capacity(100, 0), 80);
        assert_eq!(pin_capacity(100, 1000), 160);
        assert_eq!(pin_capacity(10, 2), 10);
    }

    #[test]
    fn push_reports_full() {
        let mut pins = PinSet::with_capacity(2).unwrap();
        assert!(!pins.push(entry(0, 1)));
        assert!(pins.push(entry(0, 2)));
        assert_eq!(pins.len(), pins.capacity());

        pins.clear();
        assert!(pins.is_empty());
    }

    #[test]
    fn compare_orders_by_file_then_page() {
        assert_eq!(compare(&entry(1, 9), &entry(2, 0)), Ordering::Less);
        assert_eq!(compare(&entry(2, 0), &entry(1, 9)), Ordering::Greater);
        assert_eq!(compare(&entry(1, 3), &entry(1, 4)), Ordering::Less);
        assert_eq!(compare(&entry(1, 3), &entry(1, 3)), Ordering::Equal);

        let e = entry(4, 4);
        assert_eq!(compare(&e, &e), Ordering::Equal);
    }

    #[test]
    fn sort_orders_entries() {
        let mut pins = PinSet::with_capacity(4).unwrap();
        pins.push(entry(2, 1));
        pins.push(entry(1, 7));
        pins.push(entry(1, 3));

        pins.sort();
        let order: Vec<_> = pins.entries().iter().map(|e| (e.file.0, e.pgno)).collect();
        assert_eq!(order, vec![(1, 3), (1, 7), (2, 1)]);
    }

    proptest! {
        #[test]
        fn capacity_bounds(ndirty in 0usize..100_000, nclean in 0usize..100_000) {
            let n = pin_capacity(ndirty, nclean);
            prop_assert!(n >= MIN_PINS);
            prop_assert!(n <= ndirty + ndirty / 2 + MIN_PINS);
            prop_assert!(n <= ((ndirty + nclean) * 8 / 10).max(MIN_PINS));
        }

        #[test]
        fn sorted_entries_are_ordered(keys in proptest::collection::vec((0u32..4, 0u32..64), 0..50)) {
            let mut pins = PinSet::with_capacity(keys.len().max(1)).unwrap();
            for (file, pgno) in &keys {
                pins.push(entry(*file, *pgno));
            }
            pins.sort();
            for pair in pins.entries().windows(2) {
                prop_assert_ne!(compare(&pair[0], &pair[1]), Ordering::Greater);
            }
        }
    }
}
