//! Cache regions: lock-partitioned slices of the buffer pool.
//!
//! A [`Region`] is a plain value. The pool keeps each one behind its own
//! mutex, so holding `&mut Region` is the proof that the region lock is held
//! and every buffer header mutation goes through it.

use crate::buffer::{BufferHeader, BufferInfo};
use crate::types::{FileId, PageNo, RegionId, SlotId};
use std::collections::{HashMap, VecDeque};
use std::ops::ControlFlow;

/// Page counters of one region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionStats {
    /// Region index.
    pub region: u16,
    /// Buffers the region can hold.
    pub capacity: usize,
    /// Dirty buffers.
    pub page_dirty: usize,
    /// Clean buffers.
    pub page_clean: usize,
}

impl RegionStats {
    /// Buffers currently in use.
    #[must_use]
    pub const fn pages(&self) -> usize {
        self.page_dirty + self.page_clean
    }
}

/// Victim chosen by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Victim {
    Clean(SlotId),
    Dirty(SlotId),
}

/// One partition of the cache.
#[derive(Debug)]
pub(crate) struct Region {
    id: RegionId,
    slots: Vec<Option<BufferHeader>>,
    free: Vec<SlotId>,
    /// LRU order, coldest first.
    queue: VecDeque<SlotId>,
    index: HashMap<(FileId, PageNo), SlotId>,
    page_dirty: usize,
    page_clean: usize,
}

impl Region {
    pub(crate) fn new(id: RegionId, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        // Popped from the back, so slot 0 is handed out first.
        let free = (0..capacity as u32).rev().map(SlotId).collect();
        Self {
            id,
            slots,
            free,
            queue: VecDeque::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            page_dirty: 0,
            page_clean: 0,
        }
    }

    pub(crate) fn id(&self) -> RegionId {
        self.id
    }

    pub(crate) fn stats(&self) -> RegionStats {
        RegionStats {
            region: self.id.0,
            capacity: self.slots.len(),
            page_dirty: self.page_dirty,
            page_clean: self.page_clean,
        }
    }

    pub(crate) fn page_dirty(&self) -> usize {
        self.page_dirty
    }

    pub(crate) fn page_clean(&self) -> usize {
        self.page_clean
    }

    pub(crate) fn lookup(&self, file: FileId, pgno: PageNo) -> Option<SlotId> {
        self.index.get(&(file, pgno)).copied()
    }

    pub(crate) fn buffer(&self, slot: SlotId) -> Option<&BufferHeader> {
        self.slots.get(slot.index()).and_then(Option::as_ref)
    }

    pub(crate) fn buffer_mut(&mut self, slot: SlotId) -> Option<&mut BufferHeader> {
        self.slots.get_mut(slot.index()).and_then(Option::as_mut)
    }

    pub(crate) fn has_free_slot(&self) -> bool {
        !self.free.is_empty()
    }

    /// Places a buffer in a free slot at the hot end of the queue.
    ///
    /// Returns `None` when the region is full.
    pub(crate) fn insert(&mut self, bh: BufferHeader) -> Option<SlotId> {
        let slot = self.free.pop()?;
        if bh.flags.dirty {
            self.page_dirty += 1;
        } else {
            self.page_clean += 1;
        }
        self.index.insert((bh.file, bh.pgno), slot);
        self.slots[slot.index()] = Some(bh);
        self.queue.push_back(slot);
        Some(slot)
    }

    /// Removes a buffer from the region.
    pub(crate) fn remove(&mut self, slot: SlotId) -> Option<BufferHeader> {
        let bh = self.slots.get_mut(slot.index())?.take()?;
        if bh.flags.dirty {
            self.page_dirty -= 1;
        } else {
            self.page_clean -= 1;
        }
        self.index.remove(&(bh.file, bh.pgno));
        if let Some(pos) = self.queue.iter().position(|&s| s == slot) {
            self.queue.remove(pos);
        }
        self.free.push(slot);
        Some(bh)
    }

    /// Moves a buffer to the hot end of the queue.
    pub(crate) fn touch(&mut self, slot: SlotId) {
        if let Some(pos) = self.queue.iter().position(|&s| s == slot) {
            self.queue.remove(pos);
            self.queue.push_back(slot);
        }
    }

    pub(crate) fn set_dirty(&mut self, slot: SlotId) {
        if let Some(bh) = self.slots.get_mut(slot.index()).and_then(Option::as_mut) {
            if !bh.flags.dirty {
                bh.flags.dirty = true;
                self.page_dirty += 1;
                self.page_clean -= 1;
            }
        }
    }

    pub(crate) fn set_clean(&mut self, slot: SlotId) {
        if let Some(bh) = self.slots.get_mut(slot.index()).and_then(Option::as_mut) {
            if bh.flags.dirty {
                bh.flags.dirty = false;
                self.page_dirty -= 1;
                self.page_clean += 1;
            }
        }
    }

    /// Walks buffers in queue order until `f` breaks.
    pub(crate) fn for_each_queued<F>(&mut self, mut f: F) -> ControlFlow<()>
    where
        F: FnMut(SlotId, &mut BufferHeader) -> ControlFlow<()>,
    {
        for &slot in &self.queue {
            if let Some(bh) = self.slots[slot.index()].as_mut() {
                f(slot, bh)?;
            }
        }
        ControlFlow::Continue(())
    }

    /// Picks the coldest evictable buffer, preferring clean ones.
    pub(crate) fn victim(&self) -> Option<Victim> {
        let mut dirty = None;
        for &slot in &self.queue {
            let Some(bh) = self.slots[slot.index()].as_ref() else {
                continue;
            };
            if !bh.is_evictable() {
                continue;
            }
            if !bh.flags.dirty {
                return Some(Victim::Clean(slot));
            }
            dirty.get_or_insert(Victim::Dirty(slot));
        }
        dirty
    }

    pub(crate) fn infos(&self) -> impl Iterator<Item = BufferInfo> + '_ {
        self.queue.iter().filter_map(move |&slot| {
            self.slots[slot.index()].as_ref().map(|bh| BufferInfo {
                region: self.id,
                file: bh.file,
                pgno: bh.pgno,
                refcount: bh.refcount,
                flags: bh.flags,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(file: u32, pgno: PageNo) -> BufferHeader {
        BufferHeader::new(FileId::new(file), pgno, vec![0u8; 8].into_boxed_slice())
    }

    #[test]
    fn insert_and_lookup() {
        let mut region = Region::new(RegionId::new(1), 4);
        let slot = region.insert(page(0, 7)).unwrap();

        assert_eq!(region.lookup(FileId::new(0), 7), Some(slot));
        assert_eq!(region.lookup(FileId::new(0), 8), None);
        assert_eq!(region.page_clean(), 1);
        assert_eq!(region.buffer(slot).unwrap().pgno, 7);
    }

    #[test]
    fn full_region_refuses_insert() {
        let mut region = Region::new(RegionId::new(0), 1);
        assert!(region.insert(page(0, 1)).is_some());
        assert!(!region.has_free_slot());
        assert!(region.insert(page(0, 2)).is_none());
    }

    #[test]
    fn dirty_counters_follow_flags() {
        let mut region = Region::new(RegionId::new(0), 4);
        let a = region.insert(page(0, 1)).unwrap();
        region.insert(page(0, 2)).unwrap();

        region.set_dirty(a);
        region.set_dirty(a);
        assert_eq!((region.page_dirty(), region.page_clean()), (1, 1));

        region.set_clean(a);
        assert_eq!((region.page_dirty(), region.page_clean()), (0, 2));

        region.set_dirty(a);
        region.remove(a).unwrap();
        assert_eq!((region.page_dirty(), region.page_clean()), (0, 1));
        assert_eq!(region.lookup(FileId::new(0), 1), None);
        assert!(region.has_free_slot());
    }

    #[test]
    fn victim_prefers_coldest_clean() {
        let mut region = Region::new(RegionId::new(0), 4);
        let a = region.insert(page(0, 1)).unwrap();
        let b = region.insert(page(0, 2)).unwrap();
        let c = region.insert(page(0, 3)).unwrap();

        region.set_dirty(a);
        region.buffer_mut(b).unwrap().pin();
        assert_eq!(region.victim(), Some(Victim::Clean(c)));

        region.buffer_mut(c).unwrap().flags.sync = true;
        assert_eq!(region.victim(), Some(Victim::Dirty(a)));

        region.buffer_mut(a).unwrap().pin();
        assert_eq!(region.victim(), None);
    }

    #[test]
    fn touch_moves_to_hot_end() {
        let mut region = Region::new(RegionId::new(0), 4);
        let a = region.insert(page(0, 1)).unwrap();
        let b = region.insert(page(0, 2)).unwrap();

        region.touch(a);
        let order: Vec<PageNo> = region.infos().map(|i| i.pgno).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(region.victim(), Some(Victim::Clean(b)));
    }

    #[test]
    fn for_each_queued_stops_on_break() {
        let mut region = Region::new(RegionId::new(0), 4);
        for pgno in 0..4 {
            region.insert(page(0, pgno)).unwrap();
        }

        let mut seen = 0;
        let flow = region.for_each_queued(|_, bh| {
            seen += 1;
            if bh.pgno == 1 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(flow, ControlFlow::Break(()));
        assert_eq!(seen, 2);
    }
}
