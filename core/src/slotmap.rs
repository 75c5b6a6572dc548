//! Generational raw-id/slot bookkeeping shared by every table schema.
//!
//! This is the reusable core shared by every schema: stable-id ↔ slot maps, the
//! generation counter, and the free list. It knows nothing about column data —
//! callers (the concrete schema tables in `crate::table`) move their own column
//! values when [`SlotMap::free`] reports a donor slot, keeping id/generation
//! bookkeeping separate from column storage.

use crate::codec::{Reader, Writer};

/// What happened to row bookkeeping as a result of [`SlotMap::free`].
///
/// `moved_slot` is `Some(last)` when the row at `last` was swapped down into
/// `freed_slot` to keep live slots contiguous. Callers must copy column data
/// from `moved_slot` into `freed_slot` themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeResult {
    pub freed_slot: u32,
    pub moved_slot: Option<u32>,
}

/// Generational bookkeeping for one table: `raw_to_slot`, `slot_to_packed`,
/// `generation`, and a linked free list over `raw_id`s.
#[derive(Debug, Clone)]
pub struct SlotMap {
    table_id: u16,
    capacity: u32,
    count: u32,
    version: u32,
    next_raw_id: u32,
    free_list_head: i32,
    raw_to_slot: Vec<i32>,
    slot_to_packed: Vec<i32>,
    next_free: Vec<i32>,
    generation: Vec<u16>,
}

impl SlotMap {
    pub fn new(table_id: u16, capacity: u32) -> Self {
        SlotMap {
            table_id,
            capacity,
            count: 0,
            version: 0,
            next_raw_id: 0,
            free_list_head: -1,
            raw_to_slot: vec![-1; capacity as usize],
            slot_to_packed: vec![-1; capacity as usize],
            next_free: vec![-1; capacity as usize],
            generation: vec![0; capacity as usize],
        }
    }

    #[inline]
    pub fn table_id(&self) -> u16 {
        self.table_id
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.capacity
    }

    /// Packs `(gen, raw_id)` for the raw_id currently occupying `slot`, or `None`
    /// if `slot` is not live.
    pub fn raw_id_at_slot(&self, slot: u32) -> Option<u16> {
        let packed = *self.slot_to_packed.get(slot as usize)?;
        if packed < 0 {
            None
        } else {
            Some((packed & 0xFFFF) as u16)
        }
    }

    pub fn generation_of(&self, raw_id: u16) -> u16 {
        self.generation[raw_id as usize]
    }

    /// Reserves a raw_id and slot for a new row. Returns `(raw_id, generation,
    /// slot)`; the caller constructs the `Handle` and clears/initializes its own
    /// column data at `slot`. Returns `None` if the table is at capacity — the
    /// caller decides whether that is `CapacityExhausted` or triggers LRU eviction.
    pub fn try_allocate(&mut self) -> Option<(u16, u16, u32)> {
        let raw_id = if self.free_list_head >= 0 {
            let raw_id = self.free_list_head as u32;
            self.free_list_head = self.next_free[raw_id as usize];
            self.next_free[raw_id as usize] = -1;
            raw_id
        } else if self.next_raw_id < self.capacity {
            let raw_id = self.next_raw_id;
            self.next_raw_id += 1;
            raw_id
        } else {
            return None;
        };

        let slot = self.count;
        self.count += 1;
        let gen = self.generation[raw_id as usize];
        self.slot_to_packed[slot as usize] = ((gen as i32) << 16) | (raw_id as i32);
        self.raw_to_slot[raw_id as usize] = slot as i32;
        self.version += 1;
        Some((raw_id as u16, gen, slot))
    }

    /// Resolves a handle to its live slot, or `None` if stale/out-of-range.
    pub fn get_slot(&self, raw_id: u16, generation: u16) -> Option<u32> {
        let raw_id = raw_id as usize;
        if raw_id >= self.capacity as usize {
            return None;
        }
        if self.generation[raw_id] != generation {
            return None;
        }
        let slot = self.raw_to_slot[raw_id];
        if slot < 0 {
            None
        } else {
            Some(slot as u32)
        }
    }

    /// Frees the row identified by `(raw_id, generation)`. No-op (`None`) if the
    /// handle is already stale. On success, bumps generation, pushes `raw_id`
    /// onto the free list, and reports which slot (if any) was swapped down to
    /// keep live slots contiguous.
    pub fn free(&mut self, raw_id: u16, generation: u16) -> Option<FreeResult> {
        let slot = self.get_slot(raw_id, generation)?;
        let raw_id = raw_id as usize;
        let last = self.count - 1;

        let moved_slot = if slot != last {
            let last_packed = self.slot_to_packed[last as usize];
            let moved_raw_id = (last_packed & 0xFFFF) as usize;
            self.raw_to_slot[moved_raw_id] = slot as i32;
            self.slot_to_packed[slot as usize] = last_packed;
            Some(last)
        } else {
            None
        };

        self.slot_to_packed[last as usize] = -1;
        self.raw_to_slot[raw_id] = -1;
        self.generation[raw_id] = self.generation[raw_id].wrapping_add(1);
        self.next_free[raw_id] = self.free_list_head;
        self.free_list_head = raw_id as i32;
        self.count -= 1;
        self.version += 1;

        Some(FreeResult { freed_slot: slot, moved_slot })
    }

    /// Restores the table to empty, resetting every map and the generation
    /// counter.
    pub fn reset(&mut self) {
        self.count = 0;
        self.next_raw_id = 0;
        self.free_list_head = -1;
        self.raw_to_slot.iter_mut().for_each(|v| *v = -1);
        self.slot_to_packed.iter_mut().for_each(|v| *v = -1);
        self.next_free.iter_mut().for_each(|v| *v = -1);
        self.generation.iter_mut().for_each(|v| *v = 0);
        self.version += 1;
    }

    /// Called by implementations of `spatial_sort`: resorting the spatial
    /// permutation never bumps the version, since row identity and values are
    /// unchanged.
    pub fn touch_without_version_bump(&self) {}

    /// Called once by `Table::load_from` after `load_meta_from`: loading a
    /// snapshot changes the row set even though the restored meta doesn't
    /// itself carry a "this changed" flag.
    pub fn bump_version_for_load(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub fn save_meta_to(&self, w: &mut Writer) {
        w.write(&(self.count as i32));
        w.write(&(self.next_raw_id as i32));
        w.write(&self.free_list_head);
        for v in &self.raw_to_slot {
            w.write(v);
        }
        for v in &self.slot_to_packed {
            w.write(v);
        }
        for v in &self.next_free {
            w.write(v);
        }
        for v in &self.generation {
            w.write(&(*v as i32));
        }
    }

    pub fn load_meta_from(&mut self, r: &mut Reader) {
        self.count = r.read::<i32>(4) as u32;
        self.next_raw_id = r.read::<i32>(4) as u32;
        self.free_list_head = r.read::<i32>(4);
        for v in self.raw_to_slot.iter_mut() {
            *v = r.read::<i32>(4);
        }
        for v in self.slot_to_packed.iter_mut() {
            *v = r.read::<i32>(4);
        }
        for v in self.next_free.iter_mut() {
            *v = r.read::<i32>(4);
        }
        for v in self.generation.iter_mut() {
            *v = r.read::<i32>(4) as u16;
        }
    }
}
