//! `Damageable` union: `{position: FxVec2, health: i32}` over `unit` and
//! `building`, the two spatial schemas that both expose those fields.
//!
//! Participants are explicitly listed (`unit`, `building`) rather than
//! auto-discovered by field-name/type matching: true reflection-based
//! discovery would need either proc-macros or a runtime schema registry, both
//! ruled out for this fixed-schema crate.
//!
//! `UnionRef` carries a [`Handle`] rather than a live `&mut` borrow into its
//! originating table: every accessor re-resolves through `World`, which lets
//! `free` dispatch through the world's table map and sidesteps the aliasing
//! problem of trying to hand out simultaneous mutable column references
//! across two different tables from one iterator.

use log::warn;

use crate::fixed::FxVec2;
use crate::handle::Handle;
use crate::table::{BUILDING_TABLE, UNIT_TABLE};
use crate::world::World;

/// One live row from either participant, identified by its stable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnionRef {
    handle: Handle,
}

impl UnionRef {
    fn new(handle: Handle) -> Self {
        UnionRef { handle }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn is_unit(&self) -> bool {
        self.handle.table_id() == UNIT_TABLE
    }

    pub fn is_building(&self) -> bool {
        self.handle.table_id() == BUILDING_TABLE
    }

    /// `None` if the underlying handle has gone stale since this `UnionRef`
    /// was obtained — a routine, silent condition, never a panic.
    pub fn position(&self, world: &World) -> Option<FxVec2> {
        match self.handle.table_id() {
            UNIT_TABLE => world.units.get_slot(self.handle).map(|slot| world.units.position(slot)),
            BUILDING_TABLE => world.buildings.get_slot(self.handle).map(|slot| world.buildings.position(slot)),
            other => unreachable!("unexpected participant table_id {other}"),
        }
    }

    /// No-op if the underlying handle has gone stale since this `UnionRef`
    /// was obtained. Returns whether the write happened.
    pub fn set_position(&self, world: &mut World, value: FxVec2) -> bool {
        let handle = self.handle;
        match handle.table_id() {
            UNIT_TABLE => match world.units.get_slot(handle) {
                Some(slot) => {
                    world.units.set_position(slot, value);
                    true
                }
                None => {
                    warn!("union ref set_position: stale handle {handle:?}, ignoring");
                    false
                }
            },
            BUILDING_TABLE => match world.buildings.get_slot(handle) {
                Some(slot) => {
                    world.buildings.set_position(slot, value);
                    true
                }
                None => {
                    warn!("union ref set_position: stale handle {handle:?}, ignoring");
                    false
                }
            },
            other => unreachable!("unexpected participant table_id {other}"),
        }
    }

    /// `None` if the underlying handle has gone stale since this `UnionRef`
    /// was obtained — a routine, silent condition, never a panic.
    pub fn health(&self, world: &World) -> Option<i32> {
        match self.handle.table_id() {
            UNIT_TABLE => world.units.get_slot(self.handle).map(|slot| world.units.health(slot)),
            BUILDING_TABLE => world.buildings.get_slot(self.handle).map(|slot| world.buildings.health(slot)),
            other => unreachable!("unexpected participant table_id {other}"),
        }
    }

    /// No-op if the underlying handle has gone stale since this `UnionRef`
    /// was obtained. Returns whether the write happened.
    pub fn set_health(&self, world: &mut World, value: i32) -> bool {
        let handle = self.handle;
        match handle.table_id() {
            UNIT_TABLE => match world.units.get_slot(handle) {
                Some(slot) => {
                    world.units.set_health(slot, value);
                    true
                }
                None => {
                    warn!("union ref set_health: stale handle {handle:?}, ignoring");
                    false
                }
            },
            BUILDING_TABLE => match world.buildings.get_slot(handle) {
                Some(slot) => {
                    world.buildings.set_health(slot, value);
                    true
                }
                None => {
                    warn!("union ref set_health: stale handle {handle:?}, ignoring");
                    false
                }
            },
            other => unreachable!("unexpected participant table_id {other}"),
        }
    }

    /// Frees the underlying row by dispatching through the world's
    /// `table_id → table` map.
    pub fn free(&self, world: &mut World) -> bool {
        world.table_mut(self.handle.table_id()).free_raw(self.handle.raw_id(), self.handle.generation())
    }
}

/// A per-participant contiguous view, suitable for vectorized loops over one
/// table at a time.
pub enum TableChunk<'a> {
    Unit { count: u32, positions: &'a [FxVec2], healths: &'a [i32] },
    Building { count: u32, positions: &'a [FxVec2], healths: &'a [i32] },
}

impl<'a> TableChunk<'a> {
    pub fn count(&self) -> u32 {
        match self {
            TableChunk::Unit { count, .. } => *count,
            TableChunk::Building { count, .. } => *count,
        }
    }
}

/// Yields one [`UnionRef`] per live row across both participants, in
/// participant-declaration order (`unit` then `building`) then slot order.
pub fn iter(world: &World) -> impl Iterator<Item = UnionRef> + '_ {
    let units = (0..world.units.count()).filter_map(move |slot| world.units.handle_at_slot(slot)).map(UnionRef::new);
    let buildings =
        (0..world.buildings.count()).filter_map(move |slot| world.buildings.handle_at_slot(slot)).map(UnionRef::new);
    units.chain(buildings)
}

/// Yields one [`TableChunk`] per participant that currently has live rows.
pub fn by_table(world: &World) -> Vec<TableChunk<'_>> {
    let mut chunks = Vec::with_capacity(2);
    let unit_count = world.units.count() as usize;
    if unit_count > 0 {
        chunks.push(TableChunk::Unit {
            count: unit_count as u32,
            positions: &world.units.positions()[..unit_count],
            healths: &world.units.healths()[..unit_count],
        });
    }
    let building_count = world.buildings.count() as usize;
    if building_count > 0 {
        chunks.push(TableChunk::Building {
            count: building_count as u32,
            positions: &world.buildings.positions()[..building_count],
            healths: &world.buildings.healths()[..building_count],
        });
    }
    chunks
}

/// Resolves a handle to a [`UnionRef`] iff it names a live row in one of the
/// participant tables.
pub fn try_get(world: &World, handle: Handle) -> Option<UnionRef> {
    match handle.table_id() {
        UNIT_TABLE => world.units.get_slot(handle).map(|_| UnionRef::new(handle)),
        BUILDING_TABLE => world.buildings.get_slot(handle).map(|_| UnionRef::new(handle)),
        _ => None,
    }
}
