//! `unit` schema: a spatial table of mobile combat units.
//!
//! Demonstrates the cyclic-reference pattern used for cross-table references:
//! a unit's `garrisoned_in` field is a [`Handle`] into
//! [`crate::table::buildings::BuildingTable`], resolved through `get_slot` on
//! every dereference rather than held as a pointer.

use log::{debug, warn};

use crate::codec::{Reader, Writer};
use crate::error::CoreError;
use crate::fingerprint::{field, schema_fingerprint};
use crate::fixed::{Fx, FxVec2};
use crate::handle::Handle;
use crate::hash::RowHasher;
use crate::slotmap::SlotMap;
use crate::spatial::grid::{BoxQuery, Grid, RadiusQuery};
use crate::table::{AnyTable, UNIT_TABLE};

pub const UNIT_CAPACITY: u32 = 1024;
const GRID_SIZE: u32 = 256;

/// Units are mobile, so their grid uses a relatively small cell size compared
/// to buildings.
fn cell_size() -> Fx {
    Fx::from_int(32)
}

pub struct UnitTable {
    slotmap: SlotMap,
    grid: Grid,
    position: Vec<FxVec2>,
    velocity: Vec<FxVec2>,
    health: Vec<i32>,
    owner_player: Vec<i32>,
    garrisoned_in: Vec<Handle>,
    /// Computed: which coarse map sector this unit currently occupies.
    /// Recomputed from `position` on load; never serialized or hashed.
    sector: Vec<i32>,
}

impl UnitTable {
    pub fn new() -> Self {
        let capacity = UNIT_CAPACITY;
        UnitTable {
            slotmap: SlotMap::new(UNIT_TABLE, capacity),
            grid: Grid::new(GRID_SIZE, cell_size()),
            position: vec![FxVec2::ZERO; capacity as usize],
            velocity: vec![FxVec2::ZERO; capacity as usize],
            health: vec![0; capacity as usize],
            owner_player: vec![0; capacity as usize],
            garrisoned_in: vec![Handle::INVALID; capacity as usize],
            sector: vec![0; capacity as usize],
        }
    }

    pub fn allocate(&mut self) -> Result<Handle, CoreError> {
        let (raw_id, gen, slot) = self.slotmap.try_allocate().ok_or(CoreError::CapacityExhausted {
            table: "unit",
            capacity: self.slotmap.capacity(),
        })?;
        let slot = slot as usize;
        self.position[slot] = FxVec2::ZERO;
        self.velocity[slot] = FxVec2::ZERO;
        self.health[slot] = 0;
        self.owner_player[slot] = 0;
        self.garrisoned_in[slot] = Handle::INVALID;
        self.sector[slot] = 0;
        debug!("unit allocate raw_id={raw_id} gen={gen} slot={slot}");
        Ok(Handle::new(UNIT_TABLE, raw_id, gen))
    }

    pub fn free(&mut self, handle: Handle) -> bool {
        if handle.table_id() != UNIT_TABLE {
            warn!("unit free: stale handle {handle:?} names a different table, ignoring");
            return false;
        }
        self.free_by_parts(handle.raw_id(), handle.generation())
    }

    fn free_by_parts(&mut self, raw_id: u16, generation: u16) -> bool {
        let Some(result) = self.slotmap.free(raw_id, generation) else {
            warn!("unit free: stale handle raw_id={raw_id} gen={generation}, ignoring");
            return false;
        };
        if let Some(moved) = result.moved_slot {
            let freed = result.freed_slot as usize;
            let moved = moved as usize;
            self.position[freed] = self.position[moved];
            self.velocity[freed] = self.velocity[moved];
            self.health[freed] = self.health[moved];
            self.owner_player[freed] = self.owner_player[moved];
            self.garrisoned_in[freed] = self.garrisoned_in[moved];
            self.sector[freed] = self.sector[moved];
        }
        debug!("unit free raw_id={raw_id} gen={generation}");
        true
    }

    pub fn get_slot(&self, handle: Handle) -> Option<u32> {
        if handle.table_id() != UNIT_TABLE {
            return None;
        }
        self.slotmap.get_slot(handle.raw_id(), handle.generation())
    }

    pub fn handle_at_slot(&self, slot: u32) -> Option<Handle> {
        let raw_id = self.slotmap.raw_id_at_slot(slot)?;
        Some(Handle::new(UNIT_TABLE, raw_id, self.slotmap.generation_of(raw_id)))
    }

    pub fn position(&self, slot: u32) -> FxVec2 {
        self.position[slot as usize]
    }

    pub fn set_position(&mut self, slot: u32, v: FxVec2) {
        self.position[slot as usize] = v;
    }

    pub fn velocity(&self, slot: u32) -> FxVec2 {
        self.velocity[slot as usize]
    }

    pub fn set_velocity(&mut self, slot: u32, v: FxVec2) {
        self.velocity[slot as usize] = v;
    }

    pub fn health(&self, slot: u32) -> i32 {
        self.health[slot as usize]
    }

    pub fn set_health(&mut self, slot: u32, v: i32) {
        self.health[slot as usize] = v;
    }

    /// Full-capacity column span, for vectorized loops. Callers slice to `count`.
    pub fn positions(&self) -> &[FxVec2] {
        &self.position
    }

    pub fn healths(&self) -> &[i32] {
        &self.health
    }

    pub fn owner_player(&self, slot: u32) -> i32 {
        self.owner_player[slot as usize]
    }

    pub fn set_owner_player(&mut self, slot: u32, v: i32) {
        self.owner_player[slot as usize] = v;
    }

    pub fn garrisoned_in(&self, slot: u32) -> Handle {
        self.garrisoned_in[slot as usize]
    }

    pub fn set_garrisoned_in(&mut self, slot: u32, v: Handle) {
        self.garrisoned_in[slot as usize] = v;
    }

    /// Computed field — see the `sector` doc comment on the struct.
    pub fn sector(&self, slot: u32) -> i32 {
        self.sector[slot as usize]
    }

    /// Rebuilds the spatial grid from current positions. Resorting the grid
    /// doesn't change row identity or values, so this never bumps the table
    /// version.
    pub fn spatial_sort(&mut self) {
        self.grid.spatial_sort(&self.position, self.slotmap.count());
        self.slotmap.touch_without_version_bump();
    }

    pub fn query_box(&self, min: FxVec2, max: FxVec2) -> BoxQuery<'_> {
        self.grid.query_box(&self.position, min, max)
    }

    pub fn query_radius(&self, center: FxVec2, radius: Fx) -> RadiusQuery<'_> {
        self.grid.query_radius(&self.position, center, radius)
    }

    fn recompute_all(&mut self) {
        for slot in 0..self.slotmap.count() as usize {
            self.sector[slot] = recompute_sector(self.position[slot]);
        }
    }

    fn schema_fields() -> Vec<crate::fingerprint::FieldDescriptor> {
        vec![
            field("position", "FxVec2", 1),
            field("velocity", "FxVec2", 1),
            field("health", "i32", 1),
            field("owner_player", "i32", 1),
            field("garrisoned_in", "Handle", 1),
        ]
    }
}

fn recompute_sector(pos: FxVec2) -> i32 {
    (pos.x.to_int() / 1000) + (pos.y.to_int() / 1000) * 1000
}

impl Default for UnitTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AnyTable for UnitTable {
    fn table_id(&self) -> crate::handle::TableId {
        UNIT_TABLE
    }

    fn name(&self) -> &'static str {
        "unit"
    }

    fn capacity(&self) -> u32 {
        self.slotmap.capacity()
    }

    fn count(&self) -> u32 {
        self.slotmap.count()
    }

    fn version(&self) -> u32 {
        self.slotmap.version()
    }

    fn reset(&mut self) {
        self.slotmap.reset();
        self.position.fill(FxVec2::ZERO);
        self.velocity.fill(FxVec2::ZERO);
        self.health.fill(0);
        self.owner_player.fill(0);
        self.garrisoned_in.fill(Handle::INVALID);
        self.sector.fill(0);
    }

    fn free_raw(&mut self, raw_id: u16, generation: u16) -> bool {
        self.free_by_parts(raw_id, generation)
    }

    fn compute_table_hash(&self) -> u64 {
        let mut hasher = RowHasher::new();
        for slot in 0..self.slotmap.count() as usize {
            hasher.write(&self.position[slot]);
            hasher.write(&self.velocity[slot]);
            hasher.write(&self.health[slot]);
            hasher.write(&self.owner_player[slot]);
            hasher.write(&self.garrisoned_in[slot]);
        }
        hasher.finish()
    }

    fn export_debug_json(&self) -> serde_json::Value {
        let mut rows = Vec::with_capacity(self.slotmap.count() as usize);
        for slot in 0..self.slotmap.count() as usize {
            let handle = self.handle_at_slot(slot as u32).unwrap_or(Handle::INVALID);
            rows.push(serde_json::json!({
                "slot": slot,
                "stable_id": handle.raw_id(),
                "position": fxvec2_json(self.position[slot]),
                "velocity": fxvec2_json(self.velocity[slot]),
                "health": self.health[slot],
                "owner_player": self.owner_player[slot],
                "garrisoned_in": handle_json(self.garrisoned_in[slot]),
                "sector": { "value": self.sector[slot], "computed": true },
            }));
        }
        serde_json::Value::Array(rows)
    }

    fn schema_fingerprint(&self) -> u64 {
        schema_fingerprint("unit", &Self::schema_fields())
    }

    fn encoded_len(&self) -> usize {
        let capacity = self.slotmap.capacity() as usize;
        let header = 8;
        let columns = capacity * (16 + 16 + 4 + 4 + 8);
        let meta = 12 + capacity * 16;
        header + columns + meta
    }

    fn save_to(&self, w: &mut Writer) {
        w.write(&self.version());
        w.write(&0u32); // reserved
        for v in &self.position {
            w.write(v);
        }
        for v in &self.velocity {
            w.write(v);
        }
        for v in &self.health {
            w.write(v);
        }
        for v in &self.owner_player {
            w.write(v);
        }
        for v in &self.garrisoned_in {
            w.write(v);
        }
        self.slotmap.save_meta_to(w);
    }

    fn load_from(&mut self, r: &mut Reader) -> Result<(), CoreError> {
        let _version = r.read::<u32>(4);
        let _reserved = r.read::<u32>(4);
        for v in self.position.iter_mut() {
            *v = r.read::<FxVec2>(16);
        }
        for v in self.velocity.iter_mut() {
            *v = r.read::<FxVec2>(16);
        }
        for v in self.health.iter_mut() {
            *v = r.read::<i32>(4);
        }
        for v in self.owner_player.iter_mut() {
            *v = r.read::<i32>(4);
        }
        for v in self.garrisoned_in.iter_mut() {
            *v = r.read::<Handle>(8);
        }
        self.slotmap.load_meta_from(r);
        self.slotmap.bump_version_for_load();
        self.recompute_all();
        Ok(())
    }
}

/// Shared by every table's debug JSON: emits an `Fx` as both raw hex and a
/// decimal approximation.
pub(crate) fn fx_json(v: Fx) -> serde_json::Value {
    serde_json::json!({ "hex": format!("{:#x}", v.to_raw()), "decimal": v.to_string() })
}

pub(crate) fn fxvec2_json(v: FxVec2) -> serde_json::Value {
    serde_json::json!({ "x": fx_json(v.x), "y": fx_json(v.y) })
}

pub(crate) fn handle_json(h: Handle) -> serde_json::Value {
    serde_json::json!({ "table_id": h.table_id(), "raw_id": h.raw_id(), "generation": h.generation() })
}
