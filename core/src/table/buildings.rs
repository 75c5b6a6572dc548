//! `building` schema: a spatial table with LRU eviction.
//!
//! `allocate` on a full table frees the live row with the smallest
//! `last_used_tick` before proceeding, rather than surfacing
//! `CapacityExhausted` — the eviction policy named in the schema config.

use log::{debug, warn};

use crate::codec::{Reader, Writer};
use crate::error::CoreError;
use crate::fingerprint::{field, schema_fingerprint};
use crate::fixed::{Fx, FxVec2};
use crate::handle::Handle;
use crate::hash::RowHasher;
use crate::slotmap::SlotMap;
use crate::spatial::grid::{BoxQuery, Grid, RadiusQuery};
use crate::table::units::{fxvec2_json, handle_json};
use crate::table::{AnyTable, BUILDING_TABLE};

pub const BUILDING_CAPACITY: u32 = 256;
const GRID_SIZE: u32 = 256;
/// Up to 4 units may be garrisoned in a single building.
pub const GARRISON_SLOTS: usize = 4;

fn cell_size() -> Fx {
    Fx::from_int(64)
}

pub struct BuildingTable {
    slotmap: SlotMap,
    grid: Grid,
    position: Vec<FxVec2>,
    health: Vec<i32>,
    owner_player: Vec<i32>,
    last_used_tick: Vec<i32>,
    garrison: Vec<[Handle; GARRISON_SLOTS]>,
}

impl BuildingTable {
    pub fn new() -> Self {
        let capacity = BUILDING_CAPACITY;
        BuildingTable {
            slotmap: SlotMap::new(BUILDING_TABLE, capacity),
            grid: Grid::new(GRID_SIZE, cell_size()),
            position: vec![FxVec2::ZERO; capacity as usize],
            health: vec![0; capacity as usize],
            owner_player: vec![0; capacity as usize],
            last_used_tick: vec![0; capacity as usize],
            garrison: vec![[Handle::INVALID; GARRISON_SLOTS]; capacity as usize],
        }
    }

    /// Finds the live slot with the smallest `last_used_tick`, per the LRU
    /// eviction policy. Panics only if called on an empty table (callers only
    /// invoke this when `count == capacity`, so count > 0).
    fn lru_victim_slot(&self) -> u32 {
        (0..self.slotmap.count())
            .min_by_key(|&slot| self.last_used_tick[slot as usize])
            .expect("lru_victim_slot called on an empty table")
    }

    pub fn allocate(&mut self, current_tick: i32) -> Handle {
        if self.slotmap.is_full() {
            let victim_slot = self.lru_victim_slot();
            let raw_id = self
                .slotmap
                .raw_id_at_slot(victim_slot)
                .expect("live slot must have a raw_id");
            let gen = self.slotmap.generation_of(raw_id);
            debug!("building allocate evicting lru slot={victim_slot} raw_id={raw_id}");
            self.free_by_parts(raw_id, gen);
        }

        let (raw_id, gen, slot) = self
            .slotmap
            .try_allocate()
            .expect("capacity was just freed by LRU eviction if full");
        let slot = slot as usize;
        self.position[slot] = FxVec2::ZERO;
        self.health[slot] = 0;
        self.owner_player[slot] = 0;
        self.last_used_tick[slot] = current_tick;
        self.garrison[slot] = [Handle::INVALID; GARRISON_SLOTS];
        Handle::new(BUILDING_TABLE, raw_id, gen)
    }

    pub fn free(&mut self, handle: Handle) -> bool {
        if handle.table_id() != BUILDING_TABLE {
            warn!("building free: stale handle {handle:?} names a different table, ignoring");
            return false;
        }
        self.free_by_parts(handle.raw_id(), handle.generation())
    }

    fn free_by_parts(&mut self, raw_id: u16, generation: u16) -> bool {
        let Some(result) = self.slotmap.free(raw_id, generation) else {
            warn!("building free: stale handle raw_id={raw_id} gen={generation}, ignoring");
            return false;
        };
        if let Some(moved) = result.moved_slot {
            let freed = result.freed_slot as usize;
            let moved = moved as usize;
            self.position[freed] = self.position[moved];
            self.health[freed] = self.health[moved];
            self.owner_player[freed] = self.owner_player[moved];
            self.last_used_tick[freed] = self.last_used_tick[moved];
            self.garrison[freed] = self.garrison[moved];
        }
        true
    }

    pub fn get_slot(&self, handle: Handle) -> Option<u32> {
        if handle.table_id() != BUILDING_TABLE {
            return None;
        }
        self.slotmap.get_slot(handle.raw_id(), handle.generation())
    }

    pub fn handle_at_slot(&self, slot: u32) -> Option<Handle> {
        let raw_id = self.slotmap.raw_id_at_slot(slot)?;
        Some(Handle::new(BUILDING_TABLE, raw_id, self.slotmap.generation_of(raw_id)))
    }

    pub fn position(&self, slot: u32) -> FxVec2 {
        self.position[slot as usize]
    }

    pub fn set_position(&mut self, slot: u32, v: FxVec2) {
        self.position[slot as usize] = v;
    }

    pub fn health(&self, slot: u32) -> i32 {
        self.health[slot as usize]
    }

    pub fn set_health(&mut self, slot: u32, v: i32) {
        self.health[slot as usize] = v;
    }

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

    pub fn touch(&mut self, slot: u32, current_tick: i32) {
        self.last_used_tick[slot as usize] = current_tick;
    }

    pub fn last_used_tick(&self, slot: u32) -> i32 {
        self.last_used_tick[slot as usize]
    }

    pub fn garrison(&self, slot: u32, index: usize) -> Handle {
        self.garrison[slot as usize][index]
    }

    pub fn set_garrison(&mut self, slot: u32, index: usize, h: Handle) {
        self.garrison[slot as usize][index] = h;
    }

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

    fn schema_fields() -> Vec<crate::fingerprint::FieldDescriptor> {
        vec![
            field("position", "FxVec2", 1),
            field("health", "i32", 1),
            field("owner_player", "i32", 1),
            field("last_used_tick", "i32", 1),
            field("garrison", "Handle", GARRISON_SLOTS as u32),
        ]
    }
}

impl Default for BuildingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AnyTable for BuildingTable {
    fn table_id(&self) -> crate::handle::TableId {
        BUILDING_TABLE
    }

    fn name(&self) -> &'static str {
        "building"
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
        self.health.fill(0);
        self.owner_player.fill(0);
        self.last_used_tick.fill(0);
        self.garrison.fill([Handle::INVALID; GARRISON_SLOTS]);
    }

    fn free_raw(&mut self, raw_id: u16, generation: u16) -> bool {
        self.free_by_parts(raw_id, generation)
    }

    fn compute_table_hash(&self) -> u64 {
        let mut hasher = RowHasher::new();
        for slot in 0..self.slotmap.count() as usize {
            hasher.write(&self.position[slot]);
            hasher.write(&self.health[slot]);
            hasher.write(&self.owner_player[slot]);
            hasher.write(&self.last_used_tick[slot]);
            for h in &self.garrison[slot] {
                hasher.write(h);
            }
        }
        hasher.finish()
    }

    fn export_debug_json(&self) -> serde_json::Value {
        let mut rows = Vec::with_capacity(self.slotmap.count() as usize);
        for slot in 0..self.slotmap.count() as usize {
            let handle = self.handle_at_slot(slot as u32).unwrap_or(Handle::INVALID);
            let garrison: Vec<_> = self.garrison[slot].iter().map(|h| handle_json(*h)).collect();
            rows.push(serde_json::json!({
                "slot": slot,
                "stable_id": handle.raw_id(),
                "position": fxvec2_json(self.position[slot]),
                "health": self.health[slot],
                "owner_player": self.owner_player[slot],
                "last_used_tick": self.last_used_tick[slot],
                "garrison": garrison,
            }));
        }
        serde_json::Value::Array(rows)
    }

    fn schema_fingerprint(&self) -> u64 {
        schema_fingerprint("building", &Self::schema_fields())
    }

    fn encoded_len(&self) -> usize {
        let capacity = self.slotmap.capacity() as usize;
        let header = 8;
        let columns = capacity * (16 + 4 + 4 + 4 + 8 * GARRISON_SLOTS);
        let meta = 12 + capacity * 16;
        header + columns + meta
    }

    fn save_to(&self, w: &mut Writer) {
        w.write(&self.version());
        w.write(&0u32);
        for v in &self.position {
            w.write(v);
        }
        for v in &self.health {
            w.write(v);
        }
        for v in &self.owner_player {
            w.write(v);
        }
        for v in &self.last_used_tick {
            w.write(v);
        }
        for row in &self.garrison {
            w.write(row);
        }
        self.slotmap.save_meta_to(w);
    }

    fn load_from(&mut self, r: &mut Reader) -> Result<(), CoreError> {
        let _version = r.read::<u32>(4);
        let _reserved = r.read::<u32>(4);
        for v in self.position.iter_mut() {
            *v = r.read::<FxVec2>(16);
        }
        for v in self.health.iter_mut() {
            *v = r.read::<i32>(4);
        }
        for v in self.owner_player.iter_mut() {
            *v = r.read::<i32>(4);
        }
        for v in self.last_used_tick.iter_mut() {
            *v = r.read::<i32>(4);
        }
        for row in self.garrison.iter_mut() {
            *row = r.read::<[Handle; GARRISON_SLOTS]>(8 * GARRISON_SLOTS);
        }
        self.slotmap.load_meta_from(r);
        self.slotmap.bump_version_for_load();
        Ok(())
    }
}
