//! The world: one table per schema, a stable `table_id → dispatch`, and the
//! snapshot/hash/debug-dump orchestration a host drives it through.

use crate::codec::{Reader, Writer};
use crate::error::CoreError;
use crate::handle::TableId;
use crate::hash::mix_table_hashes;
use crate::table::buildings::BuildingTable;
use crate::table::match_state::MatchStateTable;
use crate::table::units::UnitTable;
use crate::table::{AnyTable, ALL_TABLE_IDS, BUILDING_TABLE, MATCH_STATE_TABLE, UNIT_TABLE};

pub struct World {
    pub units: UnitTable,
    pub buildings: BuildingTable,
    pub match_state: MatchStateTable,
}

impl World {
    pub fn new() -> Self {
        World { units: UnitTable::new(), buildings: BuildingTable::new(), match_state: MatchStateTable::new() }
    }

    /// Dispatches to a table by id without the caller needing to know the
    /// concrete schema. This is the one place cross-table polymorphism
    /// happens; every other call site works with a concrete table type.
    pub fn table(&self, id: TableId) -> &dyn AnyTable {
        match id {
            UNIT_TABLE => &self.units,
            BUILDING_TABLE => &self.buildings,
            MATCH_STATE_TABLE => &self.match_state,
            other => panic!("unknown table_id {other}"),
        }
    }

    pub fn table_mut(&mut self, id: TableId) -> &mut dyn AnyTable {
        match id {
            UNIT_TABLE => &mut self.units,
            BUILDING_TABLE => &mut self.buildings,
            MATCH_STATE_TABLE => &mut self.match_state,
            other => panic!("unknown table_id {other}"),
        }
    }

    /// Resets every table to empty (singleton tables re-allocate their row).
    pub fn reset(&mut self) {
        for id in ALL_TABLE_IDS {
            self.table_mut(id).reset();
        }
    }

    /// Per-table FNV-1a hashes, mixed in `table_id` order.
    pub fn compute_state_hash(&self) -> u64 {
        let hashes: Vec<u64> = ALL_TABLE_IDS.iter().map(|&id| self.table(id).compute_table_hash()).collect();
        mix_table_hashes(&hashes)
    }

    /// Serializes every table's authoritative slab + meta, prefixed per-table
    /// by its schema fingerprint, in `table_id` order.
    pub fn save_to(&self) -> Vec<u8> {
        let mut w = Writer::new();
        for id in ALL_TABLE_IDS {
            let table = self.table(id);
            w.write(&table.schema_fingerprint());
            table.save_to(&mut w);
        }
        w.buf
    }

    /// Loads a snapshot written by `save_to`. Validates every table's
    /// fingerprint before mutating any of them, so a mismatch leaves the
    /// world entirely in its prior state rather than partially overwritten.
    pub fn load_from(&mut self, bytes: &[u8]) -> Result<(), CoreError> {
        let mut cursor = 0usize;
        for id in ALL_TABLE_IDS {
            let table = self.table(id);
            if bytes.len() < cursor + 8 {
                return Err(CoreError::LoadMismatch { table: table.name(), expected: table.schema_fingerprint(), found: 0 });
            }
            let found = u64::from_le_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
            let expected = table.schema_fingerprint();
            if found != expected {
                return Err(CoreError::LoadMismatch { table: table.name(), expected, found });
            }
            cursor += 8 + table.encoded_len();
            if cursor > bytes.len() {
                return Err(CoreError::LoadMismatch { table: table.name(), expected, found });
            }
        }

        let mut r = Reader::new(bytes);
        for id in ALL_TABLE_IDS {
            r.skip(8); // fingerprint already validated above
            self.table_mut(id).load_from(&mut r)?;
        }
        Ok(())
    }

    /// One JSON object keyed by table name → array of row objects.
    pub fn export_debug_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for id in ALL_TABLE_IDS {
            let table = self.table(id);
            obj.insert(table.name().to_string(), table.export_debug_json());
        }
        serde_json::Value::Object(obj)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::FxVec2;

    fn populate(world: &mut World) {
        for i in 0..100 {
            let h = world.units.allocate().unwrap();
            let slot = world.units.get_slot(h).unwrap();
            world.units.set_position(slot, FxVec2::from_ints(i, i * 2));
            world.units.set_health(slot, 100 - i);
        }
        for i in 0..50 {
            let h = world.buildings.allocate(i);
            let slot = world.buildings.get_slot(h).unwrap();
            world.buildings.set_position(slot, FxVec2::from_ints(i * 10, i * 5));
        }
        world.match_state.set_frame(42);
        world.match_state.set_player_count(2);
    }

    #[test]
    fn round_trip_preserves_state_hash_and_row_values() {
        // S4: three spatial tables (well, two here, plus a singleton), snapshot,
        // reset, load_from, hash matches.
        let mut world = World::new();
        populate(&mut world);

        let hash_before = world.compute_state_hash();
        let snapshot = world.save_to();

        world.reset();
        assert_ne!(world.compute_state_hash(), hash_before);

        world.load_from(&snapshot).unwrap();
        assert_eq!(world.compute_state_hash(), hash_before);
        assert_eq!(world.units.count(), 100);
        assert_eq!(world.buildings.count(), 50);
        assert_eq!(world.match_state.frame(), 42);
    }

    #[test]
    fn load_with_corrupted_fingerprint_is_refused_and_world_is_unchanged() {
        let mut world = World::new();
        populate(&mut world);
        let hash_before = world.compute_state_hash();
        let mut snapshot = world.save_to();
        // Corrupt the first table's fingerprint bytes.
        snapshot[0] ^= 0xFF;

        let err = world.load_from(&snapshot).unwrap_err();
        assert!(matches!(err, CoreError::LoadMismatch { .. }));
        assert_eq!(world.compute_state_hash(), hash_before);
    }

    #[test]
    fn debug_json_has_one_key_per_table_and_marks_computed_fields() {
        let mut world = World::new();
        populate(&mut world);
        let json = world.export_debug_json();
        assert!(json.get("unit").is_some());
        assert!(json.get("building").is_some());
        assert!(json.get("match_state").is_some());

        let units = json.get("unit").unwrap().as_array().unwrap();
        let first = &units[0];
        assert_eq!(first["sector"]["computed"], serde_json::json!(true));
    }

    #[test]
    fn table_dispatch_by_id_matches_direct_field_access() {
        let world = World::new();
        assert_eq!(world.table(UNIT_TABLE).name(), "unit");
        assert_eq!(world.table(BUILDING_TABLE).name(), "building");
        assert_eq!(world.table(MATCH_STATE_TABLE).name(), "match_state");
    }
}
