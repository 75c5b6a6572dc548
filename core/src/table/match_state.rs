//! `match_state` schema: a data-only singleton table.
//!
//! Exactly one row exists for the table's lifetime; it auto-allocates on
//! construction and re-allocates on `reset()`, with field-initialized defaults
//! matching the `Uniques` container in spirit (one slot, no grid) but expressed
//! as a concrete schema rather than a type-erased `Any` map, since the fields
//! here are fixed at build time.

use crate::codec::{Reader, Writer};
use crate::error::CoreError;
use crate::fingerprint::{field, schema_fingerprint};
use crate::handle::Handle;
use crate::hash::RowHasher;
use crate::slotmap::SlotMap;
use crate::table::{AnyTable, MATCH_STATE_TABLE};

const CAPACITY: u32 = 1;

pub struct MatchStateTable {
    slotmap: SlotMap,
    frame: i32,
    player_count: i32,
    session_seed: i32,
    /// -1 while the match has no winner yet.
    winner_player: i32,
    match_active: bool,
}

impl MatchStateTable {
    pub fn new() -> Self {
        let mut table = MatchStateTable {
            slotmap: SlotMap::new(MATCH_STATE_TABLE, CAPACITY),
            frame: 0,
            player_count: 0,
            session_seed: 0,
            winner_player: -1,
            match_active: false,
        };
        table.auto_allocate();
        table
    }

    fn auto_allocate(&mut self) {
        self.slotmap.try_allocate().expect("singleton table always has capacity for its one row");
        self.frame = 0;
        self.player_count = 0;
        self.session_seed = 0;
        self.winner_player = -1;
        self.match_active = false;
    }

    pub fn singleton_handle(&self) -> Handle {
        Handle::new(MATCH_STATE_TABLE, 0, self.slotmap.generation_of(0))
    }

    pub fn frame(&self) -> i32 {
        self.frame
    }

    pub fn set_frame(&mut self, v: i32) {
        self.frame = v;
    }

    pub fn player_count(&self) -> i32 {
        self.player_count
    }

    pub fn set_player_count(&mut self, v: i32) {
        self.player_count = v;
    }

    pub fn session_seed(&self) -> i32 {
        self.session_seed
    }

    pub fn set_session_seed(&mut self, v: i32) {
        self.session_seed = v;
    }

    pub fn winner_player(&self) -> i32 {
        self.winner_player
    }

    pub fn set_winner_player(&mut self, v: i32) {
        self.winner_player = v;
    }

    pub fn match_active(&self) -> bool {
        self.match_active
    }

    pub fn set_match_active(&mut self, v: bool) {
        self.match_active = v;
    }

    fn schema_fields() -> Vec<crate::fingerprint::FieldDescriptor> {
        vec![
            field("frame", "i32", 1),
            field("player_count", "i32", 1),
            field("session_seed", "i32", 1),
            field("winner_player", "i32", 1),
            field("match_active", "bool", 1),
        ]
    }
}

impl Default for MatchStateTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AnyTable for MatchStateTable {
    fn table_id(&self) -> crate::handle::TableId {
        MATCH_STATE_TABLE
    }

    fn name(&self) -> &'static str {
        "match_state"
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
        self.auto_allocate();
    }

    fn free_raw(&mut self, _raw_id: u16, _generation: u16) -> bool {
        // The singleton row is never freed directly; resetting the table is
        // the only supported way to return it to default state.
        false
    }

    fn compute_table_hash(&self) -> u64 {
        let mut hasher = RowHasher::new();
        hasher.write(&self.frame);
        hasher.write(&self.player_count);
        hasher.write(&self.session_seed);
        hasher.write(&self.winner_player);
        hasher.write(&self.match_active);
        hasher.finish()
    }

    fn export_debug_json(&self) -> serde_json::Value {
        serde_json::Value::Array(vec![serde_json::json!({
            "slot": 0,
            "stable_id": 0,
            "frame": self.frame,
            "player_count": self.player_count,
            "session_seed": self.session_seed,
            "winner_player": self.winner_player,
            "match_active": self.match_active,
        })])
    }

    fn schema_fingerprint(&self) -> u64 {
        schema_fingerprint("match_state", &Self::schema_fields())
    }

    fn encoded_len(&self) -> usize {
        let capacity = self.slotmap.capacity() as usize;
        let header = 8;
        let columns = capacity * (4 + 4 + 4 + 4 + 1);
        let meta = 12 + capacity * 16;
        header + columns + meta
    }

    fn save_to(&self, w: &mut Writer) {
        w.write(&self.version());
        w.write(&0u32);
        w.write(&self.frame);
        w.write(&self.player_count);
        w.write(&self.session_seed);
        w.write(&self.winner_player);
        w.write(&self.match_active);
        self.slotmap.save_meta_to(w);
    }

    fn load_from(&mut self, r: &mut Reader) -> Result<(), CoreError> {
        let _version = r.read::<u32>(4);
        let _reserved = r.read::<u32>(4);
        self.frame = r.read::<i32>(4);
        self.player_count = r.read::<i32>(4);
        self.session_seed = r.read::<i32>(4);
        self.winner_player = r.read::<i32>(4);
        self.match_active = r.read::<bool>(1);
        self.slotmap.load_meta_from(r);
        self.slotmap.bump_version_for_load();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_allocates_a_single_row_on_construction() {
        let table = MatchStateTable::new();
        assert_eq!(table.count(), 1);
        assert_eq!(table.winner_player(), -1);
    }

    #[test]
    fn reset_restores_defaults_and_keeps_exactly_one_row() {
        let mut table = MatchStateTable::new();
        table.set_frame(100);
        table.set_winner_player(2);

        AnyTable::reset(&mut table);

        assert_eq!(table.count(), 1);
        assert_eq!(table.frame(), 0);
        assert_eq!(table.winner_player(), -1);
    }

    #[test]
    fn save_and_load_round_trips_fields() {
        let mut table = MatchStateTable::new();
        table.set_frame(7);
        table.set_player_count(4);
        table.set_session_seed(99);
        table.set_winner_player(1);
        table.set_match_active(true);

        let mut w = Writer::new();
        AnyTable::save_to(&table, &mut w);

        let mut restored = MatchStateTable::new();
        let mut r = Reader::new(&w.buf);
        AnyTable::load_from(&mut restored, &mut r).unwrap();

        assert_eq!(restored.frame(), 7);
        assert_eq!(restored.player_count(), 4);
        assert_eq!(restored.session_seed(), 99);
        assert_eq!(restored.winner_player(), 1);
        assert!(restored.match_active());
    }
}
