//! Concrete row schemas and the type-erased dispatch surface `World` uses to
//! reach any of them by `table_id`.
//!
//! Polymorphism between tables is exposed exclusively through the multi-table
//! union query and the world's `table_id → dispatch` map: schemas are fixed
//! Rust structs, not a runtime-composed archetype. [`AnyTable`] is the narrow
//! safe interface `World` needs for generic operations (reset, snapshot, hash,
//! debug dump); each concrete table additionally exposes its own typed
//! accessors for systems.

pub mod buildings;
pub mod match_state;
pub mod units;

use crate::codec::{Reader, Writer};
use crate::error::CoreError;
use crate::handle::TableId;

/// Schema identifiers, stable across the lifetime of a world. A world's
/// snapshot is the concatenation of per-table (slab, meta) pairs in this
/// fixed order.
pub const UNIT_TABLE: TableId = 0;
pub const BUILDING_TABLE: TableId = 1;
pub const MATCH_STATE_TABLE: TableId = 2;

/// The full set of schema ids, in the fixed `table_id` order used by snapshot
/// concatenation and state-hash mixing.
pub const ALL_TABLE_IDS: [TableId; 3] = [UNIT_TABLE, BUILDING_TABLE, MATCH_STATE_TABLE];

/// Safe, object-safe surface every concrete table implements so `World` can
/// dispatch generic operations without knowing the concrete schema.
pub trait AnyTable {
    fn table_id(&self) -> TableId;
    fn name(&self) -> &'static str;
    fn capacity(&self) -> u32;
    fn count(&self) -> u32;
    fn version(&self) -> u32;

    /// Clears the table to empty, restoring initial maps (and re-allocating the
    /// singleton row if the schema auto-allocates).
    fn reset(&mut self);

    /// Frees the row named by `(raw_id, generation)` if live; no-op otherwise.
    /// Used by the multi-table union query's `UnionRef::free`.
    fn free_raw(&mut self, raw_id: u16, generation: u16) -> bool;

    /// FNV-1a over every live row's authoritative column bytes, in slot order.
    fn compute_table_hash(&self) -> u64;

    /// One JSON array entry per live row, with computed fields tagged.
    fn export_debug_json(&self) -> serde_json::Value;

    /// The 64-bit schema fingerprint embedded in this table's snapshot meta.
    fn schema_fingerprint(&self) -> u64;

    /// Exact byte length `save_to` writes (excluding the fingerprint prefix
    /// `World::save_to` adds ahead of it). Lets `World::load_from` validate
    /// every table's fingerprint before mutating any of them.
    fn encoded_len(&self) -> usize;

    /// Writes the authoritative slab (header + non-computed columns) followed
    /// by the generational meta.
    fn save_to(&self, w: &mut Writer);

    /// Reads a slab+meta pair written by `save_to`, refusing on fingerprint
    /// mismatch, then recomputes computed columns from authoritative ones.
    fn load_from(&mut self, r: &mut Reader) -> Result<(), CoreError>;
}
