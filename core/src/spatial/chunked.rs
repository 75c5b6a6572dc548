//! Chunked spatial index for worlds too large for one fixed grid.
//!
//! Identical per-chunk grid, but chunks are discovered from current positions on
//! each sort and pooled by integer `(chunk_x, chunk_y)` key. A `BTreeMap` keeps
//! chunks in sorted key order so iteration stays deterministic without an
//! explicit sort step — a `BTreeMap` rather than a `HashMap` specifically
//! because determinism requires the order.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::fixed::{Fx, FxVec2};
use crate::spatial::grid::Grid;

pub type ChunkKey = (i32, i32);

/// One chunk's grid plus the bookkeeping needed to translate a query hit
/// (a chunk-local index into `local_positions`) back to the table's real
/// global slot number.
struct ChunkEntry {
    grid: Grid,
    local_positions: Vec<FxVec2>,
    local_to_global: Vec<u32>,
}

/// A pool of per-chunk [`Grid`]s keyed by `(chunk_x, chunk_y)`, floor-divided so
/// negative coordinates still map to exactly one chunk.
pub struct ChunkedIndex {
    chunk_size: Fx,
    cell_size: Fx,
    grid_size: u32,
    max_chunks: u32,
    chunks: BTreeMap<ChunkKey, ChunkEntry>,
}

impl ChunkedIndex {
    pub fn new(chunk_size: Fx, cell_size: Fx, grid_size: u32, max_chunks: u32) -> Self {
        ChunkedIndex { chunk_size, cell_size, grid_size, max_chunks, chunks: BTreeMap::new() }
    }

    fn chunk_key_of(&self, pos: FxVec2) -> ChunkKey {
        (floor_div(pos.x, self.chunk_size), floor_div(pos.y, self.chunk_size))
    }

    fn local_position(&self, key: ChunkKey, pos: FxVec2) -> FxVec2 {
        let origin = FxVec2::new(
            self.chunk_size * Fx::from_int(key.0),
            self.chunk_size * Fx::from_int(key.1),
        );
        pos - origin
    }

    /// Rebuilds every active chunk from current positions. Chunks with no
    /// occupants are dropped; chunks discovered for the first time are created
    /// on demand, up to `max_chunks` simultaneously live chunks.
    pub fn spatial_sort(&mut self, positions: &[FxVec2], count: u32) -> Result<(), CoreError> {
        let mut by_chunk: BTreeMap<ChunkKey, Vec<u32>> = BTreeMap::new();
        for slot in 0..count {
            let key = self.chunk_key_of(positions[slot as usize]);
            by_chunk.entry(key).or_default().push(slot);
        }

        if by_chunk.len() as u32 > self.max_chunks {
            return Err(CoreError::ChunkOverflow { table: "chunked_index", max_chunks: self.max_chunks });
        }

        self.chunks.retain(|key, _| by_chunk.contains_key(key));

        for (key, slots) in by_chunk {
            let local: Vec<FxVec2> = slots.iter().map(|&s| self.local_position(key, positions[s as usize])).collect();
            let entry = self.chunks.entry(key).or_insert_with(|| ChunkEntry {
                grid: Grid::new(self.grid_size, self.cell_size),
                local_positions: Vec::new(),
                local_to_global: Vec::new(),
            });
            // Grid::spatial_sort yields hits as indices into whatever position
            // slice it's given; here that's the chunk-local `local` array, not
            // the table's global slot numbering. `local_to_global` is the
            // translation back, indexed the same way.
            entry.grid.spatial_sort(&local, local.len() as u32);
            entry.local_positions = local;
            entry.local_to_global = slots;
        }

        Ok(())
    }

    /// Enumerates every live global slot within `radius` of `center`. Yields
    /// nothing if the chunk containing `center` has no live occupants.
    pub fn query_radius(&self, center: FxVec2, radius: Fx) -> impl Iterator<Item = u32> + '_ {
        let key = self.chunk_key_of(center);
        let local_center = self.local_position(key, center);
        self.chunks.get(&key).into_iter().flat_map(move |entry| {
            entry
                .grid
                .query_radius(&entry.local_positions, local_center, radius)
                .map(move |local_idx| entry.local_to_global[local_idx as usize])
        })
    }

    /// Enumerates every live global slot within `[min, max]` inside the chunk
    /// containing `min`. Queries spanning multiple chunks call this once per
    /// chunk key the caller cares about.
    pub fn query_box(&self, key: ChunkKey, min: FxVec2, max: FxVec2) -> impl Iterator<Item = u32> + '_ {
        let local_min = self.local_position(key, min);
        let local_max = self.local_position(key, max);
        self.chunks.get(&key).into_iter().flat_map(move |entry| {
            entry
                .grid
                .query_box(&entry.local_positions, local_min, local_max)
                .map(move |local_idx| entry.local_to_global[local_idx as usize])
        })
    }

    /// Iterates active chunk keys in sorted order, the source of this index's
    /// determinism guarantee.
    pub fn chunk_keys(&self) -> impl Iterator<Item = &ChunkKey> {
        self.chunks.keys()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn get_chunk(&self, key: ChunkKey) -> Option<&Grid> {
        self.chunks.get(&key).map(|entry| &entry.grid)
    }
}

/// Floor division toward negative infinity, so `(-1) / chunk_size` lands in the
/// chunk left of the origin rather than truncating toward zero.
fn floor_div(value: Fx, divisor: Fx) -> i32 {
    let q = value / divisor;
    let truncated = q.to_int();
    let remainder = value - divisor * Fx::from_int(truncated);
    if remainder.to_raw() < 0 {
        truncated - 1
    } else {
        truncated
    }
}
