//! Bounded uniform grid spatial index (single-grid mode).
//!
//! A `grid_size x grid_size` grid of cells over a bounded world. After a batch of
//! mutations the owning table calls [`Grid::spatial_sort`], which buckets live
//! slots into cells via a counting sort and refreshes three hierarchical
//! empty-block bitmasks (`fixedbitset`) so `query_box`/`query_radius` can skip
//! whole empty regions in O(1).
//!
//! `spatial_sort` never bumps the owning table's version — resorting the
//! spatial permutation doesn't change row identity or values, just the index
//! over them; see `crate::slotmap::SlotMap::touch_without_version_bump`.

use fixedbitset::FixedBitSet;

use crate::fixed::{Fx, FxVec2};

/// Fine cells per side of an L1 (finest) empty-block.
const L1_BLOCK: u32 = 4;
/// Fine cells per side of an L2 empty-block.
const L2_BLOCK: u32 = 16;
/// Fine cells per side of an L3 (coarsest) empty-block.
const L3_BLOCK: u32 = 64;

/// A bounded `grid_size x grid_size` uniform grid embedded in a spatial table.
pub struct Grid {
    grid_size: u32,
    cell_size: Fx,
    cell_start: Vec<u32>,
    sorted_order: Vec<u32>,
    l1: FixedBitSet,
    l2: FixedBitSet,
    l3: FixedBitSet,
    l1_blocks_per_axis: u32,
    l2_blocks_per_axis: u32,
    l3_blocks_per_axis: u32,
}

impl Grid {
    pub fn new(grid_size: u32, cell_size: Fx) -> Self {
        assert!(grid_size % L3_BLOCK == 0, "grid_size must divide evenly by {L3_BLOCK}");
        let cells = (grid_size * grid_size) as usize;
        let l1_blocks_per_axis = grid_size / L1_BLOCK;
        let l2_blocks_per_axis = grid_size / L2_BLOCK;
        let l3_blocks_per_axis = grid_size / L3_BLOCK;
        Grid {
            grid_size,
            cell_size,
            cell_start: vec![0; cells + 1],
            sorted_order: Vec::new(),
            l1: FixedBitSet::with_capacity((l1_blocks_per_axis * l1_blocks_per_axis) as usize),
            l2: FixedBitSet::with_capacity((l2_blocks_per_axis * l2_blocks_per_axis) as usize),
            l3: FixedBitSet::with_capacity((l3_blocks_per_axis * l3_blocks_per_axis) as usize),
            l1_blocks_per_axis,
            l2_blocks_per_axis,
            l3_blocks_per_axis,
        }
    }

    #[inline]
    fn cell_of(&self, pos: FxVec2) -> (u32, u32) {
        let gx = (pos.x / self.cell_size).to_int();
        let gy = (pos.y / self.cell_size).to_int();
        let max = self.grid_size as i32 - 1;
        (gx.clamp(0, max) as u32, gy.clamp(0, max) as u32)
    }

    #[inline]
    fn cell_index(&self, cx: u32, cy: u32) -> usize {
        (cy * self.grid_size + cx) as usize
    }

    /// Rebuilds `cell_start`/`sorted_order` and the three empty-block masks from
    /// the live positions in slot order. `positions[0..count)` must be the
    /// table's `Position` column for its current live slots.
    pub fn spatial_sort(&mut self, positions: &[FxVec2], count: u32) {
        let cells = (self.grid_size * self.grid_size) as usize;
        let mut counts = vec![0u32; cells];
        for slot in 0..count {
            let (cx, cy) = self.cell_of(positions[slot as usize]);
            counts[self.cell_index(cx, cy)] += 1;
        }

        self.cell_start[0] = 0;
        for i in 0..cells {
            self.cell_start[i + 1] = self.cell_start[i] + counts[i];
        }

        let mut cursor = self.cell_start[..cells].to_vec();
        self.sorted_order = vec![0u32; count as usize];
        for slot in 0..count {
            let (cx, cy) = self.cell_of(positions[slot as usize]);
            let idx = self.cell_index(cx, cy);
            self.sorted_order[cursor[idx] as usize] = slot;
            cursor[idx] += 1;
        }

        self.rebuild_masks(&counts);
    }

    fn rebuild_masks(&mut self, counts: &[u32]) {
        self.l1.clear();
        self.l2.clear();
        self.l3.clear();
        for cy in 0..self.grid_size {
            for cx in 0..self.grid_size {
                if counts[self.cell_index(cx, cy)] == 0 {
                    continue;
                }
                self.set_block(cx, cy);
            }
        }
    }

    fn set_block(&mut self, cx: u32, cy: u32) {
        let b1 = (cy / L1_BLOCK) * self.l1_blocks_per_axis + cx / L1_BLOCK;
        let b2 = (cy / L2_BLOCK) * self.l2_blocks_per_axis + cx / L2_BLOCK;
        let b3 = (cy / L3_BLOCK) * self.l3_blocks_per_axis + cx / L3_BLOCK;
        self.l1.insert(b1 as usize);
        self.l2.insert(b2 as usize);
        self.l3.insert(b3 as usize);
    }

    fn block_bit(mask: &FixedBitSet, blocks_per_axis: u32, block_size: u32, cx: u32, cy: u32) -> bool {
        let bx = cx / block_size;
        let by = cy / block_size;
        mask.contains((by * blocks_per_axis + bx) as usize)
    }

    fn block_end(block_size: u32, cx: u32) -> u32 {
        let bx = cx / block_size;
        (bx + 1) * block_size - 1
    }

    /// Exposes the sort's cell bucket for `(cx, cy)` as a `[start, end)` range
    /// into `sorted_order`, or an empty range if the cell is out of bounds.
    fn cell_range(&self, cx: u32, cy: u32) -> (u32, u32) {
        if cx >= self.grid_size || cy >= self.grid_size {
            return (0, 0);
        }
        let idx = self.cell_index(cx, cy);
        (self.cell_start[idx], self.cell_start[idx + 1])
    }

    /// Enumerates every live slot whose position lies within `[min, max]`
    /// (inclusive), cell-row-major then within-cell order.
    pub fn query_box<'a>(&'a self, positions: &'a [FxVec2], min: FxVec2, max: FxVec2) -> BoxQuery<'a> {
        let (min_cx, min_cy) = self.cell_of(min);
        let (max_cx, max_cy) = self.cell_of(max);
        BoxQuery {
            grid: self,
            positions,
            min,
            max,
            min_cx,
            max_cx,
            max_cy,
            cy: min_cy,
            cx: min_cx,
            cursor: 0,
            cell_end: 0,
        }
    }

    /// Enumerates every live slot within `radius` of `center` (squared-distance
    /// comparison, never taking a square root).
    pub fn query_radius<'a>(&'a self, positions: &'a [FxVec2], center: FxVec2, radius: Fx) -> RadiusQuery<'a> {
        let r = radius.abs();
        let min = FxVec2::new(center.x - r, center.y - r);
        let max = FxVec2::new(center.x + r, center.y + r);
        RadiusQuery { inner: self.query_box(positions, min, max), center, radius_sq: r * r }
    }
}

/// Iterator over slots within an axis-aligned box. Zero-allocation: walks
/// `sorted_order` directly and does not observe mutations made during iteration.
pub struct BoxQuery<'a> {
    grid: &'a Grid,
    positions: &'a [FxVec2],
    min: FxVec2,
    max: FxVec2,
    min_cx: u32,
    max_cx: u32,
    max_cy: u32,
    cy: u32,
    cx: u32,
    cursor: u32,
    cell_end: u32,
}

impl<'a> BoxQuery<'a> {
    fn advance_to_next_cell(&mut self) -> bool {
        loop {
            if self.cy > self.max_cy {
                return false;
            }
            if self.cx > self.max_cx {
                self.cy += 1;
                self.cx = self.min_cx;
                continue;
            }
            let (start, end) = self.grid.cell_range(self.cx, self.cy);
            if start < end {
                self.cursor = start;
                self.cell_end = end;
                self.cx += 1;
                return true;
            }
            // empty cell: skip forward using the coarsest applicable empty block
            if !Grid::block_bit(&self.grid.l3, self.grid.l3_blocks_per_axis, L3_BLOCK, self.cx, self.cy) {
                self.cx = Grid::block_end(L3_BLOCK, self.cx) + 1;
            } else if !Grid::block_bit(&self.grid.l2, self.grid.l2_blocks_per_axis, L2_BLOCK, self.cx, self.cy) {
                self.cx = Grid::block_end(L2_BLOCK, self.cx) + 1;
            } else if !Grid::block_bit(&self.grid.l1, self.grid.l1_blocks_per_axis, L1_BLOCK, self.cx, self.cy) {
                self.cx = Grid::block_end(L1_BLOCK, self.cx) + 1;
            } else {
                self.cx += 1;
            }
        }
    }

    #[inline]
    fn in_box(&self, pos: FxVec2) -> bool {
        pos.x >= self.min.x && pos.x <= self.max.x && pos.y >= self.min.y && pos.y <= self.max.y
    }
}

impl<'a> Iterator for BoxQuery<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            if self.cursor >= self.cell_end && !self.advance_to_next_cell() {
                return None;
            }
            while self.cursor < self.cell_end {
                let slot = self.grid.sorted_order[self.cursor as usize];
                self.cursor += 1;
                if self.in_box(self.positions[slot as usize]) {
                    return Some(slot);
                }
            }
        }
    }
}

/// Iterator over slots within a radius, built atop [`BoxQuery`]'s bounding-box
/// walk with an exact squared-distance test.
pub struct RadiusQuery<'a> {
    inner: BoxQuery<'a>,
    center: FxVec2,
    radius_sq: Fx,
}

impl<'a> Iterator for RadiusQuery<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            if self.inner.cursor >= self.inner.cell_end && !self.inner.advance_to_next_cell() {
                return None;
            }
            while self.inner.cursor < self.inner.cell_end {
                let slot = self.inner.grid.sorted_order[self.inner.cursor as usize];
                self.inner.cursor += 1;
                let pos = self.inner.positions[slot as usize];
                if self.inner.in_box(pos) && pos.distance_squared(self.center) <= self.radius_sq {
                    return Some(slot);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_256() -> Grid {
        Grid::new(256, Fx::from_int(32))
    }

    #[test]
    fn radius_query_yields_exact_set_in_cell_order() {
        // S3: positions {(0,0), (100,0), (0,100), (1000,1000)}, CellSize=32,
        // GridSize=256, query_radius((0,0), 150) yields the first three.
        let positions = vec![
            FxVec2::from_ints(0, 0),
            FxVec2::from_ints(100, 0),
            FxVec2::from_ints(0, 100),
            FxVec2::from_ints(1000, 1000),
        ];
        let mut grid = grid_256();
        grid.spatial_sort(&positions, positions.len() as u32);

        let hits: Vec<u32> = grid
            .query_radius(&positions, FxVec2::from_ints(0, 0), Fx::from_int(150))
            .collect();

        assert_eq!(hits, vec![0, 1, 2]);
    }

    #[test]
    fn box_query_excludes_points_outside_the_box() {
        let positions = vec![FxVec2::from_ints(10, 10), FxVec2::from_ints(500, 500)];
        let mut grid = grid_256();
        grid.spatial_sort(&positions, positions.len() as u32);

        let hits: Vec<u32> = grid
            .query_box(&positions, FxVec2::from_ints(0, 0), FxVec2::from_ints(100, 100))
            .collect();

        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn empty_cells_are_skipped_without_visiting_them_individually() {
        let mut positions = vec![FxVec2::from_ints(0, 0)];
        positions.push(FxVec2::from_ints(255 * 32 + 1, 0));
        let mut grid = grid_256();
        grid.spatial_sort(&positions, positions.len() as u32);

        let hits: Vec<u32> = grid
            .query_box(&positions, FxVec2::from_ints(0, 0), FxVec2::from_ints(8192, 8192))
            .collect();

        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn hierarchical_masks_are_set_iff_a_fine_cell_in_the_block_is_occupied() {
        let positions = vec![FxVec2::from_ints(40, 40)];
        let mut grid = grid_256();
        grid.spatial_sort(&positions, 1);

        let (cx, cy) = grid.cell_of(positions[0]);
        assert!(Grid::block_bit(&grid.l1, grid.l1_blocks_per_axis, L1_BLOCK, cx, cy));
        assert!(Grid::block_bit(&grid.l2, grid.l2_blocks_per_axis, L2_BLOCK, cx, cy));
        assert!(Grid::block_bit(&grid.l3, grid.l3_blocks_per_axis, L3_BLOCK, cx, cy));

        // A distant block should remain clear.
        assert!(!Grid::block_bit(&grid.l1, grid.l1_blocks_per_axis, L1_BLOCK, cx + 8, cy + 8));
    }

    #[test]
    fn positions_are_clamped_not_wrapped_at_grid_edges() {
        let mut grid = Grid::new(256, Fx::from_int(32));
        let far = FxVec2::from_ints(1_000_000, -1_000_000);
        let (cx, cy) = grid.cell_of(far);
        assert_eq!(cx, 255);
        assert_eq!(cy, 0);
        let _ = &mut grid;
    }

    #[test]
    fn query_is_zero_allocation_and_deterministic_across_calls() {
        let positions = vec![
            FxVec2::from_ints(5, 5),
            FxVec2::from_ints(6, 5),
            FxVec2::from_ints(5, 6),
        ];
        let mut grid = grid_256();
        grid.spatial_sort(&positions, positions.len() as u32);

        let first: Vec<u32> = grid.query_radius(&positions, FxVec2::from_ints(5, 5), Fx::from_int(5)).collect();
        let second: Vec<u32> = grid.query_radius(&positions, FxVec2::from_ints(5, 5), Fx::from_int(5)).collect();
        assert_eq!(first, second);
    }
}
