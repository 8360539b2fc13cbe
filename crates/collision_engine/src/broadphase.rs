//! Grid-based broad-phase collision detection
//!
//! One-level uniform grid with a two-pass parallel counting sort, chosen
//! because it parallelizes cleanly and bounds work by spatial density
//! rather than by shape count squared:
//!
//! 1. reduce the active AABBs to one scene bounding box;
//! 2. pick the grid resolution from the mean shape extent;
//! 3. count shapes per cell (a shape overlapping several cells counts in
//!    each), prefix-sum the counts, then scatter shape ids into one flat
//!    cell-sorted array;
//! 4. within every cell, emit each unordered pair whose AABBs overlap and
//!    whose filters pass.
//!
//! A pair of shapes sharing several cells is attributed to exactly one
//! cell (the cell containing the component-wise maximum of the two AABB
//! minima), so each pair appears exactly once in the output no matter how
//! many cells it spans. The resulting pair *set* is deterministic for a
//! given AABB snapshot; the sequence order is not guaranteed to be stable
//! across thread-count changes.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use crate::data::{CollisionData, ShapeId};
use crate::families::CollisionFamilies;
use crate::foundation::math::Vec3;
use crate::settings::CollisionSettings;
use crate::shapes::Aabb;

/// Uniform grid parameters for one step
#[derive(Debug, Clone, Copy)]
struct Grid {
    origin: Vec3,
    cell_size: Vec3,
    bins: [u32; 3],
}

impl Grid {
    /// Choose the resolution from the scene box and the mean shape extent
    ///
    /// The cell edge targets the mean AABB extent scaled by the settings
    /// factor, clamped so no axis exceeds `max_bins_per_axis`. Degenerate
    /// axes collapse to a single cell, so a zero-volume scene falls back
    /// to a 1x1x1 grid.
    fn build(scene: &Aabb, mean_size: Vec3, settings: &CollisionSettings) -> Self {
        let size = scene.size();
        let max_bins = settings.max_bins_per_axis.max(1);
        let mut bins = [1u32; 3];
        let mut cell_size = Vec3::zeros();
        for axis in 0..3 {
            let extent = size[axis].max(0.0);
            let target = (mean_size[axis] * settings.cell_size_factor).max(1e-6);
            if extent > 0.0 {
                let n = (extent / target).ceil().clamp(1.0, max_bins as f32);
                bins[axis] = n as u32;
                cell_size[axis] = extent / n;
            }
        }
        Self {
            origin: scene.min,
            cell_size,
            bins,
        }
    }

    fn cell_count(&self) -> usize {
        self.bins[0] as usize * self.bins[1] as usize * self.bins[2] as usize
    }

    /// Grid coordinate of a world point, clamped into the grid
    fn coord(&self, p: Vec3) -> [u32; 3] {
        let mut c = [0u32; 3];
        for axis in 0..3 {
            if self.cell_size[axis] > 0.0 {
                let rel = ((p[axis] - self.origin[axis]) / self.cell_size[axis]).floor();
                c[axis] = rel.clamp(0.0, (self.bins[axis] - 1) as f32) as u32;
            }
        }
        c
    }

    fn index(&self, c: [u32; 3]) -> usize {
        (c[2] as usize * self.bins[1] as usize + c[1] as usize) * self.bins[0] as usize
            + c[0] as usize
    }

    /// Visit the index of every cell the AABB overlaps
    fn for_each_cell(&self, aabb: &Aabb, mut f: impl FnMut(usize)) {
        let lo = self.coord(aabb.min);
        let hi = self.coord(aabb.max);
        for z in lo[2]..=hi[2] {
            for y in lo[1]..=hi[1] {
                for x in lo[0]..=hi[0] {
                    f(self.index([x, y, z]));
                }
            }
        }
    }

    /// The single cell a pair is attributed to: the cell containing the
    /// minimum corner of the intersection of the two AABBs
    fn owner_cell(&self, a: &Aabb, b: &Aabb) -> usize {
        self.index(self.coord(a.min.sup(&b.min)))
    }
}

/// Broad-phase state: the grid scratch buffers, reused across steps
pub(crate) struct Broadphase {
    cell_counts: Vec<AtomicU32>,
    cell_starts: Vec<u32>,
    cell_cursors: Vec<AtomicU32>,
    cell_shapes: Vec<AtomicU32>,
}

impl Broadphase {
    pub(crate) fn new() -> Self {
        Self {
            cell_counts: Vec::new(),
            cell_starts: Vec::new(),
            cell_cursors: Vec::new(),
            cell_shapes: Vec::new(),
        }
    }

    /// Run the broad phase, filling `data.pairs` with the candidate pairs
    ///
    /// Every registered shape is binned; activity is applied per pair so
    /// that an active body still collides with an inactive one. A step
    /// with zero active shapes produces an empty pair list.
    pub(crate) fn dispatch(&mut self, data: &mut CollisionData, settings: &CollisionSettings) {
        data.pairs.clear();

        let active: Vec<u32> = (0..data.shapes.len() as u32)
            .filter(|&i| data.shape_active[i as usize])
            .collect();
        if active.is_empty() {
            return;
        }

        // Scene bounding box and mean extent over active shapes only; the
        // grid is sized for the part of the world that can produce work.
        let scene = active
            .par_iter()
            .map(|&i| data.aabbs[i as usize])
            .reduce(Aabb::inverted, |a, b| a.merged(&b));
        let extent_sum = active
            .par_iter()
            .map(|&i| data.aabbs[i as usize].size())
            .reduce(Vec3::zeros, |a, b| a + b);
        let mean_size = extent_sum / active.len() as f32;
        let grid = Grid::build(&scene, mean_size, settings);
        let cell_count = grid.cell_count();

        log::trace!(
            "broadphase grid: {}x{}x{} cells over {} active shapes",
            grid.bins[0],
            grid.bins[1],
            grid.bins[2],
            active.len()
        );

        let CollisionData {
            shape_body,
            shape_family,
            shape_family_mask,
            aabbs,
            shape_active,
            pairs,
            ..
        } = data;
        let shape_body = &*shape_body;
        let shape_family = &*shape_family;
        let shape_family_mask = &*shape_family_mask;
        let aabbs = &*aabbs;
        let shape_active = &*shape_active;
        let shape_count = aabbs.len();

        // Pass 1: count shapes per cell.
        self.cell_counts.resize_with(cell_count, || AtomicU32::new(0));
        let counts = &self.cell_counts;
        counts.par_iter().for_each(|c| c.store(0, Ordering::Relaxed));
        (0..shape_count).into_par_iter().for_each(|i| {
            grid.for_each_cell(&aabbs[i], |cell| {
                counts[cell].fetch_add(1, Ordering::Relaxed);
            });
        });

        // Exclusive prefix sum over the cell counts: the single serial
        // section of the broad phase, O(#cells).
        self.cell_starts.clear();
        self.cell_starts.resize(cell_count + 1, 0);
        let mut total = 0u32;
        for cell in 0..cell_count {
            self.cell_starts[cell] = total;
            total += counts[cell].load(Ordering::Relaxed);
        }
        self.cell_starts[cell_count] = total;

        // Pass 2: scatter shape ids into the flat cell-sorted array.
        self.cell_cursors.resize_with(cell_count, || AtomicU32::new(0));
        for cell in 0..cell_count {
            self.cell_cursors[cell].store(self.cell_starts[cell], Ordering::Relaxed);
        }
        self.cell_shapes.resize_with(total as usize, || AtomicU32::new(0));
        let cursors = &self.cell_cursors;
        let slots = &self.cell_shapes;
        (0..shape_count).into_par_iter().for_each(|i| {
            grid.for_each_cell(&aabbs[i], |cell| {
                let slot = cursors[cell].fetch_add(1, Ordering::Relaxed) as usize;
                slots[slot].store(i as u32, Ordering::Relaxed);
            });
        });

        // Pair generation per cell. A coarse cell hit does not guarantee
        // AABB overlap at cell boundaries, so the exact test is repeated.
        let starts = &self.cell_starts;
        pairs.par_extend((0..cell_count).into_par_iter().flat_map_iter(|cell| {
            let lo = starts[cell] as usize;
            let hi = starts[cell + 1] as usize;
            let mut found = Vec::new();
            for x in lo..hi {
                for y in (x + 1)..hi {
                    let a = slots[x].load(Ordering::Relaxed);
                    let b = slots[y].load(Ordering::Relaxed);
                    let (a, b) = if a <= b { (a, b) } else { (b, a) };
                    let (ia, ib) = (a as usize, b as usize);
                    if shape_body[ia] == shape_body[ib] {
                        continue; // same-body shape pairs are excluded
                    }
                    if !shape_active[ia] && !shape_active[ib] {
                        continue;
                    }
                    if !CollisionFamilies::should_collide(
                        shape_family[ia],
                        shape_family_mask[ia],
                        shape_family[ib],
                        shape_family_mask[ib],
                    ) {
                        continue;
                    }
                    if !aabbs[ia].intersects(&aabbs[ib]) {
                        continue;
                    }
                    if grid.owner_cell(&aabbs[ia], &aabbs[ib]) != cell {
                        continue;
                    }
                    found.push((ShapeId(a), ShapeId(b)));
                }
            }
            found.into_iter()
        }));
    }
}
