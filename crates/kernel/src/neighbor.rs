//! Spatial hash grid for neighbor search.
//!
//! Particles are bucketed by the hash of their integer cell coordinate,
//! reduced modulo the particle count. The table is a flat list of
//! `(particle index, cell key)` entries sorted by key plus a start-index
//! table, so no per-cell allocation or pointer chasing is needed. The whole
//! structure is rebuilt every step from current positions.

use std::marker::PhantomData;

use rayon::prelude::*;

use crate::vector::SimVector;

/// Start-index value for keys that no particle maps to.
pub const EMPTY_KEY: u32 = u32::MAX;

/// One grid entry: a particle and the key of the cell it sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridEntry {
    /// Particle index into the particle store.
    pub index: u32,
    /// Cell key, `hash(cell) % particle_count`.
    pub key: u32,
}

/// Hash grid over `V`-dimensional positions.
///
/// Cell size equals the smoothing radius, so the 9 (2D) or 27 (3D) cells
/// around a particle hold every particle within one radius of it. Distinct
/// cells may share a key; queries re-check true distances.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid<V: SimVector> {
    radius: f32,
    /// Entries sorted ascending by key after [`rebuild`](Self::rebuild).
    entries: Vec<GridEntry>,
    /// First sorted entry for each key, or [`EMPTY_KEY`].
    start_indices: Vec<u32>,
    _vector: PhantomData<V>,
}

impl<V: SimVector> Default for SpatialHashGrid<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: SimVector> SpatialHashGrid<V> {
    /// Empty grid.
    pub fn new() -> Self {
        Self {
            radius: 1.0,
            entries: Vec::new(),
            start_indices: Vec::new(),
            _vector: PhantomData,
        }
    }

    /// Number of entries (equals the particle count after a rebuild or resize).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the grid holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cell size used by the last rebuild.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Sorted entries.
    pub fn entries(&self) -> &[GridEntry] {
        &self.entries
    }

    /// Start-index table, one slot per key.
    pub fn start_indices(&self) -> &[u32] {
        &self.start_indices
    }

    /// Resize both tables to `count` slots and invalidate their contents.
    ///
    /// Nothing in the resized grid refers to a particle index `>= count`;
    /// call [`rebuild`](Self::rebuild) before querying again.
    pub fn resize(&mut self, count: usize) {
        self.entries.clear();
        self.entries.resize(count, GridEntry::default());
        self.start_indices.clear();
        self.start_indices.resize(count, EMPTY_KEY);
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.index = i as u32;
        }
    }

    /// Key of the cell containing `position` for the current table size.
    #[inline]
    pub fn cell_key(&self, position: V) -> u32 {
        self.key_for_cell(position.cell_coordinate(self.radius))
    }

    #[inline]
    fn key_for_cell(&self, cell: V::Cell) -> u32 {
        V::hash_cell(cell) % self.entries.len() as u32
    }

    /// Rebuild the grid from current particle positions.
    ///
    /// Keys are computed in parallel, the entries are parallel-sorted by
    /// `(key, index)` and a single scan records where each key run starts.
    pub fn rebuild(&mut self, positions: &[V], radius: f32) {
        let n = positions.len();
        self.radius = radius;
        if self.entries.len() != n {
            self.resize(n);
        }
        if n == 0 {
            return;
        }

        // --- 1. Key for every particle ---
        let table_size = n as u32;
        self.entries
            .par_iter_mut()
            .zip(positions.par_iter())
            .enumerate()
            .for_each(|(i, (entry, &position))| {
                let cell = position.cell_coordinate(radius);
                *entry = GridEntry {
                    index: i as u32,
                    key: V::hash_cell(cell) % table_size,
                };
            });

        // --- 2. Sort by key; index breaks ties so the order is reproducible ---
        self.entries
            .par_sort_unstable_by_key(|entry| (entry.key, entry.index));

        // --- 3. Record the first entry of every key run ---
        self.start_indices.par_iter_mut().for_each(|s| *s = EMPTY_KEY);
        let entries = &self.entries;
        let run_starts: Vec<(u32, u32)> = entries
            .par_iter()
            .enumerate()
            .filter(|&(i, entry)| i == 0 || entries[i - 1].key != entry.key)
            .map(|(i, entry)| (entry.key, i as u32))
            .collect();
        for (key, start) in run_starts {
            self.start_indices[key as usize] = start;
        }
    }

    /// Call `f` with every particle within the grid radius of particle `i`,
    /// including `i` itself.
    ///
    /// The query cell comes from `positions[i]` and the distance check uses
    /// `positions` as well, so pass the same slice the grid was built from.
    pub fn for_each_neighbor<F>(&self, i: usize, positions: &[V], mut f: F)
    where
        F: FnMut(usize),
    {
        if self.entries.is_empty() {
            return;
        }
        let origin = positions[i];
        let center = origin.cell_coordinate(self.radius);
        let radius_sq = self.radius * self.radius;

        // Distinct cells can reduce to the same key; scan each key once.
        let mut visited = [EMPTY_KEY; 27];
        let mut visited_len = 0;

        for &offset in V::cell_offsets() {
            let key = self.key_for_cell(center + offset);
            if visited[..visited_len].contains(&key) {
                continue;
            }
            visited[visited_len] = key;
            visited_len += 1;

            let start = self.start_indices[key as usize];
            if start == EMPTY_KEY {
                continue;
            }
            for entry in self.entries[start as usize..]
                .iter()
                .take_while(|entry| entry.key == key)
            {
                let j = entry.index as usize;
                if origin.distance_squared(positions[j]) <= radius_sq {
                    f(j);
                }
            }
        }
    }

    /// Fill `out` with the neighbors of particle `i` (self included).
    pub fn query_into(&self, i: usize, positions: &[V], out: &mut Vec<u32>) {
        out.clear();
        self.for_each_neighbor(i, positions, |j| out.push(j as u32));
    }

    /// Neighbors of particle `i` within the grid radius, self included.
    pub fn query_neighbors(&self, i: usize, positions: &[V]) -> Vec<u32> {
        let mut out = Vec::new();
        self.query_into(i, positions, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    #[test]
    fn empty_grid() {
        let mut grid = SpatialHashGrid::<Vec2>::new();
        grid.rebuild(&[], 1.0);
        assert!(grid.is_empty());
        assert!(grid.start_indices().is_empty());
    }

    #[test]
    fn single_particle_finds_itself() {
        let positions = [Vec3::new(0.5, 0.5, 0.5)];
        let mut grid = SpatialHashGrid::new();
        grid.rebuild(&positions, 0.1);
        assert_eq!(grid.query_neighbors(0, &positions), vec![0]);
    }

    #[test]
    fn two_close_particles() {
        let positions = [Vec2::new(0.5, 0.5), Vec2::new(0.55, 0.5)];
        let mut grid = SpatialHashGrid::new();
        grid.rebuild(&positions, 0.1);

        let mut n0 = grid.query_neighbors(0, &positions);
        n0.sort_unstable();
        assert_eq!(n0, vec![0, 1]);
    }

    #[test]
    fn particles_across_cell_boundary() {
        // Particles just either side of x = 1.0 with cell size 1.0.
        let positions = [Vec2::new(0.99, 0.0), Vec2::new(1.01, 0.0)];
        let mut grid = SpatialHashGrid::new();
        grid.rebuild(&positions, 1.0);

        let mut n = grid.query_neighbors(1, &positions);
        n.sort_unstable();
        assert_eq!(n, vec![0, 1]);
    }

    #[test]
    fn far_particles_are_excluded() {
        let positions = [Vec2::new(0.0, 0.0), Vec2::new(1.5, 0.0), Vec2::new(0.0, 5.0)];
        let mut grid = SpatialHashGrid::new();
        grid.rebuild(&positions, 1.0);
        assert_eq!(grid.query_neighbors(0, &positions), vec![0]);
    }

    #[test]
    fn entries_sorted_and_start_indices_consistent() {
        let positions: Vec<Vec2> = (0..200)
            .map(|i| Vec2::new((i % 17) as f32 * 0.7, (i / 17) as f32 * 0.9))
            .collect();
        let mut grid = SpatialHashGrid::new();
        grid.rebuild(&positions, 1.0);

        let entries = grid.entries();
        assert_eq!(entries.len(), 200);
        assert!(entries.windows(2).all(|w| w[0].key <= w[1].key));
        for (key, &start) in grid.start_indices().iter().enumerate() {
            if start == EMPTY_KEY {
                assert!(entries.iter().all(|e| e.key != key as u32));
            } else {
                let start = start as usize;
                assert_eq!(entries[start].key, key as u32);
                assert!(start == 0 || entries[start - 1].key != key as u32);
            }
        }
    }

    #[test]
    fn many_particles_in_cluster() {
        let positions: Vec<Vec3> = (0..27)
            .map(|i| {
                Vec3::new(
                    (i % 3) as f32 * 0.01,
                    ((i / 3) % 3) as f32 * 0.01,
                    (i / 9) as f32 * 0.01,
                )
            })
            .collect();
        let mut grid = SpatialHashGrid::new();
        grid.rebuild(&positions, 0.1);
        for i in 0..positions.len() {
            assert_eq!(grid.query_neighbors(i, &positions).len(), 27);
        }
    }
}
