//! Cell grid over the slab plus halo band, rebuilt from predicted
//! positions every substep, and the neighbor lists derived from it.

use glam::Vec2;

/// Hard cap on stored neighbors per particle; the density constraint
/// saturates well below this for sensible rest densities.
pub const MAX_NEIGHBOURS: usize = 64;

const EMPTY: i32 = -1;

/// Uniform grid with cell size equal to the smoothing radius. Buckets are
/// singly-linked lists threaded through `next`, newest first.
pub struct CellGrid {
    origin: Vec2,
    cells_x: usize,
    cells_y: usize,
    cell_size: f32,
    heads: Vec<i32>,
    next: Vec<i32>,
}

impl CellGrid {
    /// Bucket every position. `origin`/`size` must cover the slab plus a
    /// halo band on each side; positions outside are clamped into the
    /// edge cells rather than rejected.
    pub fn build(origin: Vec2, size: Vec2, cell_size: f32, positions: &[Vec2]) -> Self {
        debug_assert!(cell_size > 0.0);
        let cells_x = (size.x / cell_size).ceil().max(1.0) as usize;
        let cells_y = (size.y / cell_size).ceil().max(1.0) as usize;
        let mut grid = Self {
            origin,
            cells_x,
            cells_y,
            cell_size,
            heads: vec![EMPTY; cells_x * cells_y],
            next: vec![EMPTY; positions.len()],
        };
        for (i, pos) in positions.iter().enumerate() {
            let cell = grid.cell_index(*pos);
            grid.next[i] = grid.heads[cell];
            grid.heads[cell] = i as i32;
        }
        grid
    }

    fn cell_coords(&self, pos: Vec2) -> (usize, usize) {
        let x = ((pos.x - self.origin.x) / self.cell_size).floor() as isize;
        let y = ((pos.y - self.origin.y) / self.cell_size).floor() as isize;
        (
            x.clamp(0, self.cells_x as isize - 1) as usize,
            y.clamp(0, self.cells_y as isize - 1) as usize,
        )
    }

    fn cell_index(&self, pos: Vec2) -> usize {
        let (x, y) = self.cell_coords(pos);
        y * self.cells_x + x
    }

    fn for_each_in_cell(&self, x: usize, y: usize, mut f: impl FnMut(usize)) {
        let mut current = self.heads[y * self.cells_x + x];
        while current != EMPTY {
            f(current as usize);
            current = self.next[current as usize];
        }
    }
}

/// Per-particle neighbor indices into the combined owned + halo store.
/// Flat layout, `MAX_NEIGHBOURS` slots per particle.
pub struct NeighborLists {
    indices: Vec<u32>,
    counts: Vec<u32>,
}

impl NeighborLists {
    pub fn new() -> Self {
        Self {
            indices: Vec::new(),
            counts: Vec::new(),
        }
    }

    pub fn of(&self, i: usize) -> &[u32] {
        let start = i * MAX_NEIGHBOURS;
        &self.indices[start..start + self.counts[i] as usize]
    }

    /// Drop all recorded neighbors and size the lists for `num_particles`
    /// owners.
    pub fn clear(&mut self, num_particles: usize) {
        self.indices.clear();
        self.indices.resize(num_particles * MAX_NEIGHBOURS, 0);
        self.counts.clear();
        self.counts.resize(num_particles, 0);
    }

    /// Rebuild the lists for the first `num_owned` positions. Halo
    /// particles appear as neighbors but get no list of their own. Each
    /// neighbor is found through exactly one bucket, so no index can be
    /// recorded twice.
    pub fn rebuild(
        &mut self,
        grid: &CellGrid,
        positions: &[Vec2],
        num_owned: usize,
        smoothing_radius: f32,
    ) {
        self.clear(num_owned);
        let h2 = smoothing_radius * smoothing_radius;
        for i in 0..num_owned {
            let (cx, cy) = grid.cell_coords(positions[i]);
            let mut count = 0usize;
            let base = i * MAX_NEIGHBOURS;
            for y in cy.saturating_sub(1)..=(cy + 1).min(grid.cells_y - 1) {
                for x in cx.saturating_sub(1)..=(cx + 1).min(grid.cells_x - 1) {
                    grid.for_each_in_cell(x, y, |j| {
                        if j == i || count == MAX_NEIGHBOURS {
                            return;
                        }
                        if positions[i].distance_squared(positions[j]) <= h2 {
                            self.indices[base + count] = j as u32;
                            count += 1;
                        }
                    });
                }
            }
            self.counts[i] = count as u32;
        }
    }
}

impl Default for NeighborLists {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use rand::Rng;
    use rand::SeedableRng;

    use super::CellGrid;
    use super::NeighborLists;
    use super::MAX_NEIGHBOURS;

    const H: f32 = 0.25;

    fn build_lists(positions: &[Vec2], num_owned: usize) -> NeighborLists {
        let grid = CellGrid::build(Vec2::ZERO, Vec2::new(2.0, 2.0), H, positions);
        let mut lists = NeighborLists::new();
        lists.rebuild(&grid, positions, num_owned, H);
        lists
    }

    #[test]
    fn finds_the_same_pairs_as_brute_force() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(17);
        let positions: Vec<_> = (0..200)
            .map(|_| Vec2::new(rng.gen::<f32>() * 2.0, rng.gen::<f32>() * 2.0))
            .collect();
        let lists = build_lists(&positions, positions.len());
        for i in 0..positions.len() {
            let mut expected: Vec<u32> = (0..positions.len())
                .filter(|j| *j != i)
                .filter(|j| positions[i].distance(positions[*j]) <= H)
                .map(|j| j as u32)
                .collect();
            let mut actual = lists.of(i).to_vec();
            expected.sort();
            actual.sort();
            assert_eq!(actual, expected, "particle {}", i);
        }
    }

    #[test]
    fn halo_particles_are_found_but_get_no_list() {
        let positions = vec![Vec2::new(0.5, 0.5), Vec2::new(0.6, 0.5)];
        let lists = build_lists(&positions, 1);
        assert_eq!(lists.of(0), &[1]);
    }

    #[test]
    fn neighbor_count_is_capped() {
        // Pile more particles onto one spot than a list can hold.
        let mut positions = vec![Vec2::new(1.0, 1.0)];
        for i in 0..2 * MAX_NEIGHBOURS {
            let angle = i as f32 * 0.1;
            positions.push(Vec2::new(1.0, 1.0) + 0.01 * Vec2::new(angle.cos(), angle.sin()));
        }
        let lists = build_lists(&positions, 1);
        assert_eq!(lists.of(0).len(), MAX_NEIGHBOURS);
    }

    #[test]
    fn out_of_range_positions_land_in_edge_cells() {
        let positions = vec![Vec2::new(-5.0, 0.1), Vec2::new(0.05, 0.1)];
        let lists = build_lists(&positions, 2);
        // Both are clamped into the leftmost cell column but the true
        // distance still decides neighborhood.
        assert!(lists.of(1).is_empty());
    }
}
