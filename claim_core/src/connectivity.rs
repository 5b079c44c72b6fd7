//! Flood-fill component analysis over a group's cells in one world.
//!
//! Territories are sparse, so the fill walks a hash set of owned cells with an
//! explicit queue instead of a dense raster.

use std::collections::VecDeque;

use ahash::AHashSet;
use serde::Serialize;

use crate::cell::{Cell, WorldId};
use crate::grid::ClaimGrid;
use crate::groups::GroupId;

/// Component breakdown of one group's territory in one world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectivityReport {
    pub component_count: usize,
    /// Component sizes, largest first.
    pub component_sizes: Vec<usize>,
    /// Up to the configured number of sample cells per component, aligned with
    /// `component_sizes`.
    pub samples: Vec<Vec<Cell>>,
}

impl ConnectivityReport {
    pub fn is_connected(&self) -> bool {
        self.component_count <= 1
    }

    pub fn total_cells(&self) -> usize {
        self.component_sizes.iter().sum()
    }

    /// Components beyond the largest one.
    pub fn detached_components(&self) -> usize {
        self.component_count.saturating_sub(1)
    }
}

/// Analyze `group`'s territory in `world` as it stands.
pub fn analyze(
    grid: &ClaimGrid,
    group: GroupId,
    world: WorldId,
    sample_limit: usize,
) -> ConnectivityReport {
    match grid.cells_of(group, world) {
        Some(cells) => analyze_cells(cells, None, sample_limit),
        None => ConnectivityReport::default(),
    }
}

/// Analyze `group`'s territory in `removed.world` as if `removed` were
/// unclaimed. The grid is not touched.
pub fn analyze_after_removal(
    grid: &ClaimGrid,
    group: GroupId,
    removed: Cell,
    sample_limit: usize,
) -> ConnectivityReport {
    match grid.cells_of(group, removed.world) {
        Some(cells) => analyze_cells(cells, Some(removed), sample_limit),
        None => ConnectivityReport::default(),
    }
}

/// Count components without collecting sizes or samples.
pub fn component_count(cells: &AHashSet<Cell>, excluded: Option<Cell>) -> usize {
    let mut visited: AHashSet<Cell> = AHashSet::with_capacity(cells.len());
    let mut queue = VecDeque::new();
    let mut count = 0;
    for &start in cells {
        if Some(start) == excluded || visited.contains(&start) {
            continue;
        }
        count += 1;
        flood(cells, excluded, start, &mut visited, &mut queue, |_| {});
    }
    count
}

/// Core analysis over an arbitrary cell set.
///
/// Seeds are visited in row-major order so that discovery order, and with it
/// the tie-break between equally sized components, is reproducible.
pub fn analyze_cells(
    cells: &AHashSet<Cell>,
    excluded: Option<Cell>,
    sample_limit: usize,
) -> ConnectivityReport {
    let mut seeds: Vec<Cell> = cells
        .iter()
        .copied()
        .filter(|cell| Some(*cell) != excluded)
        .collect();
    seeds.sort_unstable_by_key(|cell| cell.row_major_key());

    let mut visited: AHashSet<Cell> = AHashSet::with_capacity(seeds.len());
    let mut queue = VecDeque::new();
    let mut components: Vec<(usize, Vec<Cell>)> = Vec::new();

    for start in seeds {
        if visited.contains(&start) {
            continue;
        }
        let mut size = 0usize;
        let mut samples = Vec::with_capacity(sample_limit);
        flood(cells, excluded, start, &mut visited, &mut queue, |cell| {
            size += 1;
            if samples.len() < sample_limit {
                samples.push(cell);
            }
        });
        components.push((size, samples));
    }

    // Stable sort keeps discovery order among equal sizes.
    components.sort_by(|a, b| b.0.cmp(&a.0));

    ConnectivityReport {
        component_count: components.len(),
        component_sizes: components.iter().map(|(size, _)| *size).collect(),
        samples: components.into_iter().map(|(_, samples)| samples).collect(),
    }
}

/// The component of `cells` that contains `start`, with `excluded` removed.
///
/// Returns an empty set when `start` is not part of `cells`.
pub fn component_containing(
    cells: &AHashSet<Cell>,
    start: Cell,
    excluded: Option<Cell>,
) -> AHashSet<Cell> {
    let mut visited = AHashSet::new();
    if !cells.contains(&start) || Some(start) == excluded {
        return visited;
    }
    let mut queue = VecDeque::new();
    flood(cells, excluded, start, &mut visited, &mut queue, |_| {});
    visited
}

fn flood<F>(
    cells: &AHashSet<Cell>,
    excluded: Option<Cell>,
    start: Cell,
    visited: &mut AHashSet<Cell>,
    queue: &mut VecDeque<Cell>,
    mut on_visit: F,
) where
    F: FnMut(Cell),
{
    queue.clear();
    visited.insert(start);
    queue.push_back(start);
    while let Some(cell) = queue.pop_front() {
        on_visit(cell);
        for next in cell.edge_neighbors() {
            if Some(next) == excluded || !cells.contains(&next) || visited.contains(&next) {
                continue;
            }
            visited.insert(next);
            queue.push_back(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: WorldId = WorldId(0);

    fn set(coords: &[(i32, i32)]) -> AHashSet<Cell> {
        coords.iter().map(|&(x, z)| Cell::new(W, x, z)).collect()
    }

    #[test]
    fn empty_set_has_no_components() {
        let report = analyze_cells(&AHashSet::new(), None, 3);
        assert_eq!(report, ConnectivityReport::default());
        assert!(report.is_connected());
    }

    #[test]
    fn diagonal_cells_are_separate_components() {
        let cells = set(&[(0, 0), (1, 1)]);
        let report = analyze_cells(&cells, None, 3);
        assert_eq!(report.component_count, 2);
        assert_eq!(report.component_sizes, vec![1, 1]);
        assert_eq!(component_count(&cells, None), 2);
    }

    #[test]
    fn removing_a_bridge_splits_the_line() {
        let cells = set(&[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]);
        assert_eq!(analyze_cells(&cells, None, 3).component_count, 1);

        let split = analyze_cells(&cells, Some(Cell::new(W, 2, 0)), 3);
        assert_eq!(split.component_count, 2);
        assert_eq!(split.component_sizes, vec![2, 2]);
        assert_eq!(
            split.samples[0],
            vec![Cell::new(W, 0, 0), Cell::new(W, 1, 0)],
            "ties keep discovery order"
        );

        let trimmed = analyze_cells(&cells, Some(Cell::new(W, 4, 0)), 3);
        assert_eq!(trimmed.component_count, 1);
        assert_eq!(trimmed.total_cells(), 4);
    }

    #[test]
    fn components_sorted_by_size_with_capped_samples() {
        let cells = set(&[(0, 0), (10, 0), (10, 1), (10, 2), (10, 3), (20, 20), (21, 20)]);
        let report = analyze_cells(&cells, None, 3);
        assert_eq!(report.component_sizes, vec![4, 2, 1]);
        assert_eq!(report.samples[0].len(), 3);
        assert_eq!(report.samples[2], vec![Cell::new(W, 0, 0)]);
        assert_eq!(report.detached_components(), 2);
    }

    #[test]
    fn component_containing_respects_exclusion() {
        let cells = set(&[(0, 0), (1, 0), (2, 0)]);
        let left = component_containing(&cells, Cell::new(W, 0, 0), Some(Cell::new(W, 1, 0)));
        assert_eq!(left.len(), 1);
        let whole = component_containing(&cells, Cell::new(W, 2, 0), None);
        assert_eq!(whole.len(), 3);
        assert!(component_containing(&cells, Cell::new(W, 9, 9), None).is_empty());
    }
}
