use std::collections::BTreeMap;

use serde::Serialize;

use crate::cell::{Cell, WorldId};
use crate::rules::ClaimOutcome;

/// Inclusive rectangle of cells in one world, corners normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub world: WorldId,
    pub min_x: i32,
    pub min_z: i32,
    pub max_x: i32,
    pub max_z: i32,
}

impl CellRect {
    pub fn from_corners(world: WorldId, x1: i32, z1: i32, x2: i32, z2: i32) -> Self {
        Self {
            world,
            min_x: x1.min(x2),
            min_z: z1.min(z2),
            max_x: x1.max(x2),
            max_z: z1.max(z2),
        }
    }

    pub fn width(&self) -> u64 {
        (self.max_x as i64 - self.min_x as i64 + 1) as u64
    }

    pub fn depth(&self) -> u64 {
        (self.max_z as i64 - self.min_z as i64 + 1) as u64
    }

    pub fn area(&self) -> u64 {
        self.width().saturating_mul(self.depth())
    }

    /// Cells in row-major order: z outer, x inner.
    pub fn cells(&self) -> impl Iterator<Item = Cell> {
        let Self {
            world,
            min_x,
            min_z,
            max_x,
            max_z,
        } = *self;
        (min_z..=max_z).flat_map(move |z| (min_x..=max_x).map(move |x| Cell::new(world, x, z)))
    }
}

/// Counts reported by a rectangular claim or unclaim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    /// Cells attempted.
    pub total: u64,
    /// Cells that were claimed (or released).
    pub applied: u64,
    /// Rejected cells keyed by the rule that stopped them.
    pub rejections: BTreeMap<ClaimOutcome, u64>,
}

impl BulkSummary {
    pub fn rejected(&self) -> u64 {
        self.total - self.applied
    }

    fn record(&mut self, outcome: ClaimOutcome) {
        self.total += 1;
        if outcome.is_success() {
            self.applied += 1;
        } else {
            *self.rejections.entry(outcome).or_default() += 1;
        }
    }
}

/// Run `apply` over every cell of `rect`, skipping failures.
///
/// `apply` sees the state left behind by earlier cells, so a rectangle that
/// touches existing territory fills in row by row.
pub fn for_each_cell<F>(rect: CellRect, mut apply: F) -> BulkSummary
where
    F: FnMut(Cell) -> ClaimOutcome,
{
    let mut summary = BulkSummary::default();
    for cell in rect.cells() {
        summary.record(apply(cell));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: WorldId = WorldId(0);

    #[test]
    fn corners_are_normalized() {
        let rect = CellRect::from_corners(W, 3, -1, -2, 4);
        assert_eq!((rect.min_x, rect.min_z, rect.max_x, rect.max_z), (-2, -1, 3, 4));
        assert_eq!(rect.area(), 36);
        assert_eq!(rect.cells().count(), 36);
    }

    #[test]
    fn iteration_is_row_major() {
        let rect = CellRect::from_corners(W, 1, 1, 0, 0);
        let cells: Vec<_> = rect.cells().map(|c| (c.x, c.z)).collect();
        assert_eq!(cells, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn failures_are_tallied_not_fatal() {
        let rect = CellRect::from_corners(W, 0, 0, 2, 0);
        let summary = for_each_cell(rect, |cell| {
            if cell.x == 1 {
                ClaimOutcome::TooCloseToOthers
            } else {
                ClaimOutcome::Success
            }
        });
        assert_eq!(summary.total, 3);
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.rejected(), 1);
        assert_eq!(summary.rejections.get(&ClaimOutcome::TooCloseToOthers), Some(&1));
    }
}
