//! Authoritative cell ownership with a per-world reverse index.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, WorldId};
use crate::groups::GroupId;

/// Raw claim triple exchanged with the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub world: WorldId,
    pub x: i32,
    pub z: i32,
    pub group: GroupId,
}

impl ClaimRecord {
    pub fn cell(&self) -> Cell {
        Cell::new(self.world, self.x, self.z)
    }
}

#[derive(Debug, Clone, Default)]
struct WorldLayer {
    owners: AHashMap<Cell, GroupId>,
    by_group: AHashMap<GroupId, AHashSet<Cell>>,
}

impl WorldLayer {
    fn insert(&mut self, cell: Cell, group: GroupId) -> Option<GroupId> {
        let previous = self.owners.insert(cell, group);
        if let Some(prev) = previous {
            if prev == group {
                return previous;
            }
            self.detach(prev, cell);
        }
        self.by_group.entry(group).or_default().insert(cell);
        previous
    }

    fn remove(&mut self, cell: Cell) -> Option<GroupId> {
        let previous = self.owners.remove(&cell)?;
        self.detach(previous, cell);
        Some(previous)
    }

    fn detach(&mut self, group: GroupId, cell: Cell) {
        if let Some(cells) = self.by_group.get_mut(&group) {
            cells.remove(&cell);
            if cells.is_empty() {
                self.by_group.remove(&group);
            }
        }
    }
}

/// Cell → owner map plus `(group, world) → cells` and per-group totals.
///
/// Every mutation updates all three views before returning, so a caller
/// holding the engine lock never observes them out of step.
#[derive(Debug, Clone, Default)]
pub struct ClaimGrid {
    worlds: AHashMap<WorldId, WorldLayer>,
    totals: AHashMap<GroupId, usize>,
}

impl ClaimGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self, cell: Cell) -> Option<GroupId> {
        self.worlds
            .get(&cell.world)
            .and_then(|layer| layer.owners.get(&cell))
            .copied()
    }

    /// Unconditional insert used when loading persisted claims.
    ///
    /// Returns the previous owner if the cell was already claimed.
    pub fn claim_raw(&mut self, cell: Cell, group: GroupId) -> Option<GroupId> {
        let previous = self
            .worlds
            .entry(cell.world)
            .or_default()
            .insert(cell, group);
        match previous {
            Some(prev) if prev == group => {}
            Some(prev) => {
                self.decrement(prev);
                *self.totals.entry(group).or_default() += 1;
            }
            None => *self.totals.entry(group).or_default() += 1,
        }
        previous
    }

    /// Record a validated claim.
    pub fn claim(&mut self, cell: Cell, group: GroupId) {
        let previous = self.claim_raw(cell, group);
        debug_assert!(
            previous.is_none(),
            "claim applied over existing owner {previous:?} at {cell}"
        );
    }

    /// Remove the owner of `cell`, returning it.
    pub fn unclaim(&mut self, cell: Cell) -> Option<GroupId> {
        let layer = self.worlds.get_mut(&cell.world)?;
        let previous = layer.remove(cell)?;
        if layer.owners.is_empty() {
            self.worlds.remove(&cell.world);
        }
        self.decrement(previous);
        Some(previous)
    }

    /// Cells owned by `group` in `world`, if any.
    pub fn cells_of(&self, group: GroupId, world: WorldId) -> Option<&AHashSet<Cell>> {
        self.worlds
            .get(&world)
            .and_then(|layer| layer.by_group.get(&group))
    }

    pub fn count_in(&self, group: GroupId, world: WorldId) -> usize {
        self.cells_of(group, world).map_or(0, |cells| cells.len())
    }

    /// Total cells owned by `group` across every world.
    pub fn count_of(&self, group: GroupId) -> usize {
        self.totals.get(&group).copied().unwrap_or(0)
    }

    pub fn owns_any_in(&self, group: GroupId, world: WorldId) -> bool {
        self.count_in(group, world) > 0
    }

    /// Worlds in which `group` owns at least one cell, ascending.
    pub fn worlds_of(&self, group: GroupId) -> Vec<WorldId> {
        let mut worlds: Vec<_> = self
            .worlds
            .iter()
            .filter(|(_, layer)| layer.by_group.contains_key(&group))
            .map(|(world, _)| *world)
            .collect();
        worlds.sort_unstable();
        worlds
    }

    /// Release every cell `group` owns in `world`.
    pub fn release_group_in(&mut self, group: GroupId, world: WorldId) -> usize {
        let Some(layer) = self.worlds.get_mut(&world) else {
            return 0;
        };
        let Some(cells) = layer.by_group.remove(&group) else {
            return 0;
        };
        for cell in &cells {
            layer.owners.remove(cell);
        }
        if layer.owners.is_empty() {
            self.worlds.remove(&world);
        }
        let released = cells.len();
        if let Some(total) = self.totals.get_mut(&group) {
            *total = total.saturating_sub(released);
            if *total == 0 {
                self.totals.remove(&group);
            }
        }
        released
    }

    /// Release every cell `group` owns in every world.
    pub fn release_group(&mut self, group: GroupId) -> usize {
        self.worlds_of(group)
            .into_iter()
            .map(|world| self.release_group_in(group, world))
            .sum()
    }

    /// Total number of claimed cells.
    pub fn len(&self) -> usize {
        self.worlds.values().map(|layer| layer.owners.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    /// All claims sorted by world, then row-major position.
    pub fn records(&self) -> Vec<ClaimRecord> {
        let mut records: Vec<ClaimRecord> = self
            .worlds
            .values()
            .flat_map(|layer| layer.owners.iter())
            .map(|(cell, group)| ClaimRecord {
                world: cell.world,
                x: cell.x,
                z: cell.z,
                group: *group,
            })
            .collect();
        records.sort_unstable_by_key(|record| record.cell().row_major_key());
        records
    }

    fn decrement(&mut self, group: GroupId) {
        if let Some(total) = self.totals.get_mut(&group) {
            *total = total.saturating_sub(1);
            if *total == 0 {
                self.totals.remove(&group);
            }
        }
    }
}
