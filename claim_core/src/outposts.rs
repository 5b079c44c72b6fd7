use ahash::AHashMap;

use crate::cell::{Cell, WorldId};
use crate::groups::GroupId;

/// Purchased outpost slots and registered centers for one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutpostState {
    pub allowance: u32,
    pub centers: Vec<Cell>,
}

/// Tracks outpost allowance and the centers that anchor outpost components.
#[derive(Debug, Clone)]
pub struct OutpostManager {
    radius: u32,
    max_allowance: u32,
    states: AHashMap<GroupId, OutpostState>,
}

impl OutpostManager {
    pub fn new(radius: u32, max_allowance: u32) -> Self {
        Self {
            radius,
            max_allowance,
            states: AHashMap::new(),
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn allowance(&self, group: GroupId) -> u32 {
        self.states.get(&group).map_or(0, |state| state.allowance)
    }

    /// Add purchased slots, saturating at the configured maximum. Returns the
    /// new allowance.
    pub fn add_allowance(&mut self, group: GroupId, amount: u32) -> u32 {
        let state = self.states.entry(group).or_default();
        state.allowance = state
            .allowance
            .saturating_add(amount)
            .min(self.max_allowance);
        state.allowance
    }

    pub fn register_center(&mut self, group: GroupId, center: Cell) {
        let state = self.states.entry(group).or_default();
        if !state.centers.contains(&center) {
            state.centers.push(center);
        }
    }

    /// Returns `true` if `center` was registered for `group`.
    pub fn retire_center(&mut self, group: GroupId, center: Cell) -> bool {
        let Some(state) = self.states.get_mut(&group) else {
            return false;
        };
        let before = state.centers.len();
        state.centers.retain(|existing| *existing != center);
        state.centers.len() != before
    }

    pub fn centers(&self, group: GroupId) -> &[Cell] {
        self.states
            .get(&group)
            .map(|state| state.centers.as_slice())
            .unwrap_or(&[])
    }

    pub fn centers_in(&self, group: GroupId, world: WorldId) -> impl Iterator<Item = Cell> + '_ {
        self.centers(group)
            .iter()
            .copied()
            .filter(move |center| center.world == world)
    }

    pub fn is_center(&self, group: GroupId, cell: Cell) -> bool {
        self.centers(group).contains(&cell)
    }

    /// Whether `cell` lies inside the square bound of any of `group`'s centers.
    pub fn is_within_outpost_range(&self, group: GroupId, cell: Cell) -> bool {
        self.centers_in(group, cell.world)
            .any(|center| self.in_bound(center, cell))
    }

    /// Whether `cell` falls in the square bound around `center`.
    pub fn in_bound(&self, center: Cell, cell: Cell) -> bool {
        center
            .chebyshev(cell)
            .is_some_and(|distance| distance <= self.radius)
    }

    /// Drop the group's allowance and centers entirely.
    pub fn remove_group(&mut self, group: GroupId) -> Option<OutpostState> {
        self.states.remove(&group)
    }

    /// Retire every center of `group` in `world`.
    pub fn retire_world(&mut self, group: GroupId, world: WorldId) -> usize {
        let Some(state) = self.states.get_mut(&group) else {
            return 0;
        };
        let before = state.centers.len();
        state.centers.retain(|center| center.world != world);
        before - state.centers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: GroupId = GroupId(1);
    const W: WorldId = WorldId(0);

    #[test]
    fn allowance_saturates_at_cap() {
        let mut outposts = OutpostManager::new(2, 3);
        assert_eq!(outposts.allowance(A), 0);
        assert_eq!(outposts.add_allowance(A, 2), 2);
        assert_eq!(outposts.add_allowance(A, 5), 3);
        assert_eq!(outposts.add_allowance(A, u32::MAX), 3);
    }

    #[test]
    fn range_is_a_square_around_each_center() {
        let mut outposts = OutpostManager::new(2, 3);
        let center = Cell::new(W, 20, 20);
        outposts.register_center(A, center);
        outposts.register_center(A, center);
        assert_eq!(outposts.centers(A).len(), 1);

        assert!(outposts.is_within_outpost_range(A, Cell::new(W, 22, 18)));
        assert!(!outposts.is_within_outpost_range(A, Cell::new(W, 23, 20)));
        assert!(!outposts.is_within_outpost_range(A, Cell::new(WorldId(1), 20, 20)));

        assert!(outposts.retire_center(A, center));
        assert!(!outposts.retire_center(A, center));
        assert!(outposts.centers(A).is_empty());
    }

    #[test]
    fn retire_world_only_touches_that_world() {
        let mut outposts = OutpostManager::new(2, 3);
        outposts.register_center(A, Cell::new(W, 0, 0));
        outposts.register_center(A, Cell::new(WorldId(7), 0, 0));
        assert_eq!(outposts.retire_world(A, W), 1);
        assert_eq!(outposts.centers(A), &[Cell::new(WorldId(7), 0, 0)]);
        assert!(outposts.remove_group(A).is_some());
        assert_eq!(outposts.allowance(A), 0);
    }
}
