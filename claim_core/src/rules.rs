//! Ordered admission checks for single-cell claims and unclaims.
//!
//! Each rule is its own function returning `Result<_, ClaimOutcome>`; the
//! validators chain them with `?`, so the first failing rule decides the
//! outcome. Validation never mutates state: a successful check yields a plan
//! the engine applies afterwards.

use ahash::AHashSet;
use serde::Serialize;

use crate::cell::Cell;
use crate::config::ClaimRulesConfig;
use crate::connectivity::{component_containing, component_count};
use crate::grid::ClaimGrid;
use crate::groups::GroupId;
use crate::outposts::OutpostManager;

/// Result of a claim or unclaim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
    Success,
    AlreadyClaimedByOther,
    AlreadyOwned,
    MaxLimitReached,
    NotConnected,
    TooCloseToOthers,
    OutpostsLimitReached,
    OutpostRangeExceeded,
    NotClaimed,
    NotOwned,
    DisconnectsTerritory,
}

impl ClaimOutcome {
    pub const ALL: [ClaimOutcome; 11] = [
        ClaimOutcome::Success,
        ClaimOutcome::AlreadyClaimedByOther,
        ClaimOutcome::AlreadyOwned,
        ClaimOutcome::MaxLimitReached,
        ClaimOutcome::NotConnected,
        ClaimOutcome::TooCloseToOthers,
        ClaimOutcome::OutpostsLimitReached,
        ClaimOutcome::OutpostRangeExceeded,
        ClaimOutcome::NotClaimed,
        ClaimOutcome::NotOwned,
        ClaimOutcome::DisconnectsTerritory,
    ];

    pub fn is_success(self) -> bool {
        self == ClaimOutcome::Success
    }

    /// Stable key used by the message layer.
    pub fn as_str(self) -> &'static str {
        match self {
            ClaimOutcome::Success => "success",
            ClaimOutcome::AlreadyClaimedByOther => "already_claimed_by_other",
            ClaimOutcome::AlreadyOwned => "already_owned",
            ClaimOutcome::MaxLimitReached => "max_limit_reached",
            ClaimOutcome::NotConnected => "not_connected",
            ClaimOutcome::TooCloseToOthers => "too_close_to_others",
            ClaimOutcome::OutpostsLimitReached => "outposts_limit_reached",
            ClaimOutcome::OutpostRangeExceeded => "outpost_range_exceeded",
            ClaimOutcome::NotClaimed => "not_claimed",
            ClaimOutcome::NotOwned => "not_owned",
            ClaimOutcome::DisconnectsTerritory => "disconnects_territory",
        }
    }
}

impl std::fmt::Display for ClaimOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outpost bookkeeping that accompanies an accepted claim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimPlan {
    /// Set when the claim starts a new outpost component.
    pub new_center: Option<Cell>,
    /// Centers whose components are merged away by the claim.
    pub retired_centers: Vec<Cell>,
}

/// Outpost bookkeeping that accompanies an accepted unclaim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnclaimPlan {
    pub retired_center: Option<Cell>,
    /// Centers for outpost pieces that lose their anchor to the unclaim.
    pub new_centers: Vec<Cell>,
}

type RuleResult<T = ()> = Result<T, ClaimOutcome>;

/// Read-only view over the state the rules consult.
#[derive(Clone, Copy)]
pub struct ClaimRules<'a> {
    grid: &'a ClaimGrid,
    outposts: &'a OutpostManager,
    config: &'a ClaimRulesConfig,
}

impl<'a> ClaimRules<'a> {
    pub fn new(
        grid: &'a ClaimGrid,
        outposts: &'a OutpostManager,
        config: &'a ClaimRulesConfig,
    ) -> Self {
        Self {
            grid,
            outposts,
            config,
        }
    }

    pub fn validate_claim(&self, group: GroupId, cell: Cell) -> ClaimOutcome {
        match self.plan_claim(group, cell) {
            Ok(_) => ClaimOutcome::Success,
            Err(outcome) => outcome,
        }
    }

    pub fn validate_unclaim(&self, group: GroupId, cell: Cell) -> ClaimOutcome {
        match self.plan_unclaim(group, cell) {
            Ok(_) => ClaimOutcome::Success,
            Err(outcome) => outcome,
        }
    }

    pub fn plan_claim(&self, group: GroupId, cell: Cell) -> RuleResult<ClaimPlan> {
        self.check_unowned(group, cell)?;
        self.check_claim_limit(group)?;

        // First cell in a world is always a legal seed.
        let Some(own) = self.grid.cells_of(group, cell.world) else {
            return Ok(ClaimPlan::default());
        };

        if cell.edge_neighbors().any(|neighbor| own.contains(&neighbor)) {
            return self.plan_extension(group, cell, own);
        }

        self.check_buffer(group, cell)?;
        self.check_outpost_vicinity(group, cell, own)?;
        self.plan_new_outpost(group, cell, own)
    }

    pub fn plan_unclaim(&self, group: GroupId, cell: Cell) -> RuleResult<UnclaimPlan> {
        match self.grid.owner(cell) {
            None => return Err(ClaimOutcome::NotClaimed),
            Some(owner) if owner != group => return Err(ClaimOutcome::NotOwned),
            Some(_) => {}
        }
        let Some(own) = self.grid.cells_of(group, cell.world) else {
            return Err(ClaimOutcome::NotClaimed);
        };

        let remaining = component_count(own, Some(cell));
        if remaining > self.component_budget(group) {
            return Err(ClaimOutcome::DisconnectsTerritory);
        }

        Ok(UnclaimPlan {
            retired_center: self.outposts.is_center(group, cell).then_some(cell),
            new_centers: self.reanchor_outpost(group, cell, own)?,
        })
    }

    /// Components a group may hold in one world.
    pub fn component_budget(&self, group: GroupId) -> usize {
        1 + self.outposts.allowance(group) as usize
    }

    fn check_unowned(&self, group: GroupId, cell: Cell) -> RuleResult {
        match self.grid.owner(cell) {
            Some(owner) if owner == group => Err(ClaimOutcome::AlreadyOwned),
            Some(_) => Err(ClaimOutcome::AlreadyClaimedByOther),
            None => Ok(()),
        }
    }

    fn check_claim_limit(&self, group: GroupId) -> RuleResult {
        if self.grid.count_of(group) >= self.config.max_claims_per_group {
            Err(ClaimOutcome::MaxLimitReached)
        } else {
            Ok(())
        }
    }

    /// Rival cells within the buffer block a detached claim.
    fn check_buffer(&self, group: GroupId, cell: Cell) -> RuleResult {
        let rival_nearby = cell
            .square_ring(self.config.buffer_distance)
            .any(|near| matches!(self.grid.owner(near), Some(owner) if owner != group));
        if rival_nearby {
            Err(ClaimOutcome::TooCloseToOthers)
        } else {
            Ok(())
        }
    }

    /// A detached cell near one of the group's outposts can neither start a
    /// new outpost nor float inside the existing bound.
    fn check_outpost_vicinity(
        &self,
        group: GroupId,
        cell: Cell,
        own: &AHashSet<Cell>,
    ) -> RuleResult {
        if self.outposts.is_within_outpost_range(group, cell) {
            return Err(ClaimOutcome::NotConnected);
        }
        let vicinity = self.config.outpost_vicinity();
        let overlaps = self
            .live_centers(group, cell, own)
            .any(|center| center.chebyshev(cell).is_some_and(|d| d <= vicinity));
        if overlaps {
            Err(ClaimOutcome::OutpostRangeExceeded)
        } else {
            Ok(())
        }
    }

    fn plan_new_outpost(
        &self,
        group: GroupId,
        cell: Cell,
        own: &AHashSet<Cell>,
    ) -> RuleResult<ClaimPlan> {
        if self.outposts.allowance(group) == 0 {
            return Err(ClaimOutcome::NotConnected);
        }
        if component_count(own, None) >= self.component_budget(group) {
            return Err(ClaimOutcome::OutpostsLimitReached);
        }
        Ok(ClaimPlan {
            new_center: Some(cell),
            retired_centers: Vec::new(),
        })
    }

    /// The cell touches existing territory. Touching plain territory absorbs
    /// any touched outposts; touching only outposts requires one of their
    /// centers to bound the merged shape.
    fn plan_extension(
        &self,
        group: GroupId,
        cell: Cell,
        own: &AHashSet<Cell>,
    ) -> RuleResult<ClaimPlan> {
        let centers: Vec<Cell> = self.live_centers(group, cell, own).collect();
        if centers.is_empty() {
            return Ok(ClaimPlan::default());
        }

        let mut touched: Vec<AHashSet<Cell>> = Vec::new();
        for neighbor in cell.edge_neighbors().filter(|n| own.contains(n)) {
            if touched.iter().any(|component| component.contains(&neighbor)) {
                continue;
            }
            touched.push(component_containing(own, neighbor, None));
        }

        let mut anchored: Vec<(Cell, usize)> = Vec::new();
        let mut touches_plain = false;
        for (idx, component) in touched.iter().enumerate() {
            let before = anchored.len();
            anchored.extend(
                centers
                    .iter()
                    .filter(|center| component.contains(*center))
                    .map(|center| (*center, idx)),
            );
            if anchored.len() == before {
                touches_plain = true;
            }
        }

        if anchored.is_empty() {
            return Ok(ClaimPlan::default());
        }
        if touches_plain {
            return Ok(ClaimPlan {
                new_center: None,
                retired_centers: anchored.iter().map(|(center, _)| *center).collect(),
            });
        }

        let keeper = anchored.iter().map(|(center, _)| *center).find(|&center| {
            self.outposts.in_bound(center, cell)
                && touched
                    .iter()
                    .flat_map(|component| component.iter())
                    .all(|member| self.outposts.in_bound(center, *member))
        });

        match keeper {
            Some(keep) => Ok(ClaimPlan {
                new_center: None,
                retired_centers: anchored
                    .iter()
                    .map(|(center, _)| *center)
                    .filter(|center| *center != keep)
                    .collect(),
            }),
            None => Err(ClaimOutcome::OutpostRangeExceeded),
        }
    }

    /// Removing `cell` from an outpost may leave pieces without a center.
    /// Each such piece needs one of its own cells whose bound still covers
    /// the whole piece.
    fn reanchor_outpost(
        &self,
        group: GroupId,
        cell: Cell,
        own: &AHashSet<Cell>,
    ) -> RuleResult<Vec<Cell>> {
        let component = component_containing(own, cell, None);
        let centers: Vec<Cell> = self
            .live_centers(group, cell, own)
            .filter(|center| component.contains(center))
            .collect();
        if centers.is_empty() {
            return Ok(Vec::new());
        }

        let mut new_centers = Vec::new();
        let mut seen: AHashSet<Cell> = AHashSet::new();
        for neighbor in cell.edge_neighbors().filter(|n| component.contains(n)) {
            if seen.contains(&neighbor) {
                continue;
            }
            let piece = component_containing(&component, neighbor, Some(cell));
            seen.extend(piece.iter().copied());
            if centers.iter().any(|c| *c != cell && piece.contains(c)) {
                continue;
            }
            match self.bounding_center(&piece) {
                Some(center) => new_centers.push(center),
                None => return Err(ClaimOutcome::OutpostRangeExceeded),
            }
        }
        Ok(new_centers)
    }

    /// First cell of `piece`, in row-major order, whose bound covers it all.
    fn bounding_center(&self, piece: &AHashSet<Cell>) -> Option<Cell> {
        let side = 2 * self.outposts.radius() as usize + 1;
        if piece.len() > side.saturating_mul(side) {
            return None;
        }
        let mut candidates: Vec<Cell> = piece.iter().copied().collect();
        candidates.sort_unstable_by_key(|c| c.row_major_key());
        candidates.into_iter().find(|&candidate| {
            piece
                .iter()
                .all(|member| self.outposts.in_bound(candidate, *member))
        })
    }

    /// Registered centers in `cell`'s world that the group still owns.
    fn live_centers<'s>(
        &'s self,
        group: GroupId,
        cell: Cell,
        own: &'s AHashSet<Cell>,
    ) -> impl Iterator<Item = Cell> + 's {
        self.outposts
            .centers_in(group, cell.world)
            .filter(move |center| own.contains(center))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::WorldId;

    const W: WorldId = WorldId(0);
    const A: GroupId = GroupId(1);
    const B: GroupId = GroupId(2);

    struct Fixture {
        grid: ClaimGrid,
        outposts: OutpostManager,
        config: ClaimRulesConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let config = ClaimRulesConfig::default();
            Self {
                grid: ClaimGrid::new(),
                outposts: OutpostManager::new(config.outpost_radius, config.max_outpost_allowance),
                config,
            }
        }

        fn own(&mut self, group: GroupId, coords: &[(i32, i32)]) {
            for &(x, z) in coords {
                self.grid.claim(Cell::new(W, x, z), group);
            }
        }

        fn rules(&self) -> ClaimRules<'_> {
            ClaimRules::new(&self.grid, &self.outposts, &self.config)
        }

        fn claim(&self, group: GroupId, x: i32, z: i32) -> ClaimOutcome {
            self.rules().validate_claim(group, Cell::new(W, x, z))
        }

        fn unclaim(&self, group: GroupId, x: i32, z: i32) -> ClaimOutcome {
            self.rules().validate_unclaim(group, Cell::new(W, x, z))
        }
    }

    #[test]
    fn ownership_checks_come_first() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0)]);
        assert_eq!(fx.claim(B, 0, 0), ClaimOutcome::AlreadyClaimedByOther);
        assert_eq!(fx.claim(A, 0, 0), ClaimOutcome::AlreadyOwned);
    }

    #[test]
    fn seed_is_free_anywhere_in_a_new_world() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0)]);
        // Right next to a rival is still fine for a seed.
        assert_eq!(fx.claim(B, 1, 1), ClaimOutcome::Success);
    }

    #[test]
    fn claim_limit_counts_every_world() {
        let mut fx = Fixture::new();
        fx.config.max_claims_per_group = 2;
        fx.grid.claim(Cell::new(WorldId(5), 0, 0), A);
        fx.own(A, &[(0, 0)]);
        assert_eq!(fx.claim(A, 1, 0), ClaimOutcome::MaxLimitReached);
        assert_eq!(
            fx.rules().validate_claim(A, Cell::new(WorldId(9), 0, 0)),
            ClaimOutcome::MaxLimitReached
        );
    }

    #[test]
    fn adjacent_claims_ignore_the_buffer() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0)]);
        fx.own(B, &[(3, 0)]);
        assert_eq!(fx.claim(A, 1, 0), ClaimOutcome::Success);
    }

    #[test]
    fn detached_claim_near_rival_is_too_close() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0), (0, 1)]);
        fx.own(B, &[(5, 5), (5, 6)]);
        assert_eq!(fx.claim(B, 2, 2), ClaimOutcome::TooCloseToOthers);
    }

    #[test]
    fn detached_claim_without_allowance_is_not_connected() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0)]);
        assert_eq!(fx.claim(A, 10, 10), ClaimOutcome::NotConnected);
        assert_eq!(fx.claim(A, 1, 1), ClaimOutcome::NotConnected);
    }

    #[test]
    fn new_outpost_uses_a_slot() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0)]);
        fx.outposts.add_allowance(A, 1);
        let plan = fx
            .rules()
            .plan_claim(A, Cell::new(W, 20, 20))
            .expect("free slot");
        assert_eq!(plan.new_center, Some(Cell::new(W, 20, 20)));

        fx.own(A, &[(20, 20)]);
        fx.outposts.register_center(A, Cell::new(W, 20, 20));
        assert_eq!(fx.claim(A, 23, 20), ClaimOutcome::OutpostRangeExceeded);
        assert_eq!(fx.claim(A, 22, 22), ClaimOutcome::NotConnected);
        assert_eq!(fx.claim(A, -30, -30), ClaimOutcome::OutpostsLimitReached);
    }

    #[test]
    fn outpost_growth_is_bounded() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0), (20, 20), (21, 20), (22, 20)]);
        fx.outposts.add_allowance(A, 1);
        fx.outposts.register_center(A, Cell::new(W, 20, 20));
        assert_eq!(fx.claim(A, 22, 21), ClaimOutcome::Success);
        assert_eq!(fx.claim(A, 23, 20), ClaimOutcome::OutpostRangeExceeded);
    }

    #[test]
    fn touching_main_territory_absorbs_the_outpost() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0), (1, 0), (3, 0)]);
        fx.outposts.add_allowance(A, 1);
        fx.outposts.register_center(A, Cell::new(W, 3, 0));
        let plan = fx
            .rules()
            .plan_claim(A, Cell::new(W, 2, 0))
            .expect("bridge is legal");
        assert_eq!(plan.retired_centers, vec![Cell::new(W, 3, 0)]);
        assert_eq!(plan.new_center, None);
    }

    #[test]
    fn unclaim_checks_ownership_then_connectivity() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]);
        fx.own(B, &[(9, 9)]);
        assert_eq!(fx.unclaim(A, 7, 7), ClaimOutcome::NotClaimed);
        assert_eq!(fx.unclaim(A, 9, 9), ClaimOutcome::NotOwned);
        assert_eq!(fx.unclaim(A, 2, 0), ClaimOutcome::DisconnectsTerritory);
        assert_eq!(fx.unclaim(A, 4, 0), ClaimOutcome::Success);

        fx.outposts.add_allowance(A, 1);
        assert_eq!(fx.unclaim(A, 2, 0), ClaimOutcome::Success);
    }

    #[test]
    fn unclaiming_a_center_retires_it() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0), (20, 20)]);
        fx.outposts.add_allowance(A, 1);
        fx.outposts.register_center(A, Cell::new(W, 20, 20));
        let plan = fx
            .rules()
            .plan_unclaim(A, Cell::new(W, 20, 20))
            .expect("removing an outpost is legal");
        assert_eq!(plan.retired_center, Some(Cell::new(W, 20, 20)));
        assert!(plan.new_centers.is_empty());
    }

    #[test]
    fn unclaiming_a_center_moves_it_onto_the_rest_of_the_outpost() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0), (20, 20), (21, 20)]);
        fx.outposts.add_allowance(A, 1);
        fx.outposts.register_center(A, Cell::new(W, 20, 20));
        let plan = fx
            .rules()
            .plan_unclaim(A, Cell::new(W, 20, 20))
            .expect("the remaining cell can anchor itself");
        assert_eq!(plan.retired_center, Some(Cell::new(W, 20, 20)));
        assert_eq!(plan.new_centers, vec![Cell::new(W, 21, 20)]);
    }

    #[test]
    fn splitting_an_outpost_anchors_each_piece() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0), (19, 20), (20, 20), (21, 20), (22, 20)]);
        fx.outposts.add_allowance(A, 2);
        fx.outposts.register_center(A, Cell::new(W, 20, 20));
        let plan = fx
            .rules()
            .plan_unclaim(A, Cell::new(W, 21, 20))
            .expect("split fits the allowance");
        assert_eq!(plan.retired_center, None);
        assert_eq!(plan.new_centers, vec![Cell::new(W, 22, 20)]);
    }

    #[test]
    fn outpost_that_only_its_center_can_cover_keeps_it() {
        let mut fx = Fixture::new();
        fx.own(A, &[(0, 0), (20, 20), (20, 19), (20, 18)]);
        fx.own(A, &[(18, 18), (19, 18), (21, 18), (22, 18)]);
        fx.own(A, &[(22, 19), (22, 20), (22, 21), (22, 22)]);
        fx.outposts.add_allowance(A, 1);
        fx.outposts.register_center(A, Cell::new(W, 20, 20));
        assert_eq!(fx.unclaim(A, 20, 20), ClaimOutcome::OutpostRangeExceeded);
        assert_eq!(fx.unclaim(A, 22, 22), ClaimOutcome::Success);
    }

    #[test]
    fn outcome_keys_are_unique() {
        let keys: std::collections::HashSet<_> =
            ClaimOutcome::ALL.iter().map(|o| o.as_str()).collect();
        assert_eq!(keys.len(), ClaimOutcome::ALL.len());
    }
}
