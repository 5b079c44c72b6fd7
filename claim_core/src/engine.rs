//! The shared claim engine.
//!
//! All state lives behind one mutex. Every public operation takes the lock
//! once, so validation and the mutation it authorises happen in the same
//! critical section and two concurrent claims can never both pass for the
//! same cell.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::bulk::{for_each_cell, BulkSummary, CellRect};
use crate::cell::{Cell, WorldId};
use crate::config::{load_claim_rules_from_env, ClaimRulesConfig};
use crate::connectivity::{self, ConnectivityReport};
use crate::grid::{ClaimGrid, ClaimRecord};
use crate::groups::{EngineError, GroupId, GroupRegistry};
use crate::hashing::{claims_digest, TerritoryDigest};
use crate::outposts::OutpostManager;
use crate::render;
use crate::rules::{ClaimOutcome, ClaimPlan, ClaimRules, UnclaimPlan};

/// Result of loading persisted claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    /// Records that replaced an earlier owner of the same cell.
    pub overwritten: usize,
    pub groups_registered: usize,
}

#[derive(Debug, Clone)]
struct ClaimState {
    groups: GroupRegistry,
    grid: ClaimGrid,
    outposts: OutpostManager,
}

impl ClaimState {
    fn new(config: &ClaimRulesConfig) -> Self {
        Self {
            groups: GroupRegistry::default(),
            grid: ClaimGrid::new(),
            outposts: OutpostManager::new(config.outpost_radius, config.max_outpost_allowance),
        }
    }

    fn rules<'a>(&'a self, config: &'a ClaimRulesConfig) -> ClaimRules<'a> {
        ClaimRules::new(&self.grid, &self.outposts, config)
    }

    fn try_claim(&mut self, config: &ClaimRulesConfig, group: GroupId, cell: Cell) -> ClaimOutcome {
        let planned = self.rules(config).plan_claim(group, cell);
        match planned {
            Ok(plan) => {
                self.apply_claim(group, cell, plan);
                ClaimOutcome::Success
            }
            Err(outcome) => outcome,
        }
    }

    fn apply_claim(&mut self, group: GroupId, cell: Cell, plan: ClaimPlan) {
        self.grid.claim(cell, group);
        for center in plan.retired_centers {
            self.outposts.retire_center(group, center);
            debug!(
                target: "guild_claims::engine",
                %group,
                %center,
                "outpost.absorbed"
            );
        }
        if let Some(center) = plan.new_center {
            self.outposts.register_center(group, center);
            info!(
                target: "guild_claims::engine",
                %group,
                %center,
                centers = self.outposts.centers(group).len(),
                "outpost.registered"
            );
        }
    }

    fn try_unclaim(
        &mut self,
        config: &ClaimRulesConfig,
        group: GroupId,
        cell: Cell,
    ) -> ClaimOutcome {
        let planned = self.rules(config).plan_unclaim(group, cell);
        match planned {
            Ok(plan) => {
                self.apply_unclaim(group, cell, plan);
                ClaimOutcome::Success
            }
            Err(outcome) => outcome,
        }
    }

    fn apply_unclaim(&mut self, group: GroupId, cell: Cell, plan: UnclaimPlan) {
        self.grid.unclaim(cell);
        if let Some(center) = plan.retired_center {
            self.outposts.retire_center(group, center);
            debug!(
                target: "guild_claims::engine",
                %group,
                %center,
                "outpost.retired"
            );
        }
        for center in plan.new_centers {
            self.outposts.register_center(group, center);
            info!(
                target: "guild_claims::engine",
                %group,
                %center,
                "outpost.reanchored"
            );
        }
    }
}

/// Thread-safe territory engine shared by every command handler.
#[derive(Debug)]
pub struct ClaimEngine {
    config: Arc<ClaimRulesConfig>,
    state: Mutex<ClaimState>,
}

impl Default for ClaimEngine {
    fn default() -> Self {
        Self::new(ClaimRulesConfig::builtin())
    }
}

impl ClaimEngine {
    pub fn new(config: Arc<ClaimRulesConfig>) -> Self {
        let state = ClaimState::new(&config);
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Build an engine with rules from `CLAIM_RULES_CONFIG_PATH` or the builtin.
    pub fn from_env() -> Self {
        let (config, _metadata) = load_claim_rules_from_env();
        Self::new(config)
    }

    pub fn config(&self) -> &ClaimRulesConfig {
        &self.config
    }

    pub fn max_claims_per_group(&self) -> usize {
        self.config.max_claims_per_group
    }

    fn lock(&self) -> MutexGuard<'_, ClaimState> {
        self.state.lock().expect("claim state mutex poisoned")
    }

    /// Returns `true` when the group was new.
    pub fn register_group(&self, group: GroupId) -> bool {
        let added = self.lock().groups.register(group);
        if added {
            debug!(target: "guild_claims::engine", %group, "group.registered");
        }
        added
    }

    pub fn has_group(&self, group: GroupId) -> bool {
        self.lock().groups.contains(group)
    }

    /// Forget a group, releasing all of its cells in every world at once.
    pub fn delete_group(&self, group: GroupId) -> Result<usize, EngineError> {
        let mut state = self.lock();
        state.groups.ensure(group)?;
        let released = state.grid.release_group(group);
        state.outposts.remove_group(group);
        state.groups.remove(group);
        info!(
            target: "guild_claims::engine",
            %group,
            released,
            "group.deleted"
        );
        Ok(released)
    }

    pub fn claim_cell(&self, group: GroupId, cell: Cell) -> Result<ClaimOutcome, EngineError> {
        let mut state = self.lock();
        state.groups.ensure(group)?;
        let outcome = state.try_claim(&self.config, group, cell);
        log_outcome("claim", group, cell, outcome);
        Ok(outcome)
    }

    pub fn unclaim_cell(&self, group: GroupId, cell: Cell) -> Result<ClaimOutcome, EngineError> {
        let mut state = self.lock();
        state.groups.ensure(group)?;
        let outcome = state.try_unclaim(&self.config, group, cell);
        log_outcome("unclaim", group, cell, outcome);
        Ok(outcome)
    }

    /// Dry run of [`claim_cell`](Self::claim_cell).
    pub fn validate_claim(&self, group: GroupId, cell: Cell) -> Result<ClaimOutcome, EngineError> {
        let state = self.lock();
        state.groups.ensure(group)?;
        Ok(state.rules(&self.config).validate_claim(group, cell))
    }

    /// Dry run of [`unclaim_cell`](Self::unclaim_cell).
    pub fn validate_unclaim(
        &self,
        group: GroupId,
        cell: Cell,
    ) -> Result<ClaimOutcome, EngineError> {
        let state = self.lock();
        state.groups.ensure(group)?;
        Ok(state.rules(&self.config).validate_unclaim(group, cell))
    }

    /// Claim every legally claimable cell in the rectangle.
    ///
    /// Rectangles larger than `max_rect_area` are refused outright with an
    /// empty summary, since the whole rectangle runs under the lock.
    pub fn claim_rect(
        &self,
        group: GroupId,
        world: WorldId,
        x1: i32,
        z1: i32,
        x2: i32,
        z2: i32,
    ) -> BulkSummary {
        let rect = CellRect::from_corners(world, x1, z1, x2, z2);
        let mut state = self.lock();
        if !state.groups.contains(group) {
            warn!(target: "guild_claims::engine", %group, "claim_rect.rejected=unknown_group");
            return BulkSummary::default();
        }
        if rect.area() > self.config.max_rect_area {
            warn!(
                target: "guild_claims::engine",
                %group,
                area = rect.area(),
                max = self.config.max_rect_area,
                "claim_rect.rejected=too_large"
            );
            return BulkSummary::default();
        }
        let summary = for_each_cell(rect, |cell| state.try_claim(&self.config, group, cell));
        info!(
            target: "guild_claims::engine",
            %group,
            %world,
            total = summary.total,
            applied = summary.applied,
            "claim_rect.completed"
        );
        summary
    }

    /// Release every cell in the rectangle whose removal is legal.
    pub fn unclaim_rect(
        &self,
        group: GroupId,
        world: WorldId,
        x1: i32,
        z1: i32,
        x2: i32,
        z2: i32,
    ) -> BulkSummary {
        let rect = CellRect::from_corners(world, x1, z1, x2, z2);
        let mut state = self.lock();
        if !state.groups.contains(group) {
            warn!(target: "guild_claims::engine", %group, "unclaim_rect.rejected=unknown_group");
            return BulkSummary::default();
        }
        if rect.area() > self.config.max_rect_area {
            warn!(
                target: "guild_claims::engine",
                %group,
                area = rect.area(),
                max = self.config.max_rect_area,
                "unclaim_rect.rejected=too_large"
            );
            return BulkSummary::default();
        }
        let summary = for_each_cell(rect, |cell| state.try_unclaim(&self.config, group, cell));
        info!(
            target: "guild_claims::engine",
            %group,
            %world,
            total = summary.total,
            applied = summary.applied,
            "unclaim_rect.completed"
        );
        summary
    }

    /// Drop all of the group's territory and outposts in one world.
    pub fn unclaim_all(&self, group: GroupId, world: WorldId) -> Result<usize, EngineError> {
        let mut state = self.lock();
        state.groups.ensure(group)?;
        let released = state.grid.release_group_in(group, world);
        let retired = state.outposts.retire_world(group, world);
        info!(
            target: "guild_claims::engine",
            %group,
            %world,
            released,
            retired,
            "unclaim_all.completed"
        );
        Ok(released)
    }

    pub fn analyze_connectivity(
        &self,
        group: GroupId,
        world: WorldId,
    ) -> Result<ConnectivityReport, EngineError> {
        let state = self.lock();
        state.groups.ensure(group)?;
        Ok(connectivity::analyze(
            &state.grid,
            group,
            world,
            self.config.component_sample_limit,
        ))
    }

    /// What the group's territory would look like with `cell` unclaimed.
    pub fn analyze_connectivity_after_removal(
        &self,
        group: GroupId,
        cell: Cell,
    ) -> Result<ConnectivityReport, EngineError> {
        let state = self.lock();
        state.groups.ensure(group)?;
        Ok(connectivity::analyze_after_removal(
            &state.grid,
            group,
            cell,
            self.config.component_sample_limit,
        ))
    }

    /// Text map centred on `(x, z)`. The radius is clamped to `max_map_radius`.
    pub fn render_map(
        &self,
        group: GroupId,
        world: WorldId,
        x: i32,
        z: i32,
        radius: u32,
        highlight: Option<Cell>,
    ) -> Result<Vec<String>, EngineError> {
        let radius = radius.min(self.config.max_map_radius);
        let state = self.lock();
        state.groups.ensure(group)?;
        Ok(render::render_map(
            &state.grid,
            group,
            world,
            x,
            z,
            radius,
            highlight,
        ))
    }

    /// Credit purchased outpost slots. Returns the new allowance.
    pub fn add_outpost_allowance(&self, group: GroupId, amount: u32) -> Result<u32, EngineError> {
        let mut state = self.lock();
        state.groups.ensure(group)?;
        let before = state.outposts.allowance(group);
        let allowance = state.outposts.add_allowance(group, amount);
        if before.saturating_add(amount) > allowance {
            warn!(
                target: "guild_claims::engine",
                %group,
                requested = amount,
                allowance,
                "outpost_allowance.capped"
            );
        } else {
            info!(target: "guild_claims::engine", %group, allowance, "outpost_allowance.added");
        }
        Ok(allowance)
    }

    pub fn outpost_allowance(&self, group: GroupId) -> Result<u32, EngineError> {
        let state = self.lock();
        state.groups.ensure(group)?;
        Ok(state.outposts.allowance(group))
    }

    pub fn outpost_center_count(&self, group: GroupId) -> Result<usize, EngineError> {
        let state = self.lock();
        state.groups.ensure(group)?;
        Ok(state.outposts.centers(group).len())
    }

    pub fn outpost_centers(&self, group: GroupId) -> Result<Vec<Cell>, EngineError> {
        let state = self.lock();
        state.groups.ensure(group)?;
        Ok(state.outposts.centers(group).to_vec())
    }

    pub fn owner(&self, cell: Cell) -> Option<GroupId> {
        self.lock().grid.owner(cell)
    }

    /// Total cells the group owns across all worlds.
    pub fn claim_count(&self, group: GroupId) -> usize {
        self.lock().grid.count_of(group)
    }

    /// Load persisted claims without validation.
    ///
    /// Shapes that predate a rule change still load. Unknown groups are
    /// registered, and a later record for the same cell replaces the earlier
    /// owner.
    pub fn import_claims<I>(&self, records: I) -> ImportSummary
    where
        I: IntoIterator<Item = ClaimRecord>,
    {
        let mut state = self.lock();
        let mut summary = ImportSummary::default();
        for record in records {
            if state.groups.register(record.group) {
                summary.groups_registered += 1;
            }
            if let Some(previous) = state.grid.claim_raw(record.cell(), record.group) {
                if previous != record.group {
                    summary.overwritten += 1;
                    warn!(
                        target: "guild_claims::engine",
                        cell = %record.cell(),
                        previous = %previous,
                        group = %record.group,
                        "claims.import_overwrite"
                    );
                }
            }
            summary.imported += 1;
        }
        info!(
            target: "guild_claims::engine",
            imported = summary.imported,
            overwritten = summary.overwritten,
            groups = summary.groups_registered,
            "claims.imported"
        );
        summary
    }

    /// Every current claim, sorted by world then row-major position.
    pub fn export_claims(&self) -> Vec<ClaimRecord> {
        self.lock().grid.records()
    }

    /// Deterministic digest of claims and outpost state.
    pub fn territory_digest(&self) -> u64 {
        let state = self.lock();
        let mut digest = TerritoryDigest::new();
        digest.push_u64(claims_digest(&state.grid.records()));
        let mut groups: Vec<GroupId> = state.groups.iter().collect();
        groups.sort_unstable();
        for group in groups {
            digest.push_u32(group.0);
            digest.push_u32(state.outposts.allowance(group));
            let mut centers = state.outposts.centers(group).to_vec();
            centers.sort_unstable_by_key(|cell| cell.row_major_key());
            for center in centers {
                digest.push_cell(center);
            }
        }
        digest.finish()
    }
}

fn log_outcome(action: &'static str, group: GroupId, cell: Cell, outcome: ClaimOutcome) {
    if outcome.is_success() {
        debug!(
            target: "guild_claims::engine",
            action,
            %group,
            %cell,
            "claim.accepted"
        );
    } else {
        debug!(
            target: "guild_claims::engine",
            action,
            %group,
            %cell,
            outcome = outcome.as_str(),
            "claim.rejected"
        );
    }
}
