//! Guild territory claim engine.
//!
//! Owns the shared claim grid and decides, rule by rule, whether a group may
//! claim or release a cell. Persistence, permissions and player messaging
//! live outside this crate; callers talk to a [`ClaimEngine`] and map each
//! [`ClaimOutcome`] to their own messages.

pub mod bulk;
mod cell;
pub mod config;
pub mod connectivity;
mod engine;
mod grid;
mod groups;
pub mod hashing;
mod outposts;
pub mod render;
mod rules;

pub use bulk::{BulkSummary, CellRect};
pub use cell::{Cell, WorldId, EDGE_NEIGHBORS};
pub use config::{load_claim_rules_from_env, ClaimRulesConfig, ClaimRulesConfigError, ClaimRulesMetadata};
pub use connectivity::ConnectivityReport;
pub use engine::{ClaimEngine, ImportSummary};
pub use grid::{ClaimGrid, ClaimRecord};
pub use groups::{EngineError, GroupId, GroupRegistry};
pub use outposts::{OutpostManager, OutpostState};
pub use rules::{ClaimOutcome, ClaimPlan, ClaimRules, UnclaimPlan};
