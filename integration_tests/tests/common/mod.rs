#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use claim_core::{Cell, ClaimEngine, GroupId, WorldId};

static INIT: Once = Once::new();

pub const WORLD: WorldId = WorldId(0);

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_claim_rules.json");

        debug_assert!(
            config_path.exists(),
            "missing test claim rules at {}",
            config_path.display()
        );

        std::env::set_var("CLAIM_RULES_CONFIG_PATH", &config_path);
    });
}

/// Engine on the fixture rules with `groups` registered.
pub fn engine_with_groups(groups: &[u32]) -> ClaimEngine {
    ensure_test_config();
    let engine = ClaimEngine::from_env();
    for &group in groups {
        engine.register_group(GroupId(group));
    }
    engine
}

pub fn cell(x: i32, z: i32) -> Cell {
    Cell::new(WORLD, x, z)
}
