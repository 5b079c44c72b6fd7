mod common;

use claim_core::{ClaimOutcome, ClaimRecord, GroupId};

#[test]
fn engine_loads_fixture_rules() {
    let engine = common::engine_with_groups(&[1]);
    assert_eq!(engine.max_claims_per_group(), 200);
    assert_eq!(engine.config().max_outpost_allowance, 4);
    assert_eq!(
        engine.claim_cell(GroupId(1), common::cell(0, 0)).unwrap(),
        ClaimOutcome::Success
    );
}

#[test]
fn persisted_claims_load_from_json() -> anyhow::Result<()> {
    let engine = common::engine_with_groups(&[]);
    let json = r#"[
        {"world": 0, "x": 0, "z": 0, "group": 7},
        {"world": 0, "x": 9, "z": 9, "group": 7},
        {"world": 1, "x": 0, "z": 0, "group": 8}
    ]"#;
    let records: Vec<ClaimRecord> = serde_json::from_str(json)?;
    let summary = engine.import_claims(records.clone());

    assert_eq!(summary.imported, 3);
    assert_eq!(summary.groups_registered, 2);
    assert!(engine.has_group(GroupId(8)));
    assert_eq!(engine.export_claims(), records);

    let report = engine.analyze_connectivity(GroupId(7), common::WORLD)?;
    assert_eq!(report.component_count, 2);
    Ok(())
}
