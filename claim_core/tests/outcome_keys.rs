use std::collections::HashSet;

use claim_core::{ClaimOutcome, ClaimRulesConfig};

/// Message layers key their text on these strings, so they must stay put.
#[test]
fn outcome_keys_match_serialized_names() {
    for outcome in ClaimOutcome::ALL {
        let json = serde_json::to_string(&outcome).expect("outcome serializes");
        assert_eq!(json, format!("\"{}\"", outcome.as_str()));
        assert_eq!(outcome.to_string(), outcome.as_str());
    }
}

#[test]
fn outcome_keys_are_unique() {
    let keys: HashSet<&str> = ClaimOutcome::ALL.iter().map(|o| o.as_str()).collect();
    assert_eq!(keys.len(), ClaimOutcome::ALL.len());
    assert_eq!(
        ClaimOutcome::ALL.iter().filter(|o| o.is_success()).count(),
        1
    );
}

#[test]
fn builtin_rules_are_valid() {
    let config = ClaimRulesConfig::builtin();
    config.validate().expect("builtin rules validate");
    assert_eq!(config.outpost_vicinity(), 2 * config.outpost_radius);
}
