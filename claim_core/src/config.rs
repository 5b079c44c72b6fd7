//! Tunables for the claim rules.
//!
//! Loaded from `claim_rules.json` with support for an environment variable
//! override (`CLAIM_RULES_CONFIG_PATH`).

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_CLAIM_RULES: &str = include_str!("data/claim_rules.json");
pub const CLAIM_RULES_PATH_ENV: &str = "CLAIM_RULES_CONFIG_PATH";

/// Engine-wide claim limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClaimRulesConfig {
    /// Maximum cells a group may own across all worlds.
    pub max_claims_per_group: usize,
    /// Half-width of the square bound around an outpost center.
    pub outpost_radius: u32,
    /// Chebyshev distance a detached claim must keep from rival cells.
    pub buffer_distance: u32,
    /// Sample cells recorded per component in connectivity reports.
    pub component_sample_limit: usize,
    pub max_outpost_allowance: u32,
    pub max_map_radius: u32,
    /// Largest rectangle, in cells, a single bulk operation may cover.
    pub max_rect_area: u64,
}

impl Default for ClaimRulesConfig {
    fn default() -> Self {
        Self {
            max_claims_per_group: 64,
            outpost_radius: 2,
            buffer_distance: 2,
            component_sample_limit: 3,
            max_outpost_allowance: 8,
            max_map_radius: 32,
            max_rect_area: 4096,
        }
    }
}

impl ClaimRulesConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_CLAIM_RULES).expect("builtin claim rules should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, ClaimRulesConfigError> {
        let config: ClaimRulesConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ClaimRulesConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ClaimRulesConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ClaimRulesConfig::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ClaimRulesConfigError> {
        if self.max_claims_per_group == 0 {
            return Err(ClaimRulesConfigError::Invalid("max_claims_per_group must be > 0"));
        }
        if self.outpost_radius == 0 {
            return Err(ClaimRulesConfigError::Invalid("outpost_radius must be > 0"));
        }
        if self.component_sample_limit == 0 {
            return Err(ClaimRulesConfigError::Invalid(
                "component_sample_limit must be > 0",
            ));
        }
        if self.max_rect_area == 0 {
            return Err(ClaimRulesConfigError::Invalid("max_rect_area must be > 0"));
        }
        Ok(())
    }

    /// Distance from an outpost center inside which a fresh outpost block
    /// would overlap the existing one.
    pub fn outpost_vicinity(&self) -> u32 {
        self.outpost_radius.saturating_mul(2)
    }
}

#[derive(Debug, Error)]
pub enum ClaimRulesConfigError {
    #[error("failed to parse claim rules: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read claim rules from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid claim rules: {0}")]
    Invalid(&'static str),
}

/// Where the active rules came from.
#[derive(Debug, Clone, Default)]
pub struct ClaimRulesMetadata {
    path: Option<PathBuf>,
}

impl ClaimRulesMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn is_builtin(&self) -> bool {
        self.path.is_none()
    }
}

/// Load claim rules from `CLAIM_RULES_CONFIG_PATH` or the crate's data
/// directory, falling back to the builtin copy.
pub fn load_claim_rules_from_env() -> (Arc<ClaimRulesConfig>, ClaimRulesMetadata) {
    let override_path = env::var(CLAIM_RULES_PATH_ENV).ok().map(PathBuf::from);
    let path = override_path.unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/claim_rules.json")
    });

    match ClaimRulesConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "guild_claims::config",
                path = %path.display(),
                "claim_rules.loaded=file"
            );
            return (Arc::new(config), ClaimRulesMetadata::new(Some(path)));
        }
        Err(err) => {
            tracing::warn!(
                target: "guild_claims::config",
                path = %path.display(),
                error = %err,
                "claim_rules.load_failed"
            );
        }
    }

    let config = ClaimRulesConfig::builtin();
    tracing::info!(target: "guild_claims::config", "claim_rules.loaded=builtin");
    (config, ClaimRulesMetadata::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_defaults() {
        assert_eq!(*ClaimRulesConfig::builtin(), ClaimRulesConfig::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ClaimRulesConfig::from_json_str(r#"{ "max_claims_per_group": 10 }"#)
            .expect("partial config parses");
        assert_eq!(config.max_claims_per_group, 10);
        assert_eq!(config.outpost_radius, 2);
        assert_eq!(config.outpost_vicinity(), 4);
    }

    #[test]
    fn zero_radius_is_rejected() {
        let err = ClaimRulesConfig::from_json_str(r#"{ "outpost_radius": 0 }"#)
            .expect_err("zero radius must fail");
        assert!(matches!(err, ClaimRulesConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ClaimRulesConfig::from_file(Path::new("/nonexistent/claim_rules.json"))
            .expect_err("missing file must fail");
        assert!(matches!(err, ClaimRulesConfigError::Read { .. }));
    }
}
