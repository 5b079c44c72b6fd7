use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for a guild that can own territory.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-contract violations. Rule failures are reported as
/// [`ClaimOutcome`](crate::ClaimOutcome) values instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("group {0} is not registered")]
    UnknownGroup(GroupId),
}

/// Groups recognised by the claim engine.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: BTreeSet<GroupId>,
}

impl GroupRegistry {
    pub fn new(groups: impl IntoIterator<Item = GroupId>) -> Self {
        Self {
            groups: groups.into_iter().collect(),
        }
    }

    /// Returns `true` when the group was not known before.
    pub fn register(&mut self, group: GroupId) -> bool {
        self.groups.insert(group)
    }

    pub fn remove(&mut self, group: GroupId) -> bool {
        self.groups.remove(&group)
    }

    pub fn contains(&self, group: GroupId) -> bool {
        self.groups.contains(&group)
    }

    pub fn ensure(&self, group: GroupId) -> Result<(), EngineError> {
        if self.contains(group) {
            Ok(())
        } else {
            Err(EngineError::UnknownGroup(group))
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups.iter().copied()
    }
}
