//! Check and check identity

use serde::{Deserialize, Serialize};

/// Stable identity of a check
///
/// Unique across all started and in-flight checks. A source never reuses an
/// id for a different check while the old one may still be running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckId(u64);

impl CheckId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for CheckId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CheckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A started resource check awaiting execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Check {
    /// Check identity
    pub id: CheckId,

    /// Team owning the pipeline
    pub team_name: String,

    /// Pipeline the checked resource belongs to
    pub pipeline_name: String,

    /// Resource config scope this check correlates to
    pub resource_config_scope_id: u64,

    /// Opaque payload interpreted by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
}

impl Check {
    /// Create a check without a plan
    pub fn new(
        id: u64,
        team_name: impl Into<String>,
        pipeline_name: impl Into<String>,
        resource_config_scope_id: u64,
    ) -> Self {
        Self {
            id: CheckId(id),
            team_name: team_name.into(),
            pipeline_name: pipeline_name.into(),
            resource_config_scope_id,
            plan: None,
        }
    }

    /// Attach a plan to the check
    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }
}
