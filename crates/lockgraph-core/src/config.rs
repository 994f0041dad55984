use serde::{Deserialize, Serialize};

/// What to do with a dependency edge whose target is not in the lockfile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DanglingPolicy {
    /// Fail resolution with `DanglingReference`.
    #[default]
    Strict,
    /// Drop the edge and log a warning.
    Lenient,
}

/// Resolver settings, read from `[tool.lockgraph]` or built in code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolveOptions {
    #[serde(default)]
    pub dangling: DanglingPolicy,
    /// Overrides the per-configuration traversal step bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_limit: Option<usize>,
}

impl ResolveOptions {
    /// Options that drop dangling edges instead of failing.
    pub fn lenient() -> Self {
        Self {
            dangling: DanglingPolicy::Lenient,
            ..Self::default()
        }
    }

    pub fn is_lenient(&self) -> bool {
        self.dangling == DanglingPolicy::Lenient
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }
}
