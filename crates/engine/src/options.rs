use serde::{Deserialize, Serialize};

/// Bounds applied to every resolution performed by the engine. Exceeding
/// any of them degrades the affected value to `Unknown`/`Circular`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Maximum recursion depth of a single resolution.
    pub max_depth: usize,
    /// Maximum members kept in a `Many` or produced by a concatenation.
    pub max_values: usize,
    /// Caller-of-caller levels explored when building parameter environments.
    pub max_caller_depth: usize,
    /// Parameter environments evaluated per sink.
    pub max_envs: usize,
    /// Resolver steps allowed per top-level resolution.
    pub step_budget: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_depth: 48,
            max_values: 32,
            max_caller_depth: 3,
            max_envs: 64,
            step_budget: 200_000,
        }
    }
}
