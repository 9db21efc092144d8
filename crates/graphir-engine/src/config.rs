//! Lowering configuration.

use serde::{Deserialize, Serialize};

/// How `where(..).by(..)` modulators are assigned to predicate operands.
///
/// Operands consume modulators in order, start operand first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulatorPolicy {
    /// A single `by(..)` serves every operand. With several, running out
    /// before every operand is bound is an error.
    #[default]
    Broadcast,
    /// Every operand needs its own `by(..)`; running out is an error.
    Strict,
    /// Modulators are reused cyclically.
    Cycle,
}

/// Options for lowering a traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoweringConfig {
    /// Modulator assignment for predicate-where steps.
    pub modulator_policy: ModulatorPolicy,
    /// Seed for `sample(..)` steps that do not carry one.
    pub default_sample_seed: u64,
    /// Lower the steps of the top-level traversal on the rayon pool.
    pub parallel: bool,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            modulator_policy: ModulatorPolicy::Broadcast,
            default_sample_seed: 0,
            parallel: false,
        }
    }
}

impl LoweringConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the modulator policy.
    pub fn with_modulator_policy(mut self, policy: ModulatorPolicy) -> Self {
        self.modulator_policy = policy;
        self
    }

    /// Sets the default sample seed.
    pub fn with_default_sample_seed(mut self, seed: u64) -> Self {
        self.default_sample_seed = seed;
        self
    }

    /// Enables or disables parallel lowering of top-level steps.
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }
}
