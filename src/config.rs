//! Resolved evaluation settings.
//!
//! Settings are threaded explicitly through the generator and evaluator
//! call chains; there is no ambient global configuration. A dimension
//! with no entry resolves to the hardcoded fallback values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Fallback strictness when neither the criterion nor the dimension
/// specifies one.
pub const DEFAULT_STRICTNESS: u8 = 85;

/// Fallback passing-criteria percentage: all criteria must be met.
pub const DEFAULT_PASSING_PERCENTAGE: f64 = 100.0;

/// Resolved per-dimension settings from the configuration collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionSettings {
    /// Number of tests to generate per (entity, dimension) pair.
    #[serde(default = "default_test_count")]
    pub test_count: u32,
    /// Times each generated input is repeated at execution.
    #[serde(default = "default_runs_per_input")]
    pub runs_per_input: u32,
    /// Input variants generated per test for robustness probing.
    #[serde(default = "default_variations_per_input")]
    pub variations_per_input: u32,
    /// Default judge strictness (0-100) for criteria without an override.
    #[serde(default = "default_strictness")]
    pub default_strictness: u8,
    /// Minimum percentage of criteria that must be met to pass (0-100).
    #[serde(default = "default_passing_percentage")]
    pub passing_criteria_percentage: f64,
    /// Concurrent in-flight LLM requests for this dimension's work.
    #[serde(default)]
    pub concurrent_requests: Option<usize>,
    /// Transport timeout, passed through opaquely to the LLM client.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_test_count() -> u32 {
    3
}

fn default_runs_per_input() -> u32 {
    1
}

fn default_variations_per_input() -> u32 {
    1
}

fn default_strictness() -> u8 {
    DEFAULT_STRICTNESS
}

fn default_passing_percentage() -> f64 {
    DEFAULT_PASSING_PERCENTAGE
}

impl Default for DimensionSettings {
    fn default() -> Self {
        Self {
            test_count: default_test_count(),
            runs_per_input: default_runs_per_input(),
            variations_per_input: default_variations_per_input(),
            default_strictness: default_strictness(),
            passing_criteria_percentage: default_passing_percentage(),
            concurrent_requests: None,
            timeout_ms: None,
        }
    }
}

/// Settings for an evaluation session, keyed by dimension name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalSettings {
    /// Per-dimension overrides.
    #[serde(default)]
    pub dimensions: HashMap<String, DimensionSettings>,
    /// Queue-wide concurrency cap for LLM calls.
    #[serde(default)]
    pub concurrent_requests: Option<usize>,
}

impl EvalSettings {
    /// Resolve settings for a dimension, falling back to defaults when
    /// the dimension has no entry.
    pub fn for_dimension(&self, name: &str) -> DimensionSettings {
        self.dimensions.get(name).cloned().unwrap_or_default()
    }
}
