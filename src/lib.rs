//! # creweval
//!
//! LLM-driven evaluation harness for CrewAI agents and teams.
//!
//! The core pipeline: YAML-configurable dimension definitions plus an
//! extracted agent/team contract are turned into a bounded set of
//! structured test specifications by one LLM generation call per
//! (dimension, entity) pair; executed outputs are judged per criterion
//! by an LLM with configurable strictness, then aggregated to pass/fail
//! against configurable thresholds. All LLM calls flow through a
//! bounded concurrent queue.
//!
//! Execution of agents, discovery/source scanning, and report
//! rendering are external collaborators; this crate consumes their
//! contracts and produces runtime test specs and evaluation results.

pub mod config;
pub mod contract;
pub mod dimensions;
pub mod errors;
pub mod evaluation;
pub mod generator;
pub mod llm;
pub mod queue;
pub mod specs;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{DimensionSettings, EvalSettings};
pub use contract::{apply_refreshed_contract, EntityType, ExtractedContract, TeamStructure};
pub use dimensions::{DimensionDefinition, DimensionStore};
pub use errors::{GenerationError, LlmError};
pub use evaluation::{CriterionAssessment, EvaluationCriterion, TestEvaluationResult};
pub use generator::{generate_all, generate_tests_from_dimension, GenerationOptions, GenerationOutcome};
pub use llm::{LlmProvider, OpenAiCompletion};
pub use queue::{LlmQueueManager, QueueTask, SchedulingStrategy};
pub use specs::{GeneratedTestCase, TestSpec, TestSpecDocument};

/// Library version.
pub const VERSION: &str = "0.3.0";
