//! Test spec loader: persisted document to executable runtime specs.
//!
//! Re-hydrates persisted tests into runtime specs, expanding multi-run
//! tests into per-run instances with deterministic ids plus one parent
//! spec kept purely for aggregation. One malformed test never blocks
//! the rest of the batch: it is skipped with a warning.

use serde_json::Value;

use super::{GeneratedTestCase, MultiRunConfig, TestSpec, TestSpecDocument};
use crate::contract::EntityType;
use crate::dimensions::DimensionStore;
use crate::generator::derive_multi_run;

/// Model-name substrings that mark a batch as LLM-generated.
const KNOWN_MODEL_SUBSTRINGS: &[&str] =
    &["gpt", "claude", "gemini", "llama", "mistral", "o1", "o3", "o4"];

// ---------------------------------------------------------------------------
// Load outcome
// ---------------------------------------------------------------------------

/// Bookkeeping from a load pass.
#[derive(Debug, Clone)]
pub struct LoadMetadata {
    pub entity_type: EntityType,
    /// Persisted tests considered (before expansion).
    pub source_tests: usize,
    /// Tests skipped for per-test data errors (missing id).
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Loaded runtime specs plus load metadata.
#[derive(Debug)]
pub struct LoadOutcome {
    pub test_specs: Vec<TestSpec>,
    pub metadata: LoadMetadata,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load runtime test specs for agents.
pub fn load_agent_tests(
    document: &TestSpecDocument,
    selected_agents: Option<&[String]>,
    selected_dimensions: Option<&[String]>,
    store: Option<&DimensionStore>,
) -> LoadOutcome {
    load_entity_tests(
        document,
        EntityType::Agent,
        selected_agents,
        selected_dimensions,
        store,
    )
}

/// Load runtime test specs for teams.
pub fn load_team_tests(
    document: &TestSpecDocument,
    selected_teams: Option<&[String]>,
    selected_dimensions: Option<&[String]>,
    store: Option<&DimensionStore>,
) -> LoadOutcome {
    load_entity_tests(
        document,
        EntityType::Team,
        selected_teams,
        selected_dimensions,
        store,
    )
}

/// Load runtime test specs for flows.
pub fn load_flow_tests(
    document: &TestSpecDocument,
    selected_flows: Option<&[String]>,
    selected_dimensions: Option<&[String]>,
    store: Option<&DimensionStore>,
) -> LoadOutcome {
    load_entity_tests(
        document,
        EntityType::Flow,
        selected_flows,
        selected_dimensions,
        store,
    )
}

/// Shared load path; entity types differ only by tag.
///
/// Multi-run-ness resolves the same way for every entity type:
/// test-level explicit config, then the dimension's configuration from
/// the store, then single run.
fn load_entity_tests(
    document: &TestSpecDocument,
    entity_type: EntityType,
    selected: Option<&[String]>,
    selected_dimensions: Option<&[String]>,
    store: Option<&DimensionStore>,
) -> LoadOutcome {
    let mut specs = Vec::new();
    let mut warnings = Vec::new();
    let mut source_tests = 0;
    let mut skipped = 0;

    if let Some(selected) = selected {
        for name in selected {
            if !document.entities.contains_key(name) {
                warnings.push(format!(
                    "{} '{}' has no entry in the test spec document",
                    entity_type, name
                ));
            }
        }
    }

    for (entity_name, dimensions) in &document.entities {
        if let Some(selected) = selected {
            if !selected.iter().any(|s| s == entity_name) {
                continue;
            }
        }

        for (dimension_name, entry) in dimensions {
            if let Some(filter) = selected_dimensions {
                if !filter.iter().any(|d| d == dimension_name) {
                    continue;
                }
            }

            for test in &entry.tests {
                source_tests += 1;

                // Per-test data error: skip and continue the batch.
                if test.id.trim().is_empty() {
                    let warning = format!(
                        "skipping test without id for {} '{}' in dimension '{}'",
                        entity_type, entity_name, dimension_name
                    );
                    log::warn!("{}", warning);
                    warnings.push(warning);
                    skipped += 1;
                    continue;
                }

                let multi_run = resolve_multi_run(test, dimension_name, store);
                expand_test(
                    test,
                    entity_name,
                    entity_type,
                    dimension_name,
                    multi_run,
                    &mut specs,
                );
            }
        }
    }

    LoadOutcome {
        test_specs: specs,
        metadata: LoadMetadata {
            entity_type,
            source_tests,
            skipped,
            warnings,
        },
    }
}

/// Resolve the multi-run configuration for a persisted test.
fn resolve_multi_run(
    test: &GeneratedTestCase,
    dimension_name: &str,
    store: Option<&DimensionStore>,
) -> Option<MultiRunConfig> {
    if let Some(config) = &test.multi_run {
        if config.run_count > 1 {
            return Some(config.clone());
        }
        return None;
    }

    let definition = store.and_then(|s| s.load(dimension_name))?;
    derive_multi_run(
        definition.configuration.runs_per_input.unwrap_or(1),
        definition.configuration.variations_per_input.unwrap_or(1),
        true,
    )
}

/// Expand one persisted test into runtime specs.
///
/// Single-run tests produce one executable spec. A multi-run test with
/// `run_count = N` produces N children with ids `{parent}-run{0..N-1}`
/// and dense run indices, plus exactly one parent spec retained for
/// aggregation bookkeeping; the parent is never executed.
fn expand_test(
    test: &GeneratedTestCase,
    entity_name: &str,
    entity_type: EntityType,
    dimension_name: &str,
    multi_run: Option<MultiRunConfig>,
    specs: &mut Vec<TestSpec>,
) {
    let input = normalize_input(&test.input);

    let base = TestSpec {
        id: test.id.clone(),
        parent_test_id: None,
        run_index: None,
        is_multi_run: false,
        is_parent_test: false,
        entity_name: entity_name.to_string(),
        entity_type,
        dimension: dimension_name.to_string(),
        input,
        expected: test.expected.clone(),
        evaluation_criteria: test.evaluation_criteria.clone(),
        priority: test.priority,
        multi_run: None,
        metadata: test.metadata.clone(),
    };

    let config = match multi_run {
        None => {
            specs.push(base);
            return;
        }
        Some(config) => config,
    };

    for run_index in 0..config.run_count {
        let mut child = base.clone();
        child.id = format!("{}-run{}", test.id, run_index);
        child.parent_test_id = Some(test.id.clone());
        child.run_index = Some(run_index);
        specs.push(child);
    }

    let mut parent = base;
    parent.is_multi_run = true;
    parent.is_parent_test = true;
    parent.multi_run = Some(config);
    specs.push(parent);
}

/// Unwrap the legacy `{actual_input_to_agent: ...}` input envelope.
fn normalize_input(input: &Value) -> Value {
    if let Value::Object(map) = input {
        if map.len() == 1 {
            if let Some(inner) = map.get("actual_input_to_agent") {
                return inner.clone();
            }
        }
    }
    input.clone()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Read-only validation outcome. `missing` entries make the document
/// invalid; `warnings` do not.
#[derive(Debug, Clone)]
pub struct SpecValidation {
    pub valid: bool,
    pub missing: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validate the document against the expected entity list without
/// loading anything.
pub fn validate_test_specs(document: &TestSpecDocument, entities: &[String]) -> SpecValidation {
    let mut missing = Vec::new();
    let mut warnings = Vec::new();

    for entity in entities {
        match document.entities.get(entity) {
            None => missing.push(format!("agent '{}' not found in test spec document", entity)),
            Some(dimensions) => {
                let total_tests: usize = dimensions.values().map(|e| e.tests.len()).sum();
                if total_tests == 0 {
                    missing.push(format!("no test specs for agent '{}'", entity));
                }
            }
        }
    }

    for (entity, dimensions) in &document.entities {
        for (dimension, entry) in dimensions {
            if entry.tests.is_empty() {
                warnings.push(format!(
                    "'{}' dimension '{}' has an empty tests array",
                    entity, dimension
                ));
                continue;
            }

            for test in &entry.tests {
                if test.evaluation_criteria.is_empty() {
                    warnings.push(format!(
                        "test '{}' for '{}' in dimension '{}' has no evaluation criteria",
                        test.id, entity, dimension
                    ));
                }
            }

            let generated_by = if entry.generated_by.is_empty() {
                entry
                    .tests
                    .first()
                    .map(|t| t.metadata.generated_by.as_str())
                    .unwrap_or("")
            } else {
                entry.generated_by.as_str()
            };
            let lowercase = generated_by.to_lowercase();
            if !KNOWN_MODEL_SUBSTRINGS.iter().any(|m| lowercase.contains(m)) {
                warnings.push(format!(
                    "'{}' dimension '{}' is not attributable to an LLM generator (generatedBy: '{}')",
                    entity, dimension, generated_by
                ));
            }
        }
    }

    SpecValidation {
        valid: missing.is_empty(),
        missing,
        warnings,
    }
}
