//! Generic test generator: one dimension × one entity into N test
//! specifications.
//!
//! Preconditions fail fast with explicit errors before any LLM call.
//! Each (dimension, entity) pair issues exactly one generation call;
//! variety comes from the LLM generating diverse inputs in one pass,
//! not from N separate calls. Generation is pure with respect to the
//! entity: a refreshed team contract is returned, never applied.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use uuid::Uuid;

use crate::contract::{EntityType, ExtractedContract, TeamStructure};
use crate::dimensions::DimensionDefinition;
use crate::errors::{GenerationError, LlmError};
use crate::llm::{GenerateTestsRequest, LlmProvider};
use crate::queue::{LlmQueueManager, QueueTask};
use crate::specs::{
    AggregationStrategy, ExecutionMode, GeneratedTestCase, InputComplexity, MultiRunConfig,
    RunType, TestProvenance,
};

/// Generator identifier stamped into test provenance.
pub const GENERATOR_VERSION: &str = "creweval-generator/0.3";

// Generator-level defaults: the last layer of the configuration
// precedence chain (explicit options > dimension configuration > these).
const DEFAULT_TEST_COUNT: usize = 3;
const DEFAULT_RUNS_PER_INPUT: u32 = 3;
const DEFAULT_VARIATIONS_PER_INPUT: u32 = 2;
const DEFAULT_MULTI_RUN_ENABLED: bool = true;

// ---------------------------------------------------------------------------
// Options and outcome
// ---------------------------------------------------------------------------

/// Caller options for one generation call. Entity inputs are required
/// per entity type; configuration fields override the dimension's own
/// configuration block.
#[derive(Debug, Default)]
pub struct GenerationOptions<'a> {
    /// Required for agent entities.
    pub contract: Option<&'a ExtractedContract>,
    /// Required for team and flow entities.
    pub structure: Option<&'a TeamStructure>,
    pub test_count: Option<usize>,
    pub runs_per_input: Option<u32>,
    pub variations_per_input: Option<u32>,
    pub multi_run_enabled: Option<bool>,
    pub timeout_ms: Option<u64>,
}

/// Generation result: the tests, plus the refreshed team contract when
/// the LLM returned one. Callers apply the contract explicitly via
/// [`crate::contract::apply_refreshed_contract`] and persist it
/// themselves.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub tests: Vec<GeneratedTestCase>,
    pub refreshed_contract: Option<Value>,
}

#[derive(Debug, Clone, Copy)]
struct EffectiveConfig {
    test_count: usize,
    runs_per_input: u32,
    variations_per_input: u32,
    multi_run_enabled: bool,
}

fn resolve_config(
    dimension: &DimensionDefinition,
    options: &GenerationOptions<'_>,
) -> EffectiveConfig {
    EffectiveConfig {
        test_count: options
            .test_count
            .or(dimension.configuration.test_count.map(|c| c as usize))
            .unwrap_or(DEFAULT_TEST_COUNT),
        runs_per_input: options
            .runs_per_input
            .or(dimension.configuration.runs_per_input)
            .unwrap_or(DEFAULT_RUNS_PER_INPUT),
        variations_per_input: options
            .variations_per_input
            .or(dimension.configuration.variations_per_input)
            .unwrap_or(DEFAULT_VARIATIONS_PER_INPUT),
        multi_run_enabled: options.multi_run_enabled.unwrap_or(DEFAULT_MULTI_RUN_ENABLED),
    }
}

// ---------------------------------------------------------------------------
// Multi-run derivation
// ---------------------------------------------------------------------------

/// Derive the multi-run configuration from effective run counts.
///
/// `identical` (repeat the same input) when runs exceed one and no
/// variation is requested: a consistency probe aggregated by direct
/// comparison. Otherwise `variations`: a robustness probe aggregated
/// statistically. The two probes never share an aggregation default.
pub fn derive_multi_run(
    runs_per_input: u32,
    variations_per_input: u32,
    enabled: bool,
) -> Option<MultiRunConfig> {
    if !enabled {
        return None;
    }
    if runs_per_input > 1 && variations_per_input <= 1 {
        Some(MultiRunConfig {
            run_count: runs_per_input,
            run_type: RunType::Identical,
            aggregation_strategy: AggregationStrategy::Compare,
            execution_mode: ExecutionMode::Parallel,
        })
    } else if variations_per_input > 1 {
        Some(MultiRunConfig {
            run_count: variations_per_input,
            run_type: RunType::Variations,
            aggregation_strategy: AggregationStrategy::Statistical,
            execution_mode: ExecutionMode::Parallel,
        })
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Complexity classification
// ---------------------------------------------------------------------------

/// Deterministic complexity tag for a test input, by serialized length
/// and structural shape. An object with more than 3 keys pushes one
/// level up. Used for UI/triage only.
pub fn classify_input_complexity(input: &Value) -> InputComplexity {
    let serialized_len = serde_json::to_string(input).map(|s| s.len()).unwrap_or(0);
    let mut level: usize = match serialized_len {
        0..=80 => 0,
        81..=400 => 1,
        401..=1200 => 2,
        _ => 3,
    };
    if let Value::Object(map) = input {
        if map.len() > 3 {
            level = (level + 1).min(3);
        }
    }
    [
        InputComplexity::Simple,
        InputComplexity::Moderate,
        InputComplexity::Complex,
        InputComplexity::Advanced,
    ][level]
}

// ---------------------------------------------------------------------------
// Single-pair generation
// ---------------------------------------------------------------------------

/// Generate tests for one (dimension, entity) pair.
///
/// Fails fast before any LLM call when the entity input for the type is
/// missing or the dimension lacks requirement text for it. Issues
/// exactly one `generate_dimension_tests` call regardless of the
/// effective test count.
pub async fn generate_tests_from_dimension(
    dimension: &DimensionDefinition,
    entity_type: EntityType,
    entity_name: &str,
    provider: &LlmProvider,
    options: &GenerationOptions<'_>,
) -> Result<GenerationOutcome, GenerationError> {
    match entity_type {
        EntityType::Agent => {
            if options.contract.is_none() {
                return Err(GenerationError::MissingContract {
                    entity: entity_name.to_string(),
                });
            }
        }
        EntityType::Team | EntityType::Flow => {
            if options.structure.is_none() {
                return Err(GenerationError::MissingStructure {
                    entity: entity_name.to_string(),
                });
            }
        }
    }

    if dimension.requirements_for(entity_type).is_none() {
        return Err(GenerationError::MissingRequirements {
            dimension: dimension.name.clone(),
            entity_type,
            prompt_field: DimensionDefinition::requirements_field(entity_type),
        });
    }

    let config = resolve_config(dimension, options);
    log::debug!(
        "generating {} tests for {} '{}' on dimension '{}'",
        config.test_count,
        entity_type,
        entity_name,
        dimension.name
    );

    let response = provider
        .generate_dimension_tests(&GenerateTestsRequest {
            dimension,
            entity_type,
            entity_name,
            count: config.test_count,
            contract: options.contract,
            structure: options.structure,
            timeout_ms: options.timeout_ms,
        })
        .await?;

    let multi_run = derive_multi_run(
        config.runs_per_input,
        config.variations_per_input,
        config.multi_run_enabled,
    );
    let generated_at = Utc::now();

    let tests = response
        .tests
        .into_iter()
        .map(|candidate| {
            let complexity = classify_input_complexity(&candidate.input);
            GeneratedTestCase {
                // Fresh unique id, never derived from content:
                // re-generation produces disjoint identities.
                id: Uuid::new_v4().to_string(),
                dimension: dimension.name.clone(),
                input: candidate.input,
                expected: candidate.expected,
                evaluation_criteria: candidate.evaluation_criteria,
                rationale: candidate.rationale.clone(),
                category: candidate.category,
                priority: candidate.priority,
                ui_description: candidate.ui_description,
                multi_run: multi_run.clone(),
                metadata: TestProvenance {
                    generated_by: provider.model().to_string(),
                    generator_version: GENERATOR_VERSION.to_string(),
                    source_dimension: Some(format!("{}.yaml", dimension.name)),
                    reasoning: Some(candidate.rationale),
                    confidence: candidate.confidence,
                    complexity: Some(complexity),
                    generated_at: Some(generated_at),
                },
            }
        })
        .collect();

    Ok(GenerationOutcome {
        tests,
        refreshed_contract: response.contract,
    })
}

// ---------------------------------------------------------------------------
// Batch generation
// ---------------------------------------------------------------------------

/// One entity to generate tests for in a batch run.
#[derive(Debug, Clone)]
pub struct GenerationTarget {
    pub entity_type: EntityType,
    pub entity_name: String,
    pub contract: Option<ExtractedContract>,
    pub structure: Option<TeamStructure>,
}

/// A successful batch entry.
#[derive(Debug)]
pub struct BatchGeneration {
    pub entity_name: String,
    pub dimension: String,
    pub outcome: GenerationOutcome,
}

/// A failed batch entry with the reason.
#[derive(Debug)]
pub struct BatchFailure {
    pub entity_name: String,
    pub dimension: String,
    pub error: String,
}

/// Partial-success report for a batch generation run.
#[derive(Debug, Default)]
pub struct BatchGenerationReport {
    pub succeeded: Vec<BatchGeneration>,
    pub failed: Vec<BatchFailure>,
}

impl BatchGenerationReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Generate tests for every (entity, dimension) pair, routing each
/// pair's single LLM call through the queue manager.
///
/// Precondition failures are reported synchronously without consuming
/// a queue slot; LLM failures are isolated per pair. The report lists
/// what failed and why instead of aborting the batch.
pub async fn generate_all(
    dimensions: &[Arc<DimensionDefinition>],
    targets: &[GenerationTarget],
    provider: &Arc<LlmProvider>,
    queue: &LlmQueueManager<GenerationOutcome>,
) -> BatchGenerationReport {
    let mut report = BatchGenerationReport::default();
    let mut handles = Vec::new();

    for target in targets {
        for dimension in dimensions {
            let pair = (target.entity_name.clone(), dimension.name.clone());

            // Preconditions fail the pair synchronously, before any
            // queue slot or LLM call is spent on it.
            let precondition = check_preconditions(dimension, target);
            if let Err(e) = precondition {
                log::warn!(
                    "skipping generation for '{}' on dimension '{}': {}",
                    pair.0,
                    pair.1,
                    e
                );
                report.failed.push(BatchFailure {
                    entity_name: pair.0,
                    dimension: pair.1,
                    error: e.to_string(),
                });
                continue;
            }

            let provider = Arc::clone(provider);
            let dimension = Arc::clone(dimension);
            let target = target.clone();
            let task_id = format!("generate:{}:{}", pair.0, pair.1);

            let handle = queue.enqueue(
                QueueTask::new(task_id, move || async move {
                    generate_tests_from_dimension(
                        &dimension,
                        target.entity_type,
                        &target.entity_name,
                        &provider,
                        &GenerationOptions {
                            contract: target.contract.as_ref(),
                            structure: target.structure.as_ref(),
                            ..Default::default()
                        },
                    )
                    .await
                    .map_err(|e| match e {
                        GenerationError::Llm(llm) => llm,
                        other => LlmError::precondition(other.to_string()),
                    })
                })
                .with_priority(dimension_priority(dimensions, &pair.1)),
            );
            handles.push((pair, handle));
        }
    }

    let (pairs, handle_futures): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
    let results = join_all(handle_futures).await;

    for ((entity_name, dimension), result) in pairs.into_iter().zip(results) {
        match result {
            Ok(outcome) => report.succeeded.push(BatchGeneration {
                entity_name,
                dimension,
                outcome,
            }),
            Err(e) => report.failed.push(BatchFailure {
                entity_name,
                dimension,
                error: e.to_string(),
            }),
        }
    }

    report
}

fn check_preconditions(
    dimension: &DimensionDefinition,
    target: &GenerationTarget,
) -> Result<(), GenerationError> {
    match target.entity_type {
        EntityType::Agent if target.contract.is_none() => Err(GenerationError::MissingContract {
            entity: target.entity_name.clone(),
        }),
        EntityType::Team | EntityType::Flow if target.structure.is_none() => {
            Err(GenerationError::MissingStructure {
                entity: target.entity_name.clone(),
            })
        }
        entity_type if dimension.requirements_for(entity_type).is_none() => {
            Err(GenerationError::MissingRequirements {
                dimension: dimension.name.clone(),
                entity_type,
                prompt_field: DimensionDefinition::requirements_field(entity_type),
            })
        }
        _ => Ok(()),
    }
}

/// Higher dimension priority dispatches first; definitions order by
/// ascending `priority`, so invert for the queue.
fn dimension_priority(dimensions: &[Arc<DimensionDefinition>], name: &str) -> i32 {
    dimensions
        .iter()
        .find(|d| d.name == name)
        .map(|d| -d.priority)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::builtin;
    use crate::queue::SchedulingStrategy;
    use crate::test_support::ScriptedTransport;

    fn contract() -> ExtractedContract {
        ExtractedContract {
            role: "Researcher".to_string(),
            goal: "Answer with sources".to_string(),
            backstory: None,
            tools: vec![],
            capabilities: vec![],
            metadata: serde_json::Map::new(),
        }
    }

    fn generation_response(count: usize) -> String {
        let tests: Vec<Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "input": {"question": format!("q{}", i)},
                    "evaluation_criteria": [{"criterion": "grounded"}],
                    "rationale": "probes grounding",
                    "category": "grounding",
                    "confidence": 0.9
                })
            })
            .collect();
        serde_json::json!({ "tests": tests }).to_string()
    }

    #[tokio::test]
    async fn test_missing_contract_fails_before_llm() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let provider = LlmProvider::new(transport.clone());
        let dimension = builtin::builtin("accuracy").unwrap();

        let err = generate_tests_from_dimension(
            &dimension,
            EntityType::Agent,
            "researcher",
            &provider,
            &GenerationOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, GenerationError::MissingContract { .. }));
        assert!(err.to_string().contains("researcher"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_structure_fails_for_team() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let provider = LlmProvider::new(transport);
        let dimension = builtin::builtin("accuracy").unwrap();

        let err = generate_tests_from_dimension(
            &dimension,
            EntityType::Team,
            "crew",
            &provider,
            &GenerationOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, GenerationError::MissingStructure { .. }));
    }

    #[tokio::test]
    async fn test_single_llm_call_for_count() {
        let transport = Arc::new(ScriptedTransport::new(vec![generation_response(5)]));
        let provider = LlmProvider::new(transport.clone());
        let dimension = builtin::builtin("accuracy").unwrap();
        let contract = contract();

        let outcome = generate_tests_from_dimension(
            &dimension,
            EntityType::Agent,
            "researcher",
            &provider,
            &GenerationOptions {
                contract: Some(&contract),
                test_count: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.tests.len(), 5);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_ids_are_fresh_and_unique() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            generation_response(3),
            generation_response(3),
        ]));
        let provider = LlmProvider::with_cache(transport, crate::llm::ResponseCache::disabled());
        let dimension = builtin::builtin("accuracy").unwrap();
        let contract = contract();
        let options = GenerationOptions {
            contract: Some(&contract),
            ..Default::default()
        };

        let first = generate_tests_from_dimension(
            &dimension,
            EntityType::Agent,
            "researcher",
            &provider,
            &options,
        )
        .await
        .unwrap();
        let second = generate_tests_from_dimension(
            &dimension,
            EntityType::Agent,
            "researcher",
            &provider,
            &options,
        )
        .await
        .unwrap();

        let mut ids: Vec<&str> = first
            .tests
            .iter()
            .chain(second.tests.iter())
            .map(|t| t.id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        // Re-generation of identical content still yields disjoint ids.
        assert_eq!(ids.len(), 6);
    }

    #[tokio::test]
    async fn test_provenance_and_multi_run_defaults() {
        let transport = Arc::new(ScriptedTransport::new(vec![generation_response(3)]));
        let provider = LlmProvider::new(transport);
        // Consistency configures runs=3, variations=1 -> identical.
        let dimension = builtin::builtin("consistency").unwrap();
        let contract = contract();

        let outcome = generate_tests_from_dimension(
            &dimension,
            EntityType::Agent,
            "researcher",
            &provider,
            &GenerationOptions {
                contract: Some(&contract),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let test = &outcome.tests[0];
        let multi_run = test.multi_run.as_ref().unwrap();
        assert_eq!(multi_run.run_count, 3);
        assert_eq!(multi_run.run_type, RunType::Identical);
        assert_eq!(multi_run.aggregation_strategy, AggregationStrategy::Compare);
        assert_eq!(test.metadata.generated_by, "gpt-4o-scripted");
        assert_eq!(test.metadata.generator_version, GENERATOR_VERSION);
        assert_eq!(test.metadata.confidence, Some(0.9));
        assert_eq!(
            test.metadata.source_dimension.as_deref(),
            Some("consistency.yaml")
        );
    }

    #[tokio::test]
    async fn test_refreshed_contract_returned_not_applied() {
        let response = serde_json::json!({
            "tests": [{
                "input": "task",
                "evaluation_criteria": [{"criterion": "done"}],
                "rationale": "r",
                "category": "c"
            }],
            "contract": {"members": ["a", "b"]}
        })
        .to_string();
        let transport = Arc::new(ScriptedTransport::new(vec![response]));
        let provider = LlmProvider::new(transport);
        let dimension = builtin::builtin("accuracy").unwrap();
        let structure = TeamStructure {
            name: "crew".to_string(),
            members: vec![],
            tasks: vec![],
            workflow: None,
            contract: None,
            contract_updated_at: None,
        };

        let outcome = generate_tests_from_dimension(
            &dimension,
            EntityType::Team,
            "crew",
            &provider,
            &GenerationOptions {
                structure: Some(&structure),
                test_count: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(outcome.refreshed_contract.is_some());
        // The input structure is untouched; applying is the caller's move.
        assert!(structure.contract.is_none());
    }

    #[test]
    fn test_multi_run_derivation() {
        // runs > 1, variations <= 1 -> identical consistency probe.
        let identical = derive_multi_run(3, 1, true).unwrap();
        assert_eq!(identical.run_type, RunType::Identical);
        assert_eq!(identical.run_count, 3);

        // variations > 1 -> robustness probe, regardless of runs.
        let varied = derive_multi_run(3, 2, true).unwrap();
        assert_eq!(varied.run_type, RunType::Variations);
        assert_eq!(varied.run_count, 2);
        assert_eq!(varied.aggregation_strategy, AggregationStrategy::Statistical);

        // Single run or disabled -> no multi-run at all.
        assert!(derive_multi_run(1, 1, true).is_none());
        assert!(derive_multi_run(3, 1, false).is_none());
    }

    #[test]
    fn test_complexity_classification() {
        assert_eq!(
            classify_input_complexity(&serde_json::json!("short")),
            InputComplexity::Simple
        );
        assert_eq!(
            classify_input_complexity(&serde_json::json!({
                "a": "x".repeat(100)
            })),
            InputComplexity::Moderate
        );
        // Wide objects push one level up.
        assert_eq!(
            classify_input_complexity(&serde_json::json!({
                "a": 1, "b": 2, "c": 3, "d": 4
            })),
            InputComplexity::Moderate
        );
        assert_eq!(
            classify_input_complexity(&serde_json::json!({
                "a": "x".repeat(600), "b": 2, "c": 3, "d": 4
            })),
            InputComplexity::Advanced
        );
    }

    #[tokio::test]
    async fn test_generate_all_partial_success() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            generation_response(3),
            generation_response(3),
        ]));
        let provider = Arc::new(LlmProvider::with_cache(
            transport.clone(),
            crate::llm::ResponseCache::disabled(),
        ));
        let dimensions = vec![Arc::new(builtin::builtin("accuracy").unwrap())];
        let targets = vec![
            GenerationTarget {
                entity_type: EntityType::Agent,
                entity_name: "researcher".to_string(),
                contract: Some(contract()),
                structure: None,
            },
            GenerationTarget {
                entity_type: EntityType::Agent,
                entity_name: "writer".to_string(),
                contract: Some(contract()),
                structure: None,
            },
            // Missing contract: fails preconditions, never enqueued.
            GenerationTarget {
                entity_type: EntityType::Agent,
                entity_name: "broken".to_string(),
                contract: None,
                structure: None,
            },
        ];
        let queue = LlmQueueManager::new(2, SchedulingStrategy::Fifo);

        let report = generate_all(&dimensions, &targets, &provider, &queue).await;

        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].entity_name, "broken");
        assert!(report.failed[0].error.contains("contract"));
        // Two LLM calls for two successful pairs.
        assert_eq!(transport.call_count(), 2);
        // The precondition failure never consumed a queue slot.
        assert_eq!(queue.total_enqueued(), 2);
    }
}
