//! LLM provider for test generation and result evaluation.
//!
//! The provider owns an abstract chat transport, a TTL response cache,
//! and the prompt/decode pipeline. Its two central operations are
//! `generate_dimension_tests` and `evaluate_test_result`; contract
//! analysis and schema inference follow the same call/cache/decode
//! shape.

pub mod cache;
pub mod openai;
pub mod prompts;
pub mod response;
pub mod transport;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::DimensionSettings;
use crate::contract::{EntityType, ExtractedContract, TeamStructure};
use crate::dimensions::DimensionDefinition;
use crate::errors::LlmError;
use crate::evaluation::{
    aggregate, resolve_passing_threshold, CriterionAssessment, CrossRunAssessment,
    EvaluationCriterion, TestEvaluationResult,
};

pub use cache::ResponseCache;
pub use openai::OpenAiCompletion;
pub use response::{CandidateTest, ContractAnalysis, InferredSchema};
pub use transport::{ChatCompletion, ChatMessage, CompletionParams};

use response::RawCriterionAssessment;

/// Judge confidence reported when the LLM omits one.
const NEUTRAL_CONFIDENCE: f64 = 0.5;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Request for one dimension-test generation call.
#[derive(Debug)]
pub struct GenerateTestsRequest<'a> {
    pub dimension: &'a DimensionDefinition,
    pub entity_type: EntityType,
    pub entity_name: &'a str,
    /// Number of tests the call must return.
    pub count: usize,
    /// Required for agent entities.
    pub contract: Option<&'a ExtractedContract>,
    /// Required for team and flow entities.
    pub structure: Option<&'a TeamStructure>,
    /// Transport timeout, passed through opaquely.
    pub timeout_ms: Option<u64>,
}

/// The generation result: tests plus an optionally refreshed team
/// contract. The caller decides whether to apply the contract; the
/// provider never mutates entity state.
#[derive(Debug)]
pub struct GenerationResponse {
    pub tests: Vec<CandidateTest>,
    pub contract: Option<Value>,
}

/// What is being judged: one output, or a group of outputs from
/// repeated/varied runs of the same test.
#[derive(Debug, Clone, Copy)]
pub enum EvaluationTarget<'a> {
    Single(&'a Value),
    MultiRun(&'a [Value]),
}

/// Test-level threshold overrides.
#[derive(Debug, Clone, Default)]
pub struct EvaluationThresholds {
    pub passing_criteria_percentage: Option<f64>,
}

/// Request for one evaluation call.
#[derive(Debug)]
pub struct EvaluateTestRequest<'a> {
    pub dimension: &'a str,
    /// Supplies `evaluation_instructions` and configuration defaults.
    pub dimension_definition: Option<&'a DimensionDefinition>,
    pub input: &'a Value,
    pub target: EvaluationTarget<'a>,
    pub contract: Option<&'a ExtractedContract>,
    pub criteria: &'a [EvaluationCriterion],
    /// Resolved settings from the configuration collaborator.
    pub dimension_config: Option<&'a DimensionSettings>,
    /// Test-level overrides; highest precedence.
    pub thresholds: Option<EvaluationThresholds>,
    pub timeout_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// LLM provider facade over an abstract chat transport.
#[derive(Debug)]
pub struct LlmProvider {
    transport: Arc<dyn ChatCompletion>,
    cache: ResponseCache,
}

impl LlmProvider {
    pub fn new(transport: Arc<dyn ChatCompletion>) -> Self {
        Self {
            transport,
            cache: ResponseCache::default(),
        }
    }

    /// Provider with an explicit cache (or [`ResponseCache::disabled`]).
    pub fn with_cache(transport: Arc<dyn ChatCompletion>, cache: ResponseCache) -> Self {
        Self { transport, cache }
    }

    /// Model identifier of the underlying transport.
    pub fn model(&self) -> &str {
        self.transport.model()
    }

    /// Issue one raw completion, read-through the response cache.
    ///
    /// The cache stores raw response text, so a hit replays the same
    /// decode path as a live call and cannot change results.
    async fn complete_cached(
        &self,
        messages: &[ChatMessage],
        timeout_ms: Option<u64>,
    ) -> Result<String, LlmError> {
        let key = ResponseCache::key(&(self.transport.model(), messages));
        if let Some(hit) = self.cache.get(&key) {
            if let Some(text) = hit.as_str() {
                log::debug!("LLM cache hit for model {}", self.transport.model());
                return Ok(text.to_string());
            }
        }

        let raw = self
            .transport
            .complete(messages, &CompletionParams::structured(timeout_ms))
            .await?;
        self.cache.put(key, Value::String(raw.clone()));
        Ok(raw)
    }

    // -----------------------------------------------------------------
    // generate_dimension_tests
    // -----------------------------------------------------------------

    /// Generate `count` structured tests for one (dimension, entity)
    /// pair in a single LLM call.
    ///
    /// Preconditions checked before any call is issued: the dimension
    /// must expose requirement text for the entity type, and the
    /// matching contract (agent) or structure (team/flow) must be
    /// present. A malformed or incomplete LLM response is surfaced as
    /// an error, never coerced into empty results.
    pub async fn generate_dimension_tests(
        &self,
        request: &GenerateTestsRequest<'_>,
    ) -> Result<GenerationResponse, LlmError> {
        let requirements = request
            .dimension
            .requirements_for(request.entity_type)
            .ok_or_else(|| {
                LlmError::precondition(format!(
                    "dimension '{}' has no {} requirements prompt; populate prompts.{}",
                    request.dimension.name,
                    request.entity_type,
                    DimensionDefinition::requirements_field(request.entity_type)
                ))
            })?;

        let entity_context = match request.entity_type {
            EntityType::Agent => request
                .contract
                .ok_or_else(|| {
                    LlmError::precondition(format!(
                        "agent '{}' requires an extracted contract for test generation",
                        request.entity_name
                    ))
                })?
                .context_block(),
            EntityType::Team | EntityType::Flow => request
                .structure
                .ok_or_else(|| {
                    LlmError::precondition(format!(
                        "{} '{}' requires a team structure for test generation",
                        request.entity_type, request.entity_name
                    ))
                })?
                .context_block(),
        };

        let messages = prompts::generation_messages(
            request.dimension,
            requirements,
            request.entity_type,
            &entity_context,
            request.count,
        );

        let raw = self.complete_cached(&messages, request.timeout_ms).await?;
        let batch = response::decode_generated_tests(&raw, request.count)?;

        Ok(GenerationResponse {
            tests: batch.tests,
            contract: batch.contract,
        })
    }

    // -----------------------------------------------------------------
    // evaluate_test_result
    // -----------------------------------------------------------------

    /// Judge one test output (or one multi-run group) against its
    /// criteria and aggregate to a pass/fail verdict.
    ///
    /// Criteria the LLM failed to address are recorded as
    /// `met=false, score=0` and stay in the denominator, so omission
    /// can never inflate the grade.
    pub async fn evaluate_test_result(
        &self,
        request: &EvaluateTestRequest<'_>,
    ) -> Result<TestEvaluationResult, LlmError> {
        if request.criteria.is_empty() {
            return Err(LlmError::precondition(format!(
                "evaluation for dimension '{}' requires at least one criterion",
                request.dimension
            )));
        }

        let instructions = request
            .dimension_definition
            .and_then(|d| d.prompts.evaluation_instructions.as_deref());
        let default_strictness = request
            .dimension_config
            .map(|c| c.default_strictness)
            .or_else(|| {
                request
                    .dimension_definition
                    .and_then(|d| d.configuration.default_strictness)
            });
        let entity_context = request.contract.map(|c| c.context_block());

        let messages = match request.target {
            EvaluationTarget::Single(output) => prompts::evaluation_messages(
                request.dimension,
                instructions,
                entity_context.as_deref(),
                request.input,
                output,
                request.criteria,
                default_strictness,
            ),
            EvaluationTarget::MultiRun(outputs) => prompts::multi_run_evaluation_messages(
                request.dimension,
                instructions,
                entity_context.as_deref(),
                request.input,
                outputs,
                request.criteria,
                default_strictness,
            ),
        };

        let raw = self.complete_cached(&messages, request.timeout_ms).await?;
        let evaluation = response::decode_evaluation(&raw)?;

        let assessments = align_assessments(request.criteria, evaluation.criteria);

        let threshold = resolve_passing_threshold(
            request
                .thresholds
                .as_ref()
                .and_then(|t| t.passing_criteria_percentage),
            request
                .dimension_config
                .map(|c| c.passing_criteria_percentage)
                .or_else(|| {
                    request
                        .dimension_definition
                        .and_then(|d| d.configuration.passing_criteria_percentage)
                }),
        );
        let agg = aggregate(&assessments, threshold);

        Ok(TestEvaluationResult {
            score: agg.score,
            passed: agg.passed,
            reasoning: evaluation.reasoning,
            issues: evaluation.issues,
            confidence: evaluation.confidence.unwrap_or(NEUTRAL_CONFIDENCE),
            criteria: assessments,
            cross_run: evaluation.cross_run.map(|c| CrossRunAssessment {
                consistent: c.consistent,
                score: c.score,
                reasoning: c.reasoning,
            }),
        })
    }

    // -----------------------------------------------------------------
    // analyze_contract / infer_schema
    // -----------------------------------------------------------------

    /// Analyze an entity contract. Same call/cache/decode shape as the
    /// central operations.
    pub async fn analyze_contract(
        &self,
        entity_context: &str,
        timeout_ms: Option<u64>,
    ) -> Result<ContractAnalysis, LlmError> {
        let messages = prompts::contract_analysis_messages(entity_context);
        let raw = self.complete_cached(&messages, timeout_ms).await?;
        response::decode_contract_analysis(&raw)
    }

    /// Infer a JSON schema from sample payloads.
    pub async fn infer_schema(
        &self,
        samples: &[Value],
        timeout_ms: Option<u64>,
    ) -> Result<InferredSchema, LlmError> {
        if samples.is_empty() {
            return Err(LlmError::precondition(
                "schema inference requires at least one sample payload",
            ));
        }
        let messages = prompts::schema_inference_messages(samples);
        let raw = self.complete_cached(&messages, timeout_ms).await?;
        response::decode_inferred_schema(&raw)
    }
}

// ---------------------------------------------------------------------------
// Criterion alignment
// ---------------------------------------------------------------------------

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Align the judge's assessments to the requested criteria.
///
/// Matches by criterion text first, then by position when the judge
/// returned exactly one assessment per criterion. Requested criteria
/// with no match are recorded as unaddressed (failed).
fn align_assessments(
    requested: &[EvaluationCriterion],
    raw: Vec<RawCriterionAssessment>,
) -> Vec<CriterionAssessment> {
    let mut by_text: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, assessment) in raw.iter().enumerate() {
        by_text
            .entry(normalize(&assessment.criterion))
            .or_default()
            .push(i);
    }

    let positional_ok = raw.len() == requested.len();
    let mut used = vec![false; raw.len()];
    let mut aligned = Vec::with_capacity(requested.len());

    for (position, criterion) in requested.iter().enumerate() {
        let matched = by_text
            .get(&normalize(&criterion.criterion))
            .and_then(|indices| indices.iter().copied().find(|&i| !used[i]))
            .or_else(|| {
                if positional_ok && !used[position] {
                    Some(position)
                } else {
                    None
                }
            });

        match matched {
            Some(i) => {
                used[i] = true;
                let assessment = &raw[i];
                aligned.push(CriterionAssessment {
                    criterion: criterion.criterion.clone(),
                    met: assessment.met,
                    score: assessment.score,
                    evidence: assessment.evidence.clone(),
                    reasoning: assessment.reasoning.clone(),
                });
            }
            None => {
                log::warn!(
                    "evaluation response did not address criterion '{}'; recording as failed",
                    criterion.criterion
                );
                aligned.push(CriterionAssessment::unaddressed(&criterion.criterion));
            }
        }
    }

    aligned
}
