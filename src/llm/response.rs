//! Strict decoding of LLM responses.
//!
//! The LLM's output is untrusted external input: every payload is
//! schema-validated here before any field is read. Malformed or
//! incomplete responses are surfaced as errors to the caller, never
//! coerced into empty results.

use serde::Deserialize;
use serde_json::Value;

use super::transport::extract_json;
use crate::errors::LlmError;
use crate::evaluation::EvaluationCriterion;

// ---------------------------------------------------------------------------
// Generation response
// ---------------------------------------------------------------------------

/// One test candidate as returned by the generation call, before the
/// generator attaches ids, provenance, and multi-run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateTest {
    pub input: Value,
    #[serde(default)]
    pub expected: Option<Value>,
    pub evaluation_criteria: Vec<EvaluationCriterion>,
    pub rationale: String,
    pub category: String,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub ui_description: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// The decoded generation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedTestBatch {
    pub tests: Vec<CandidateTest>,
    /// Refreshed team contract, when the call produced one.
    #[serde(default)]
    pub contract: Option<Value>,
}

/// Decode and validate a generation response.
///
/// Fewer tests than requested is an incomplete response and therefore
/// an error; extras beyond `count` are truncated.
pub fn decode_generated_tests(
    response: &str,
    count: usize,
) -> Result<GeneratedTestBatch, LlmError> {
    let value = extract_json(response)?;
    let mut batch: GeneratedTestBatch = serde_json::from_value(value)
        .map_err(|e| LlmError::malformed(format!("generation response shape: {}", e)))?;

    if batch.tests.len() < count {
        return Err(LlmError::malformed(format!(
            "generation returned {} tests, expected {}",
            batch.tests.len(),
            count
        )));
    }
    if batch.tests.len() > count {
        log::debug!(
            "generation returned {} tests, truncating to requested {}",
            batch.tests.len(),
            count
        );
        batch.tests.truncate(count);
    }

    for (i, test) in batch.tests.iter().enumerate() {
        if test.evaluation_criteria.is_empty() {
            return Err(LlmError::malformed(format!(
                "generated test {} has no evaluation criteria",
                i
            )));
        }
        if test.input.is_null() {
            return Err(LlmError::malformed(format!(
                "generated test {} has a null input",
                i
            )));
        }
        for criterion in &test.evaluation_criteria {
            if let Some(strictness) = criterion.evaluation_strictness {
                if strictness > 100 {
                    return Err(LlmError::malformed(format!(
                        "generated test {} carries strictness {} > 100",
                        i, strictness
                    )));
                }
            }
        }
    }

    Ok(batch)
}

// ---------------------------------------------------------------------------
// Evaluation response
// ---------------------------------------------------------------------------

/// One criterion verdict as returned by the judge. `met` defaults to
/// false so an unaddressed field reads as failed, not as absent.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCriterionAssessment {
    pub criterion: String,
    #[serde(default)]
    pub met: bool,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Cross-run verdict from a multi-run group evaluation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCrossRun {
    #[serde(default)]
    pub consistent: bool,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub reasoning: String,
}

/// The decoded evaluation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvaluation {
    pub criteria: Vec<RawCriterionAssessment>,
    #[serde(default)]
    pub cross_run: Option<RawCrossRun>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasoning: String,
}

/// Decode and validate an evaluation response. Scores are clamped to
/// [0, 1]; an empty criteria list is malformed.
pub fn decode_evaluation(response: &str) -> Result<RawEvaluation, LlmError> {
    let value = extract_json(response)?;
    let mut evaluation: RawEvaluation = serde_json::from_value(value)
        .map_err(|e| LlmError::malformed(format!("evaluation response shape: {}", e)))?;

    if evaluation.criteria.is_empty() {
        return Err(LlmError::malformed(
            "evaluation response contains no criterion assessments",
        ));
    }

    for assessment in &mut evaluation.criteria {
        assessment.score = assessment.score.clamp(0.0, 1.0);
    }
    if let Some(confidence) = evaluation.confidence.as_mut() {
        *confidence = confidence.clamp(0.0, 1.0);
    }
    if let Some(cross_run) = evaluation.cross_run.as_mut() {
        if let Some(score) = cross_run.score.as_mut() {
            *score = score.clamp(0.0, 1.0);
        }
    }

    Ok(evaluation)
}

// ---------------------------------------------------------------------------
// Contract analysis / schema inference
// ---------------------------------------------------------------------------

/// Decoded contract-analysis payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractAnalysis {
    pub summary: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
}

/// Decoded schema-inference payload.
#[derive(Debug, Clone, Deserialize)]
pub struct InferredSchema {
    pub schema: Value,
    #[serde(default)]
    pub confidence: Option<f64>,
}

pub fn decode_contract_analysis(response: &str) -> Result<ContractAnalysis, LlmError> {
    let value = extract_json(response)?;
    serde_json::from_value(value)
        .map_err(|e| LlmError::malformed(format!("contract analysis shape: {}", e)))
}

pub fn decode_inferred_schema(response: &str) -> Result<InferredSchema, LlmError> {
    let value = extract_json(response)?;
    serde_json::from_value(value)
        .map_err(|e| LlmError::malformed(format!("inferred schema shape: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation_json(test_count: usize) -> String {
        let tests: Vec<Value> = (0..test_count)
            .map(|i| {
                serde_json::json!({
                    "input": {"question": format!("q{}", i)},
                    "evaluation_criteria": [{"criterion": "answers correctly"}],
                    "rationale": "probes recall",
                    "category": "factual"
                })
            })
            .collect();
        serde_json::json!({ "tests": tests }).to_string()
    }

    #[test]
    fn test_decode_generation_exact_count() {
        let batch = decode_generated_tests(&generation_json(3), 3).unwrap();
        assert_eq!(batch.tests.len(), 3);
        assert!(batch.contract.is_none());
    }

    #[test]
    fn test_decode_generation_too_few_is_error() {
        let err = decode_generated_tests(&generation_json(2), 5).unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse { .. }));
    }

    #[test]
    fn test_decode_generation_truncates_extras() {
        let batch = decode_generated_tests(&generation_json(6), 4).unwrap();
        assert_eq!(batch.tests.len(), 4);
    }

    #[test]
    fn test_decode_generation_rejects_missing_criteria() {
        let json = serde_json::json!({
            "tests": [{
                "input": "x",
                "evaluation_criteria": [],
                "rationale": "r",
                "category": "c"
            }]
        })
        .to_string();
        assert!(decode_generated_tests(&json, 1).is_err());
    }

    #[test]
    fn test_decode_generation_not_coerced_to_empty() {
        // Prose with no JSON must surface as an error, never Ok(empty).
        assert!(decode_generated_tests("I couldn't generate tests.", 3).is_err());
    }

    #[test]
    fn test_decode_generation_team_contract() {
        let json = serde_json::json!({
            "tests": [{
                "input": "x",
                "evaluation_criteria": [{"criterion": "ok"}],
                "rationale": "r",
                "category": "c"
            }],
            "contract": {"members": 2}
        })
        .to_string();
        let batch = decode_generated_tests(&json, 1).unwrap();
        assert_eq!(batch.contract.unwrap()["members"], 2);
    }

    #[test]
    fn test_decode_evaluation_clamps_scores() {
        let json = serde_json::json!({
            "criteria": [
                {"criterion": "a", "met": true, "score": 1.7, "evidence": "e", "reasoning": "r"}
            ],
            "confidence": 2.0,
            "reasoning": "overall"
        })
        .to_string();
        let evaluation = decode_evaluation(&json).unwrap();
        assert_eq!(evaluation.criteria[0].score, 1.0);
        assert_eq!(evaluation.confidence, Some(1.0));
    }

    #[test]
    fn test_decode_evaluation_missing_met_reads_failed() {
        let json = serde_json::json!({
            "criteria": [{"criterion": "a", "score": 0.4}]
        })
        .to_string();
        let evaluation = decode_evaluation(&json).unwrap();
        assert!(!evaluation.criteria[0].met);
    }

    #[test]
    fn test_decode_evaluation_empty_criteria_is_error() {
        let json = serde_json::json!({"criteria": []}).to_string();
        assert!(decode_evaluation(&json).is_err());
    }

    #[test]
    fn test_decode_evaluation_fenced() {
        let json = "```json\n{\"criteria\": [{\"criterion\": \"a\", \"met\": true, \"score\": 1.0}]}\n```";
        let evaluation = decode_evaluation(json).unwrap();
        assert!(evaluation.criteria[0].met);
    }

    #[test]
    fn test_decode_contract_analysis() {
        let json = r#"{"summary": "A research agent", "capabilities": ["search"], "risks": []}"#;
        let analysis = decode_contract_analysis(json).unwrap();
        assert_eq!(analysis.capabilities, vec!["search"]);
    }
}
