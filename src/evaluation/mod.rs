//! Criterion-level evaluation types and aggregation.
//!
//! A criterion is one independently-judged pass/fail statement about a
//! test's output, with its own strictness and evidence. Aggregation to
//! a test-level verdict compares the fraction of met criteria against
//! the applicable passing-criteria percentage, resolved through a
//! three-layer precedence chain.

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_PASSING_PERCENTAGE, DEFAULT_STRICTNESS};

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// One evaluation criterion attached to a test specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationCriterion {
    /// The pass/fail statement to judge.
    pub criterion: String,
    /// Per-criterion strictness override (0-100).
    #[serde(default)]
    pub evaluation_strictness: Option<u8>,
    /// Extra judge guidance for this criterion.
    #[serde(default)]
    pub special_instructions: Option<String>,
}

impl EvaluationCriterion {
    pub fn new(criterion: impl Into<String>) -> Self {
        Self {
            criterion: criterion.into(),
            evaluation_strictness: None,
            special_instructions: None,
        }
    }
}

/// The judge's verdict on a single criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionAssessment {
    /// The criterion text as judged.
    pub criterion: String,
    /// Whether the criterion was met.
    pub met: bool,
    /// Partial-credit score in [0, 1].
    pub score: f64,
    /// Quoted or paraphrased support from the output.
    pub evidence: String,
    /// The judge's reasoning.
    pub reasoning: String,
}

impl CriterionAssessment {
    /// Assessment recorded for a criterion the judge failed to address:
    /// failed, never dropped from the denominator.
    pub fn unaddressed(criterion: impl Into<String>) -> Self {
        Self {
            criterion: criterion.into(),
            met: false,
            score: 0.0,
            evidence: String::new(),
            reasoning: "Criterion was not addressed in the evaluation response".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cross-run assessment
// ---------------------------------------------------------------------------

/// Group-level consistency verdict for multi-run evaluation. Judged
/// once per run group, not once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossRunAssessment {
    /// Whether the runs are consistent with each other.
    pub consistent: bool,
    /// Optional consistency score in [0, 1].
    #[serde(default)]
    pub score: Option<f64>,
    /// The judge's reasoning about cross-run agreement.
    #[serde(default)]
    pub reasoning: String,
}

// ---------------------------------------------------------------------------
// Test evaluation result
// ---------------------------------------------------------------------------

/// The full evaluation verdict for one test (or one multi-run group).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEvaluationResult {
    /// Mean of per-criterion scores, in [0, 1]. Not `pct_met / 100`:
    /// partial credit within a met criterion is meaningful.
    pub score: f64,
    /// Whether `pct_met >= passing threshold`.
    pub passed: bool,
    /// Overall reasoning from the judge.
    pub reasoning: String,
    /// Issues the judge flagged in the output.
    pub issues: Vec<String>,
    /// Judge confidence in [0, 1].
    pub confidence: f64,
    /// Per-criterion breakdown, covering every requested criterion.
    pub criteria: Vec<CriterionAssessment>,
    /// Present for multi-run group evaluations.
    #[serde(default)]
    pub cross_run: Option<CrossRunAssessment>,
}

// ---------------------------------------------------------------------------
// Precedence resolution
// ---------------------------------------------------------------------------

/// Effective strictness for a criterion: criterion override, then the
/// dimension default, then the hardcoded fallback.
pub fn resolve_strictness(criterion_override: Option<u8>, dimension_default: Option<u8>) -> u8 {
    criterion_override
        .or(dimension_default)
        .unwrap_or(DEFAULT_STRICTNESS)
        .min(100)
}

/// Effective passing threshold: test-level override, then dimension
/// configuration, then the hardcoded fallback (all criteria must pass).
pub fn resolve_passing_threshold(
    test_override: Option<f64>,
    dimension_config: Option<f64>,
) -> f64 {
    test_override
        .or(dimension_config)
        .unwrap_or(DEFAULT_PASSING_PERCENTAGE)
        .clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Aggregated numbers derived from a set of criterion assessments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Percentage of criteria with `met == true`, in [0, 100].
    pub pct_met: f64,
    /// Mean of per-criterion scores, in [0, 1].
    pub score: f64,
    /// Exact `pct_met >= threshold` comparison, no rounding.
    pub passed: bool,
}

/// Aggregate criterion assessments against a passing threshold.
///
/// The denominator is the full assessment list, including unaddressed
/// criteria recorded as failed. An empty list never passes.
pub fn aggregate(assessments: &[CriterionAssessment], threshold: f64) -> Aggregate {
    if assessments.is_empty() {
        return Aggregate {
            pct_met: 0.0,
            score: 0.0,
            passed: false,
        };
    }

    let total = assessments.len() as f64;
    let met = assessments.iter().filter(|a| a.met).count() as f64;
    let pct_met = met / total * 100.0;
    let score = assessments.iter().map(|a| a.score).sum::<f64>() / total;

    Aggregate {
        pct_met,
        score,
        passed: pct_met >= threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(met: bool, score: f64) -> CriterionAssessment {
        CriterionAssessment {
            criterion: "c".to_string(),
            met,
            score,
            evidence: String::new(),
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_threshold_aggregation() {
        let assessments = vec![
            assessment(true, 0.9),
            assessment(false, 0.2),
            assessment(true, 1.0),
        ];
        let agg = aggregate(&assessments, 60.0);
        assert!(agg.passed);
        assert!((agg.score - 0.70).abs() < 1e-9);
        assert!((agg.pct_met - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_boundary_is_exact() {
        let assessments = vec![
            assessment(true, 0.9),
            assessment(false, 0.2),
            assessment(true, 1.0),
        ];
        // pct_met = 66.67 < 67: must fail, no rounding up.
        let agg = aggregate(&assessments, 67.0);
        assert!(!agg.passed);
    }

    #[test]
    fn test_exact_threshold_passes() {
        let assessments = vec![assessment(true, 1.0), assessment(false, 0.0)];
        let agg = aggregate(&assessments, 50.0);
        assert!(agg.passed);
        assert_eq!(agg.pct_met, 50.0);
    }

    #[test]
    fn test_empty_assessments_fail() {
        let agg = aggregate(&[], 0.0);
        assert!(!agg.passed);
        assert_eq!(agg.score, 0.0);
    }

    #[test]
    fn test_unaddressed_counts_in_denominator() {
        let assessments = vec![
            assessment(true, 1.0),
            CriterionAssessment::unaddressed("never judged"),
        ];
        let agg = aggregate(&assessments, 100.0);
        assert!(!agg.passed);
        assert_eq!(agg.pct_met, 50.0);
        assert_eq!(agg.score, 0.5);
    }

    #[test]
    fn test_strictness_precedence() {
        // Criterion override wins over everything.
        assert_eq!(resolve_strictness(Some(40), Some(70)), 40);
        // Dimension default wins over the fallback.
        assert_eq!(resolve_strictness(None, Some(70)), 70);
        // Hardcoded fallback.
        assert_eq!(resolve_strictness(None, None), 85);
        // Out-of-range values are clamped.
        assert_eq!(resolve_strictness(Some(200), None), 100);
    }

    #[test]
    fn test_passing_threshold_precedence() {
        assert_eq!(resolve_passing_threshold(Some(60.0), Some(80.0)), 60.0);
        assert_eq!(resolve_passing_threshold(None, Some(80.0)), 80.0);
        assert_eq!(resolve_passing_threshold(None, None), 100.0);
        assert_eq!(resolve_passing_threshold(Some(150.0), None), 100.0);
    }
}
