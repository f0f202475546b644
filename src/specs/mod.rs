//! Test specification types and the persisted document format.
//!
//! Generated tests round-trip through a JSON document keyed by entity
//! name, then dimension name. That document is the only durable
//! artifact between generation and execution; the loader re-hydrates
//! it into executable runtime specs.

pub mod loader;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::EntityType;
use crate::errors::DocumentError;
use crate::evaluation::EvaluationCriterion;

pub use loader::{
    load_agent_tests, load_flow_tests, load_team_tests, validate_test_specs, LoadMetadata,
    LoadOutcome, SpecValidation,
};

// ---------------------------------------------------------------------------
// Multi-run configuration
// ---------------------------------------------------------------------------

/// Whether repeated runs reuse the same input or vary it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    /// Repeat the same input: a consistency probe.
    Identical,
    /// Generate input variants: a robustness probe.
    Variations,
}

/// How a multi-run group's results are rolled up by the reporting
/// layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationStrategy {
    /// Compare runs directly against each other.
    Compare,
    /// Aggregate the score distribution.
    Statistical,
    /// Fold runs in order.
    Sequential,
}

/// Whether a group's runs execute concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Parallel,
    Sequential,
}

/// Multi-run configuration attached to a parent test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiRunConfig {
    pub run_count: u32,
    pub run_type: RunType,
    pub aggregation_strategy: AggregationStrategy,
    pub execution_mode: ExecutionMode,
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Input complexity classification; used for UI/triage only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputComplexity {
    Simple,
    Moderate,
    Complex,
    Advanced,
}

/// Provenance metadata stamped on every generated test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestProvenance {
    /// Model that generated the test.
    #[serde(default)]
    pub generated_by: String,
    /// Generator identifier and version.
    #[serde(default)]
    pub generator_version: String,
    /// Dimension file the test originated from.
    #[serde(default)]
    pub source_dimension: Option<String>,
    /// The LLM's rationale for the test.
    #[serde(default)]
    pub reasoning: Option<String>,
    /// The LLM's confidence in the test, 0-1.
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub complexity: Option<InputComplexity>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Persisted test case
// ---------------------------------------------------------------------------

/// One persisted test specification, as stored in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTestCase {
    /// Stable id assigned by the generator at creation; never
    /// regenerated. The loader skips tests whose id is missing.
    #[serde(default)]
    pub id: String,
    /// Originating dimension name.
    #[serde(default)]
    pub dimension: String,
    /// Arbitrary structured input for the entity.
    pub input: Value,
    /// Optional expected output.
    #[serde(default)]
    pub expected: Option<Value>,
    /// Ordered criteria the output is judged against.
    #[serde(default)]
    pub evaluation_criteria: Vec<EvaluationCriterion>,
    /// Why this test matters.
    #[serde(default)]
    pub rationale: String,
    /// Short category label from the generator.
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub ui_description: Option<String>,
    /// Multi-run configuration; absent means the dimension default
    /// decides at load time.
    #[serde(rename = "multiRun", default)]
    pub multi_run: Option<MultiRunConfig>,
    #[serde(default)]
    pub metadata: TestProvenance,
}

// ---------------------------------------------------------------------------
// Persisted document
// ---------------------------------------------------------------------------

/// The per-dimension entry inside the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimensionTests {
    #[serde(default)]
    pub tests: Vec<GeneratedTestCase>,
    /// Model that produced this batch.
    #[serde(rename = "generatedBy", default)]
    pub generated_by: String,
    /// When the batch was generated.
    #[serde(default)]
    pub generated: Option<DateTime<Utc>>,
}

/// The persisted test-specification document, keyed by entity name,
/// then dimension name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSpecDocument {
    #[serde(flatten)]
    pub entities: BTreeMap<String, BTreeMap<String, DimensionTests>>,
}

impl TestSpecDocument {
    /// Read a document from disk.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the document to disk, pretty-printed for hand inspection.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Insert a batch of generated tests for one (entity, dimension).
    pub fn insert(
        &mut self,
        entity: impl Into<String>,
        dimension: impl Into<String>,
        tests: Vec<GeneratedTestCase>,
        generated_by: impl Into<String>,
    ) {
        self.entities.entry(entity.into()).or_default().insert(
            dimension.into(),
            DimensionTests {
                tests,
                generated_by: generated_by.into(),
                generated: Some(Utc::now()),
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Runtime test spec
// ---------------------------------------------------------------------------

/// An executable runtime test spec, post multi-run expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSpec {
    pub id: String,
    /// Parent test id for multi-run children.
    #[serde(default)]
    pub parent_test_id: Option<String>,
    /// Dense run index in `[0, runCount)` for multi-run children.
    #[serde(default)]
    pub run_index: Option<u32>,
    /// True only on the retained parent of a multi-run group.
    #[serde(default)]
    pub is_multi_run: bool,
    /// The parent is aggregation bookkeeping only; never executed.
    #[serde(default)]
    pub is_parent_test: bool,
    pub entity_name: String,
    pub entity_type: EntityType,
    pub dimension: String,
    pub input: Value,
    #[serde(default)]
    pub expected: Option<Value>,
    pub evaluation_criteria: Vec<EvaluationCriterion>,
    #[serde(default)]
    pub priority: Option<i32>,
    /// Present on parent specs only.
    #[serde(default)]
    pub multi_run: Option<MultiRunConfig>,
    #[serde(default)]
    pub metadata: TestProvenance,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_case(id: &str) -> GeneratedTestCase {
        GeneratedTestCase {
            id: id.to_string(),
            dimension: "accuracy".to_string(),
            input: serde_json::json!({"q": "2+2?"}),
            expected: Some(serde_json::json!("4")),
            evaluation_criteria: vec![EvaluationCriterion::new("answers 4")],
            rationale: "basic arithmetic".to_string(),
            category: "math".to_string(),
            priority: None,
            ui_description: None,
            multi_run: None,
            metadata: TestProvenance::default(),
        }
    }

    #[test]
    fn test_document_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval-spec.json");

        let mut doc = TestSpecDocument::default();
        doc.insert("researcher", "accuracy", vec![test_case("t1")], "gpt-4o");
        doc.save_to(&path).unwrap();

        let reloaded = TestSpecDocument::load_from(&path).unwrap();
        let entry = &reloaded.entities["researcher"]["accuracy"];
        assert_eq!(entry.generated_by, "gpt-4o");
        assert_eq!(entry.tests[0].id, "t1");
        assert_eq!(entry.tests[0].input["q"], "2+2?");
    }

    #[test]
    fn test_document_flatten_shape() {
        // Entity names are top-level keys, not nested under a field.
        let mut doc = TestSpecDocument::default();
        doc.insert("researcher", "accuracy", vec![], "gpt-4o");
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("researcher").is_some());
        assert!(json["researcher"]["accuracy"].get("generatedBy").is_some());
    }

    #[test]
    fn test_multi_run_serde_camel_case() {
        let config = MultiRunConfig {
            run_count: 3,
            run_type: RunType::Identical,
            aggregation_strategy: AggregationStrategy::Compare,
            execution_mode: ExecutionMode::Parallel,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["runCount"], 3);
        assert_eq!(json["runType"], "identical");
        assert_eq!(json["aggregationStrategy"], "compare");
    }

    #[test]
    fn test_missing_id_deserializes_empty() {
        let json = serde_json::json!({"input": "x"});
        let test: GeneratedTestCase = serde_json::from_value(json).unwrap();
        assert!(test.id.is_empty());
        assert!(test.evaluation_criteria.is_empty());
    }
}
