//! Dimension definition types.
//!
//! A dimension is a named, YAML-configurable test category bundling the
//! prompt templates and configuration used to both generate tests and
//! evaluate results for that category. Definitions are data, not code:
//! there is no runtime plugin loading.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::EntityType;

// ---------------------------------------------------------------------------
// Category / complexity
// ---------------------------------------------------------------------------

/// Dimension grouping used by reporting surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionCategory {
    Core,
    Quality,
    Enterprise,
}

impl Default for DimensionCategory {
    fn default() -> Self {
        Self::Core
    }
}

/// How demanding the dimension's tests are to author and judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionComplexity {
    Basic,
    Moderate,
    Advanced,
}

impl Default for DimensionComplexity {
    fn default() -> Self {
        Self::Basic
    }
}

// ---------------------------------------------------------------------------
// Definition blocks
// ---------------------------------------------------------------------------

/// Enrichment context injected into generation prompts. Present only in
/// "enhanced" (v2.0) definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimensionContext {
    #[serde(default)]
    pub why_it_matters: String,
    #[serde(default)]
    pub when_to_prioritize: String,
}

impl DimensionContext {
    pub fn is_empty(&self) -> bool {
        self.why_it_matters.is_empty() && self.when_to_prioritize.is_empty()
    }
}

/// Per-dimension generation and evaluation knobs.
///
/// Every field is optional: an absent knob means the dimension has no
/// opinion, and resolution falls through to caller options or the
/// hardcoded defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimensionConfiguration {
    #[serde(default)]
    pub test_count: Option<u32>,
    #[serde(default)]
    pub runs_per_input: Option<u32>,
    #[serde(default)]
    pub variations_per_input: Option<u32>,
    /// Judge strictness 0-100 for criteria without their own override.
    #[serde(default)]
    pub default_strictness: Option<u8>,
    /// Minimum percentage of criteria that must be met (0-100).
    #[serde(default)]
    pub passing_criteria_percentage: Option<f64>,
    /// Dimension-specific knobs, carried opaquely.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Prompt templates for the dimension. A definition must populate the
/// requirements prompt matching the entity type it is used with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimensionPrompts {
    #[serde(default)]
    pub agent_requirements: Option<String>,
    #[serde(default)]
    pub team_requirements: Option<String>,
    #[serde(default)]
    pub flow_requirements: Option<String>,
    #[serde(default)]
    pub evaluation_instructions: Option<String>,
    #[serde(default)]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub domain_context: Option<String>,
}

/// Versioning and classification metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionMetadata {
    #[serde(default)]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub category: DimensionCategory,
    #[serde(default)]
    pub complexity: DimensionComplexity,
}

impl Default for DimensionMetadata {
    fn default() -> Self {
        Self {
            version: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            category: DimensionCategory::default(),
            complexity: DimensionComplexity::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// DimensionDefinition
// ---------------------------------------------------------------------------

/// Outcome of validating a definition. Validation never fails hard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionValidation {
    pub valid: bool,
    pub missing: Vec<String>,
}

/// A complete dimension definition, loaded from YAML or synthesized
/// from the built-in registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionDefinition {
    /// Unique name; doubles as the YAML file stem.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Tie-break ordering across dimensions.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub context: DimensionContext,
    #[serde(default)]
    pub configuration: DimensionConfiguration,
    #[serde(default)]
    pub prompts: DimensionPrompts,
    #[serde(default)]
    pub metadata: DimensionMetadata,
}

impl DimensionDefinition {
    /// Requirement prompt text for the given entity type, if populated.
    pub fn requirements_for(&self, entity_type: EntityType) -> Option<&str> {
        let text = match entity_type {
            EntityType::Agent => self.prompts.agent_requirements.as_deref(),
            EntityType::Team => self.prompts.team_requirements.as_deref(),
            EntityType::Flow => self.prompts.flow_requirements.as_deref(),
        };
        text.filter(|t| !t.trim().is_empty())
    }

    /// Field path of the requirements prompt for an entity type, used
    /// in precondition error messages.
    pub fn requirements_field(entity_type: EntityType) -> &'static str {
        match entity_type {
            EntityType::Agent => "agent_requirements",
            EntityType::Team => "team_requirements",
            EntityType::Flow => "flow_requirements",
        }
    }

    /// Validate structural completeness. Returns the list of missing
    /// fields instead of failing, so partially-edited YAML files can be
    /// reported and fallen back from.
    pub fn validate(&self) -> DimensionValidation {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name".to_string());
        }
        if self.description.trim().is_empty() {
            missing.push("description".to_string());
        }
        if self.requirements_for(EntityType::Agent).is_none()
            && self.requirements_for(EntityType::Team).is_none()
        {
            missing.push("prompts.agent_requirements or prompts.team_requirements".to_string());
        }
        if self.metadata.version.trim().is_empty() {
            missing.push("metadata.version".to_string());
        }
        DimensionValidation {
            valid: missing.is_empty(),
            missing,
        }
    }

    /// An "enhanced" (v2.0) definition additionally carries a non-empty
    /// context block.
    pub fn is_enhanced(&self) -> bool {
        self.validate().valid && !self.context.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> DimensionDefinition {
        DimensionDefinition {
            name: "consistency".to_string(),
            description: "Output consistency across runs".to_string(),
            priority: 0,
            context: DimensionContext::default(),
            configuration: DimensionConfiguration::default(),
            prompts: DimensionPrompts {
                agent_requirements: Some("Test the agent for consistent outputs.".to_string()),
                ..Default::default()
            },
            metadata: DimensionMetadata {
                version: "1.0".to_string(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_validate_complete() {
        let validation = minimal().validate();
        assert!(validation.valid);
        assert!(validation.missing.is_empty());
    }

    #[test]
    fn test_validate_missing_fields() {
        let mut def = minimal();
        def.description = String::new();
        def.prompts.agent_requirements = None;
        let validation = def.validate();
        assert!(!validation.valid);
        assert_eq!(validation.missing.len(), 2);
    }

    #[test]
    fn test_team_requirements_satisfy_validation() {
        let mut def = minimal();
        def.prompts.agent_requirements = None;
        def.prompts.team_requirements = Some("Test the team.".to_string());
        assert!(def.validate().valid);
        assert!(def.requirements_for(EntityType::Agent).is_none());
        assert!(def.requirements_for(EntityType::Team).is_some());
    }

    #[test]
    fn test_whitespace_requirements_are_missing() {
        let mut def = minimal();
        def.prompts.agent_requirements = Some("   ".to_string());
        assert!(def.requirements_for(EntityType::Agent).is_none());
    }

    #[test]
    fn test_enhanced_requires_context() {
        let mut def = minimal();
        assert!(!def.is_enhanced());
        def.context.why_it_matters = "Inconsistent agents erode trust.".to_string();
        assert!(def.is_enhanced());
    }

    #[test]
    fn test_partial_yaml_tolerated() {
        let yaml = "name: custom\ndescription: A custom dimension\n";
        let def: DimensionDefinition = serde_yaml::from_str(yaml).unwrap();
        let validation = def.validate();
        assert!(!validation.valid);
        assert!(validation
            .missing
            .iter()
            .any(|m| m.contains("agent_requirements")));
    }

    #[test]
    fn test_configuration_extra_knobs_roundtrip() {
        let yaml = r#"
name: safety
description: Safety checks
configuration:
  test_count: 5
  refusal_probe_depth: 2
prompts:
  agent_requirements: Probe refusals.
metadata:
  version: "2.0"
"#;
        let def: DimensionDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.configuration.test_count, Some(5));
        assert!(def.configuration.runs_per_input.is_none());
        assert_eq!(
            def.configuration.extra.get("refusal_probe_depth"),
            Some(&serde_json::json!(2))
        );
    }
}
