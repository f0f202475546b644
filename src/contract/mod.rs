//! Extracted agent contracts and team structures.
//!
//! These are the inbound artifacts from the discovery/analysis
//! collaborators: a structured extraction of an agent's role, goal,
//! tools, and capabilities, or a team's member/task/workflow summary.
//! They are required inputs for test generation; absence is a hard
//! precondition failure, never a default-fill.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Entity type
// ---------------------------------------------------------------------------

/// Which kind of evaluated entity a test or dimension applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Agent,
    Team,
    Flow,
}

impl EntityType {
    /// Lowercase label used in prompts, documents, and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Agent => "agent",
            EntityType::Team => "team",
            EntityType::Flow => "flow",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Extracted agent contract
// ---------------------------------------------------------------------------

/// Structured extraction of a single agent's declared behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedContract {
    /// The agent's role.
    pub role: String,
    /// The agent's goal.
    pub goal: String,
    /// Optional backstory text.
    #[serde(default)]
    pub backstory: Option<String>,
    /// Names of tools available to the agent.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Declared capabilities beyond tools.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Extractor-specific extras, carried opaquely.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ExtractedContract {
    /// Render the contract as an LLM context block.
    pub fn context_block(&self) -> String {
        let mut block = format!("Agent role: {}\nAgent goal: {}\n", self.role, self.goal);
        if let Some(backstory) = &self.backstory {
            block.push_str(&format!("Backstory: {}\n", backstory));
        }
        if !self.tools.is_empty() {
            block.push_str(&format!("Tools: {}\n", self.tools.join(", ")));
        }
        if !self.capabilities.is_empty() {
            block.push_str(&format!("Capabilities: {}\n", self.capabilities.join(", ")));
        }
        block
    }
}

// ---------------------------------------------------------------------------
// Team structure
// ---------------------------------------------------------------------------

/// One member agent inside a team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub role: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Structured extraction of a team: member agents, tasks, and workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamStructure {
    /// Team name.
    pub name: String,
    /// Member agents.
    #[serde(default)]
    pub members: Vec<TeamMember>,
    /// Task summaries.
    #[serde(default)]
    pub tasks: Vec<String>,
    /// Workflow/process description.
    #[serde(default)]
    pub workflow: Option<String>,
    /// Team-level contract, refreshed by generation calls. The
    /// generator returns refreshed contracts; callers apply them with
    /// [`apply_refreshed_contract`] and persist the structure themselves.
    #[serde(default)]
    pub contract: Option<Value>,
    /// When the contract was last refreshed.
    #[serde(default)]
    pub contract_updated_at: Option<DateTime<Utc>>,
}

impl TeamStructure {
    /// Render the team structure as an LLM context block.
    pub fn context_block(&self) -> String {
        let mut block = format!("Team: {}\n", self.name);
        for member in &self.members {
            block.push_str(&format!("- Member role: {}", member.role));
            if !member.goal.is_empty() {
                block.push_str(&format!(" (goal: {})", member.goal));
            }
            if !member.tools.is_empty() {
                block.push_str(&format!(" [tools: {}]", member.tools.join(", ")));
            }
            block.push('\n');
        }
        if !self.tasks.is_empty() {
            block.push_str("Tasks:\n");
            for task in &self.tasks {
                block.push_str(&format!("- {}\n", task));
            }
        }
        if let Some(workflow) = &self.workflow {
            block.push_str(&format!("Workflow: {}\n", workflow));
        }
        if let Some(contract) = &self.contract {
            block.push_str(&format!(
                "Current team contract: {}\n",
                serde_json::to_string(contract).unwrap_or_default()
            ));
        }
        block
    }
}

/// Apply a refreshed team contract returned by a generation call.
///
/// Generation never mutates the structure itself; callers opt in by
/// invoking this and persisting the result.
pub fn apply_refreshed_contract(structure: &mut TeamStructure, contract: Value) {
    structure.contract = Some(contract);
    structure.contract_updated_at = Some(Utc::now());
}
