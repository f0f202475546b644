//! Prompt builders for generation and evaluation calls.
//!
//! Every builder returns a system/user message pair with explicit
//! output-shape instructions, so responses can be strictly decoded.
//! Strictness values are injected verbatim together with their
//! interpretive band, shifting the judge's notion of "met" with the
//! configured rigor.

use serde_json::Value;

use super::transport::ChatMessage;
use crate::contract::EntityType;
use crate::dimensions::DimensionDefinition;
use crate::evaluation::EvaluationCriterion;

// ---------------------------------------------------------------------------
// Strictness bands
// ---------------------------------------------------------------------------

/// Interpretive band for a 0-100 strictness value.
pub fn strictness_band(strictness: u8) -> &'static str {
    match strictness {
        0..=40 => "very lenient: accept any plausible attempt at the criterion",
        41..=60 => "lenient: accept minor gaps when the substance is there",
        61..=80 => "balanced: require the criterion to be clearly satisfied",
        81..=90 => "strict: reject on any meaningful shortfall",
        _ => "zero-tolerance: the criterion must be satisfied completely and unambiguously",
    }
}

// ---------------------------------------------------------------------------
// Test generation
// ---------------------------------------------------------------------------

/// Build the single generation prompt for one (dimension, entity) pair.
///
/// Combines the requirement text, the serialized contract/structure
/// context, the dimension's enrichment context, and any custom
/// instructions into one call that asks for exactly `count` tests.
pub fn generation_messages(
    dimension: &DimensionDefinition,
    requirements: &str,
    entity_type: EntityType,
    entity_context: &str,
    count: usize,
) -> Vec<ChatMessage> {
    let system = format!(
        "You design evaluation test cases for AI {}s. \
         Respond with a single JSON object and nothing else.",
        entity_type
    );

    let mut user = format!(
        "Generate exactly {count} test cases for the '{name}' dimension.\n\n\
         ## Dimension\n{description}\n\n## Requirements\n{requirements}\n",
        count = count,
        name = dimension.name,
        description = dimension.description,
        requirements = requirements,
    );

    if !dimension.context.is_empty() {
        user.push_str("\n## Why this dimension matters\n");
        if !dimension.context.why_it_matters.is_empty() {
            user.push_str(&dimension.context.why_it_matters);
            user.push('\n');
        }
        if !dimension.context.when_to_prioritize.is_empty() {
            user.push_str(&dimension.context.when_to_prioritize);
            user.push('\n');
        }
    }

    user.push_str(&format!(
        "\n## {} under test\n{}\n",
        capitalize(entity_type.as_str()),
        entity_context
    ));

    if let Some(custom) = &dimension.prompts.custom_instructions {
        user.push_str(&format!("\n## Additional instructions\n{}\n", custom));
    }
    if let Some(domain) = &dimension.prompts.domain_context {
        user.push_str(&format!("\n## Domain context\n{}\n", domain));
    }

    user.push_str(
        "\n## Output format\n\
         Return a JSON object:\n\
         {\n\
           \"tests\": [\n\
             {\n\
               \"input\": <the input to send to the entity, any JSON shape>,\n\
               \"expected\": <optional expected output or null>,\n\
               \"evaluation_criteria\": [\n\
                 {\"criterion\": \"<pass/fail statement>\", \"evaluation_strictness\": <0-100 or null>, \"special_instructions\": <string or null>}\n\
               ],\n\
               \"rationale\": \"<why this test matters>\",\n\
               \"category\": \"<short category label>\",\n\
               \"priority\": <integer or null>,\n\
               \"ui_description\": <one-line summary or null>,\n\
               \"confidence\": <0.0-1.0 or null>\n\
             }\n\
           ]",
    );

    if entity_type == EntityType::Team {
        user.push_str(
            ",\n  \"contract\": <refreshed team contract as a JSON object, or null if unchanged>",
        );
    }

    user.push_str("\n}\nEvery test must have at least one evaluation criterion.\n");

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn criteria_section(
    criteria: &[EvaluationCriterion],
    dimension_default_strictness: Option<u8>,
) -> String {
    let mut section = String::from("## Criteria\n");
    for (i, criterion) in criteria.iter().enumerate() {
        let strictness = crate::evaluation::resolve_strictness(
            criterion.evaluation_strictness,
            dimension_default_strictness,
        );
        section.push_str(&format!(
            "{}. {}\n   Strictness: {}/100 ({})\n",
            i + 1,
            criterion.criterion,
            strictness,
            strictness_band(strictness)
        ));
        if let Some(instructions) = &criterion.special_instructions {
            section.push_str(&format!("   Special instructions: {}\n", instructions));
        }
    }
    section
}

fn evaluation_output_format(include_cross_run: bool) -> &'static str {
    if include_cross_run {
        "## Output format\n\
         Return a JSON object:\n\
         {\n\
           \"criteria\": [\n\
             {\"criterion\": \"<criterion text>\", \"met\": <bool>, \"score\": <0.0-1.0>, \"evidence\": \"<quoted or paraphrased support from the outputs>\", \"reasoning\": \"<why>\"}\n\
           ],\n\
           \"cross_run\": {\"consistent\": <bool>, \"score\": <0.0-1.0 or null>, \"reasoning\": \"<cross-run agreement analysis>\"},\n\
           \"issues\": [\"<problem in the outputs>\"],\n\
           \"confidence\": <0.0-1.0>,\n\
           \"reasoning\": \"<overall assessment>\"\n\
         }\n\
         Address every listed criterion exactly once, in order.\n"
    } else {
        "## Output format\n\
         Return a JSON object:\n\
         {\n\
           \"criteria\": [\n\
             {\"criterion\": \"<criterion text>\", \"met\": <bool>, \"score\": <0.0-1.0>, \"evidence\": \"<quoted or paraphrased support from the output>\", \"reasoning\": \"<why>\"}\n\
           ],\n\
           \"issues\": [\"<problem in the output>\"],\n\
           \"confidence\": <0.0-1.0>,\n\
           \"reasoning\": \"<overall assessment>\"\n\
         }\n\
         Address every listed criterion exactly once, in order.\n"
    }
}

/// Build the single-run evaluation prompt: each criterion judged
/// independently with its own strictness band.
pub fn evaluation_messages(
    dimension_name: &str,
    evaluation_instructions: Option<&str>,
    entity_context: Option<&str>,
    input: &Value,
    output: &Value,
    criteria: &[EvaluationCriterion],
    dimension_default_strictness: Option<u8>,
) -> Vec<ChatMessage> {
    let system = "You judge AI agent outputs against explicit criteria. \
                  Assess each criterion independently. \
                  Respond with a single JSON object and nothing else."
        .to_string();

    let mut user = format!("Evaluate this output for the '{}' dimension.\n\n", dimension_name);
    if let Some(instructions) = evaluation_instructions {
        user.push_str(&format!("## Evaluation instructions\n{}\n\n", instructions));
    }
    if let Some(context) = entity_context {
        user.push_str(&format!("## Entity under test\n{}\n", context));
    }
    user.push_str(&format!(
        "## Input\n{}\n\n## Output\n{}\n\n",
        pretty(input),
        pretty(output)
    ));
    user.push_str(&criteria_section(criteria, dimension_default_strictness));
    user.push('\n');
    user.push_str(evaluation_output_format(false));

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Build the multi-run group evaluation prompt.
///
/// Issued once per run group: judges the criteria over the full set of
/// outputs AND cross-run consistency, so "each run individually
/// plausible" is never conflated with "runs agree with each other".
pub fn multi_run_evaluation_messages(
    dimension_name: &str,
    evaluation_instructions: Option<&str>,
    entity_context: Option<&str>,
    input: &Value,
    outputs: &[Value],
    criteria: &[EvaluationCriterion],
    dimension_default_strictness: Option<u8>,
) -> Vec<ChatMessage> {
    let system = "You judge AI agent outputs against explicit criteria, including \
                  consistency across repeated runs of the same test. \
                  Respond with a single JSON object and nothing else."
        .to_string();

    let mut user = format!(
        "Evaluate this group of {} outputs produced by repeated runs of one test \
         for the '{}' dimension.\n\n",
        outputs.len(),
        dimension_name
    );
    if let Some(instructions) = evaluation_instructions {
        user.push_str(&format!("## Evaluation instructions\n{}\n\n", instructions));
    }
    if let Some(context) = entity_context {
        user.push_str(&format!("## Entity under test\n{}\n", context));
    }
    user.push_str(&format!("## Input\n{}\n\n", pretty(input)));
    for (i, output) in outputs.iter().enumerate() {
        user.push_str(&format!("## Output from run {}\n{}\n\n", i, pretty(output)));
    }
    user.push_str(&criteria_section(criteria, dimension_default_strictness));
    user.push_str(
        "\nJudge each criterion against the run group as a whole, then assess \
         whether the runs are consistent with each other: runs that are each \
         individually plausible can still contradict one another.\n\n",
    );
    user.push_str(evaluation_output_format(true));

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

// ---------------------------------------------------------------------------
// Contract analysis / schema inference
// ---------------------------------------------------------------------------

/// Build the contract-analysis prompt.
pub fn contract_analysis_messages(entity_context: &str) -> Vec<ChatMessage> {
    let system = "You analyze AI agent contracts. \
                  Respond with a single JSON object and nothing else."
        .to_string();
    let user = format!(
        "Analyze this contract and summarize what the entity does, its effective \
         capabilities, and the risks in how it is specified.\n\n{}\n\n\
         ## Output format\n\
         {{\"summary\": \"<one paragraph>\", \"capabilities\": [\"<capability>\"], \"risks\": [\"<risk>\"]}}\n",
        entity_context
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Build the schema-inference prompt over sample inputs.
pub fn schema_inference_messages(samples: &[Value]) -> Vec<ChatMessage> {
    let system = "You infer JSON schemas from sample payloads. \
                  Respond with a single JSON object and nothing else."
        .to_string();
    let mut user = String::from("Infer a JSON schema covering all of these samples.\n\n");
    for (i, sample) in samples.iter().enumerate() {
        user.push_str(&format!("## Sample {}\n{}\n\n", i + 1, pretty(sample)));
    }
    user.push_str(
        "## Output format\n\
         {\"schema\": <JSON Schema object>, \"confidence\": <0.0-1.0 or null>}\n",
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::builtin;

    #[test]
    fn test_strictness_bands() {
        assert!(strictness_band(0).contains("very lenient"));
        assert!(strictness_band(40).contains("very lenient"));
        assert!(strictness_band(41).contains("lenient"));
        assert!(strictness_band(85).contains("strict"));
        assert!(strictness_band(91).contains("zero-tolerance"));
        assert!(strictness_band(100).contains("zero-tolerance"));
    }

    #[test]
    fn test_generation_messages_include_context() {
        let dimension = builtin::builtin("consistency").unwrap();
        let requirements = dimension
            .requirements_for(EntityType::Agent)
            .unwrap()
            .to_string();
        let messages = generation_messages(
            &dimension,
            &requirements,
            EntityType::Agent,
            "Agent role: Researcher\n",
            4,
        );
        assert_eq!(messages.len(), 2);
        let user = &messages[1].content;
        assert!(user.contains("exactly 4 test cases"));
        assert!(user.contains("Agent role: Researcher"));
        assert!(user.contains(&dimension.context.why_it_matters));
        // Agent generation does not ask for a refreshed contract.
        assert!(!user.contains("\"contract\""));
    }

    #[test]
    fn test_team_generation_asks_for_contract() {
        let dimension = builtin::builtin("consistency").unwrap();
        let requirements = dimension
            .requirements_for(EntityType::Team)
            .unwrap()
            .to_string();
        let messages =
            generation_messages(&dimension, &requirements, EntityType::Team, "Team: x\n", 2);
        assert!(messages[1].content.contains("refreshed team contract"));
    }

    #[test]
    fn test_evaluation_messages_inject_strictness_verbatim() {
        let criteria = vec![
            EvaluationCriterion {
                criterion: "Answer names the capital".to_string(),
                evaluation_strictness: Some(95),
                special_instructions: Some("Ignore formatting".to_string()),
            },
            EvaluationCriterion::new("Answer is polite"),
        ];
        let messages = evaluation_messages(
            "accuracy",
            Some("Verify claims."),
            None,
            &serde_json::json!({"q": "capital of France?"}),
            &serde_json::json!("Paris"),
            &criteria,
            Some(70),
        );
        let user = &messages[1].content;
        assert!(user.contains("Strictness: 95/100"));
        assert!(user.contains("zero-tolerance"));
        // Second criterion falls back to the dimension default.
        assert!(user.contains("Strictness: 70/100"));
        assert!(user.contains("Special instructions: Ignore formatting"));
    }

    #[test]
    fn test_multi_run_messages_cover_all_outputs() {
        let outputs = vec![
            serde_json::json!("answer one"),
            serde_json::json!("answer two"),
            serde_json::json!("answer three"),
        ];
        let messages = multi_run_evaluation_messages(
            "consistency",
            None,
            None,
            &serde_json::json!("q"),
            &outputs,
            &[EvaluationCriterion::new("Runs agree")],
            None,
        );
        let user = &messages[1].content;
        assert!(user.contains("group of 3 outputs"));
        assert!(user.contains("Output from run 0"));
        assert!(user.contains("Output from run 2"));
        assert!(user.contains("cross_run"));
    }
}
