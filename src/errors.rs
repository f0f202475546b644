//! Error types for the evaluation core.
//!
//! The taxonomy separates precondition failures (raised before any LLM
//! call, never retried) from LLM call failures (surfaced as rejected
//! futures, retried only inside the transport) and from locally-recovered
//! data problems (logged and fallen back, never propagated).

use thiserror::Error;

use crate::contract::EntityType;

/// Errors from LLM calls: transport failures, API-level rejections, and
/// structurally invalid responses.
///
/// The queue manager records these per task but never retries them;
/// retry with backoff lives inside the transport, bounded by its
/// configured `max_retries`.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network or client-level failure from the HTTP transport.
    #[error("LLM transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-retryable API error (4xx other than 429).
    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limited and retries exhausted.
    #[error("rate limited by LLM API (429) after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Server errors (5xx) after retries exhausted.
    #[error("LLM API server error ({status}) after {attempts} attempts")]
    ServerError { status: u16, attempts: u32 },

    /// The LLM returned JSON that does not conform to the requested
    /// shape. Never coerced into empty results.
    #[error("malformed LLM response: {message}")]
    MalformedResponse { message: String },

    /// No API key available from the constructor or the environment.
    #[error("LLM API key not set; pass api_key or set the provider's API key environment variable")]
    MissingApiKey,

    /// A provider-level precondition was violated before any call was
    /// issued (e.g. missing requirement text for the entity type).
    #[error("{message}")]
    Precondition { message: String },

    /// The queue task's result channel closed before completion. Only
    /// reachable if the queue manager is dropped with work in flight.
    #[error("LLM task dropped before completion")]
    Dropped,
}

impl LlmError {
    /// Build a malformed-response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Build a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }
}

/// Errors from test generation. Precondition variants are raised
/// synchronously before any LLM call and name the missing field.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Agent generation without an extracted contract.
    #[error("test generation for agent '{entity}' requires an extracted contract; pass GenerationOptions::contract")]
    MissingContract { entity: String },

    /// Team generation without a team structure.
    #[error("test generation for team '{entity}' requires a team structure; pass GenerationOptions::structure")]
    MissingStructure { entity: String },

    /// The dimension has no requirement prompt for the entity type.
    #[error("dimension '{dimension}' has no {entity_type} requirements prompt; populate prompts.{prompt_field} before generating {entity_type} tests")]
    MissingRequirements {
        dimension: String,
        entity_type: EntityType,
        prompt_field: &'static str,
    },

    /// Passthrough from the LLM layer.
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Internal errors from the dimension store. The public load API
/// recovers from these (warn + fallback); only `save` surfaces them.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dimension store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dimension YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors reading or writing the persisted test-specification document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("test spec document I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("test spec document JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
