//! Abstract chat-completion transport.
//!
//! The evaluation core treats "the LLM" as an abstract capability: send
//! a prompt, get text back. Concrete HTTP/auth details live in the
//! provider implementations; everything above this trait is
//! vendor-agnostic.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::LlmError;

// ---------------------------------------------------------------------------
// Messages and call parameters
// ---------------------------------------------------------------------------

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Per-call parameters passed through to the transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Response token cap.
    pub max_tokens: Option<u32>,
    /// Transport timeout, passed through opaquely from configuration.
    pub timeout_ms: Option<u64>,
    /// Ask the model for a JSON-object response where supported.
    pub json_response: bool,
}

impl CompletionParams {
    /// Parameters for structured-JSON calls with an opaque timeout.
    pub fn structured(timeout_ms: Option<u64>) -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            timeout_ms,
            json_response: true,
        }
    }
}

// ---------------------------------------------------------------------------
// ChatCompletion trait
// ---------------------------------------------------------------------------

/// Abstract transport for chat-completion calls.
///
/// Implementations own retry policy (count, backoff) for transient
/// failures; callers above this trait never retry.
#[async_trait]
pub trait ChatCompletion: Send + Sync + fmt::Debug {
    /// Model identifier (e.g. "gpt-4o").
    fn model(&self) -> &str;

    /// Provider name.
    fn provider(&self) -> &str {
        "openai"
    }

    /// Issue one completion call and return the response text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// Token usage
// ---------------------------------------------------------------------------

/// Cumulative token usage across all calls made by a transport
/// instance. Counters only ever increase.
#[derive(Debug, Default)]
pub struct TokenUsage {
    prompt_tokens: AtomicI64,
    completion_tokens: AtomicI64,
    successful_requests: AtomicI64,
}

/// Point-in-time snapshot of a [`TokenUsage`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub successful_requests: i64,
}

impl TokenUsage {
    /// Record usage from one successful call.
    pub fn record(&self, prompt_tokens: i64, completion_tokens: i64) {
        self.prompt_tokens.fetch_add(prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(completion_tokens, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let prompt = self.prompt_tokens.load(Ordering::Relaxed);
        let completion = self.completion_tokens.load(Ordering::Relaxed);
        UsageSnapshot {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON salvage
// ---------------------------------------------------------------------------

static CODE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid regex"));

/// Extract a JSON value from an LLM response.
///
/// Tries a direct parse first, then strips a markdown code fence, then
/// falls back to the outermost brace-delimited slice. Anything else is
/// a malformed response.
pub fn extract_json(response: &str) -> Result<Value, LlmError> {
    let trimmed = response.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return Ok(value);
        }
    }

    if let Some(captures) = CODE_FENCE_RE.captures(trimmed) {
        if let Some(inner) = captures.get(1) {
            if let Ok(value) = serde_json::from_str(inner.as_str()) {
                return Ok(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(LlmError::malformed(format!(
        "no JSON object found in response ({} chars)",
        response.len()
    )))
}
