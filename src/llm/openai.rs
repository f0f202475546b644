//! OpenAI-compatible chat-completion transport.
//!
//! Direct integration with the Chat Completions API via `reqwest`:
//! retry with exponential backoff on 429/5xx, JSON response format for
//! structured calls, per-call timeout passthrough, and cumulative token
//! usage tracking. Any endpoint speaking the same wire shape works
//! through the `base_url` override.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::transport::{ChatCompletion, ChatMessage, CompletionParams, TokenUsage, UsageSnapshot};
use crate::errors::LlmError;

/// Default request timeout when the configuration supplies none.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Initial backoff delay; doubles per retry.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// OpenAI-compatible completion transport.
#[derive(Debug)]
pub struct OpenAiCompletion {
    model: String,
    api_key: Option<String>,
    base_url: Option<String>,
    /// Sampling temperature applied when the call params carry none.
    pub temperature: Option<f64>,
    /// Maximum retries on 429/5xx/transport failure.
    pub max_retries: u32,
    usage: TokenUsage,
    client: reqwest::Client,
}

impl OpenAiCompletion {
    /// Create a transport for `model`. The API key falls back to the
    /// `OPENAI_API_KEY` environment variable.
    pub fn new(
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        let api_key = api_key.or_else(|| std::env::var("OPENAI_API_KEY").ok());
        Self {
            model: model.into(),
            api_key,
            base_url,
            temperature: None,
            max_retries: 2,
            usage: TokenUsage::default(),
            client: reqwest::Client::new(),
        }
    }

    /// The API base URL.
    pub fn api_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
    }

    /// Cumulative token usage across all calls on this transport.
    pub fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    /// Build the Chat Completions request body.
    fn build_request_body(&self, messages: &[ChatMessage], params: &CompletionParams) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        if let Some(temp) = params.temperature.or(self.temperature) {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max_tokens) = params.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if params.json_response {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        body
    }

    /// Extract `choices[0].message.content` and record token usage.
    fn parse_response(&self, response: &Value) -> Result<String, LlmError> {
        let content = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| LlmError::malformed("no message content in completion response"))?;

        if let Some(usage) = response.get("usage") {
            let prompt = usage
                .get("prompt_tokens")
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            let completion = usage
                .get("completion_tokens")
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            self.usage.record(prompt, completion);
            log::debug!(
                "LLM token usage: model={}, prompt={}, completion={}",
                self.model,
                prompt,
                completion
            );
        }

        Ok(content.to_string())
    }
}

#[async_trait]
impl ChatCompletion for OpenAiCompletion {
    fn model(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<String, LlmError> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::MissingApiKey)?;

        let body = self.build_request_body(messages, params);
        let endpoint = format!("{}/chat/completions", self.api_base_url());
        let timeout = params
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let mut backoff = INITIAL_BACKOFF;
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                log::warn!(
                    "LLM API retry attempt {} after {:?}: {}",
                    attempt,
                    backoff,
                    last_error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_default()
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            let response = match self
                .client
                .post(&endpoint)
                .timeout(timeout)
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(LlmError::Transport(e));
                    continue;
                }
            };

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                last_error = Some(LlmError::RateLimited {
                    attempts: attempt + 1,
                });
                continue;
            }

            if status.is_server_error() {
                last_error = Some(LlmError::ServerError {
                    status: status.as_u16(),
                    attempts: attempt + 1,
                });
                continue;
            }

            let text = match response.text().await {
                Ok(t) => t,
                Err(e) => {
                    last_error = Some(LlmError::Transport(e));
                    continue;
                }
            };

            // Client errors other than 429 are not retryable.
            if status.is_client_error() {
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: text.chars().take(500).collect(),
                });
            }

            let json: Value = serde_json::from_str(&text).map_err(|e| {
                LlmError::malformed(format!("completion response is not JSON: {}", e))
            })?;

            return self.parse_response(&json);
        }

        Err(last_error.unwrap_or_else(|| LlmError::malformed("LLM call failed with no attempts")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> OpenAiCompletion {
        OpenAiCompletion::new("gpt-4o-mini", Some("sk-test".to_string()), None)
    }

    #[test]
    fn test_default_base_url() {
        assert_eq!(transport().api_base_url(), "https://api.openai.com/v1");
        let custom = OpenAiCompletion::new(
            "gpt-4o",
            Some("k".to_string()),
            Some("http://localhost:8080/v1".to_string()),
        );
        assert_eq!(custom.api_base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_request_body_structured() {
        let t = transport();
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let body = t.build_request_body(&messages, &CompletionParams::structured(None));
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_request_body_temperature_fallback() {
        let mut t = transport();
        t.temperature = Some(0.2);
        let body = t.build_request_body(&[ChatMessage::user("x")], &CompletionParams::default());
        assert_eq!(body["temperature"], 0.2);
    }

    #[test]
    fn test_parse_response_records_usage() {
        let t = transport();
        let response = serde_json::json!({
            "choices": [{"message": {"content": "{\"ok\": true}"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7}
        });
        let content = t.parse_response(&response).unwrap();
        assert_eq!(content, "{\"ok\": true}");
        let usage = t.usage();
        assert_eq!(usage.total_tokens, 19);
        assert_eq!(usage.successful_requests, 1);
    }

    #[test]
    fn test_parse_response_missing_content() {
        let t = transport();
        let response = serde_json::json!({"choices": []});
        assert!(matches!(
            t.parse_response(&response),
            Err(LlmError::MalformedResponse { .. })
        ));
    }
}
