//! Shared test doubles.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::LlmError;
use crate::llm::transport::{ChatCompletion, ChatMessage, CompletionParams};

/// A transport that replays scripted responses in order and records
/// every request it receives.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of completion calls issued so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The messages from the most recent call.
    pub fn last_request(&self) -> Option<Vec<ChatMessage>> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedTransport {
    fn model(&self) -> &str {
        "gpt-4o-scripted"
    }

    fn provider(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _params: &CompletionParams,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(messages.to_vec());
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| LlmError::malformed("scripted transport exhausted"))
    }
}
