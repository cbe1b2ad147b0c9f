//! Scripted provider shared by the runtime's unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};

/// One scripted reaction to a `complete` call.
pub enum Step {
    Reply(String),
    Fail(ProviderError),
    /// Sleep before replying, to exercise timeouts.
    Stall(Duration, String),
}

/// Provider that replays a script and records every request.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply with the same text on every call.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            fallback: Some(reply.into()),
            ..Self::new(Vec::new())
        }
    }

    pub fn replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Step::Reply(r.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Messages sent on the given call.
    pub fn request(&self, index: usize) -> Vec<ChatMessage> {
        self.calls.lock()[index].clone()
    }

    fn response(content: String) -> CompletionResponse {
        CompletionResponse {
            usage: TokenUsage {
                prompt_tokens: 40,
                completion_tokens: (content.len() / 4) as u32,
            },
            content,
            model: "scripted".to_string(),
            stop_reason: Some("STOP".to_string()),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.lock().push(messages);
        let step = self.steps.lock().pop_front();

        match step {
            Some(Step::Reply(content)) => Ok(Self::response(content)),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Stall(delay, content)) => {
                tokio::time::sleep(delay).await;
                Ok(Self::response(content))
            }
            None => match &self.fallback {
                Some(content) => Ok(Self::response(content.clone())),
                None => Err(ProviderError::HttpError("script exhausted".to_string())),
            },
        }
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Provider that replies with the note it was sent, optionally after a delay.
#[derive(Default)]
pub struct EchoProvider {
    delays: Vec<(String, Duration)>,
}

impl EchoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay the reply for this note.
    pub fn delay(mut self, note: &str, delay: Duration) -> Self {
        self.delays.push((note.to_string(), delay));
        self
    }
}

#[async_trait]
impl LlmProvider for EchoProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let note = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if let Some((_, delay)) = self.delays.iter().find(|(n, _)| *n == note) {
            tokio::time::sleep(*delay).await;
        }
        Ok(ScriptedProvider::response(note))
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "echo"
    }
}
