//! Extraction orchestrator.
//!
//! Drives the bounded retry loop around the model call:
//! - INIT: empty notes short-circuit with no model call
//! - EXTRACTING: append instruction and note to history, call the model
//! - VALIDATING: parse and validate the reply, replace the condition list
//! - RETRY_DECISION: loop while the list is empty and attempts remain
//! - DONE: return the last validated list
//!
//! Attempts run strictly one after another. Any failure inside an attempt
//! (transport, timeout, malformed reply) is absorbed as "zero conditions"
//! and still consumes the attempt.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use hcc_core::{parse_conditions, validate_all};

use crate::config::ExtractionConfig;
use crate::prompts::attempt_messages;
use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError};
use crate::state::{AttemptRecord, ExtractionState};
use crate::usage::LlmUsage;
use crate::RuntimeError;

/// Failure of a single attempt. Never escapes the orchestrator.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}

/// Result of one `extract` call with attempt details.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    /// Final validated condition names, in reply order
    pub conditions: Vec<String>,

    /// Model calls made (0 for blank input)
    pub attempts: u32,

    pub records: Vec<AttemptRecord>,

    pub usage: LlmUsage,

    pub completed_at: DateTime<Utc>,
}

impl ExtractionReport {
    fn empty() -> Self {
        Self {
            conditions: Vec::new(),
            attempts: 0,
            records: Vec::new(),
            usage: LlmUsage::default(),
            completed_at: Utc::now(),
        }
    }
}

/// Extracts condition names from clinical notes via an LLM.
///
/// Stateless between requests; one instance can serve concurrent callers.
pub struct ConditionExtractor {
    provider: Arc<dyn LlmProvider>,
    config: ExtractionConfig,
    completion: CompletionConfig,
}

impl ConditionExtractor {
    /// Create an extractor. Invalid settings are rejected here.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: ExtractionConfig,
        completion: CompletionConfig,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;
        Ok(Self {
            provider,
            config,
            completion,
        })
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Model named in the completion settings.
    pub fn model(&self) -> &str {
        &self.completion.model
    }

    /// Extract condition names from a note.
    pub async fn extract(&self, text: &str) -> Vec<String> {
        self.extract_with_report(text).await.conditions
    }

    /// Extract condition names and report what each attempt did.
    pub async fn extract_with_report(&self, text: &str) -> ExtractionReport {
        if text.trim().is_empty() {
            tracing::debug!("Blank note, skipping extraction");
            return ExtractionReport::empty();
        }

        let mut state = ExtractionState::new(self.config.max_attempts);
        let mut usage = LlmUsage::default();

        loop {
            let messages = state.begin_attempt(self.config.history_mode, attempt_messages(text));
            let attempt = state.attempts() + 1;

            match self.call_model(messages).await {
                Ok(response) => {
                    usage.add(&response.usage);
                    let conditions = validate_all(parse_conditions(&response.content));
                    tracing::debug!(
                        attempt,
                        conditions = conditions.len(),
                        "Extraction attempt completed"
                    );
                    state.complete_attempt(response.content, conditions);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        provider = self.provider.name(),
                        error = %e,
                        "Extraction attempt failed"
                    );
                    usage.record_failure();
                    state.fail_attempt(e.to_string());
                }
            }

            if !state.should_retry() {
                break;
            }
            tracing::debug!(attempt, "No conditions extracted, retrying");
        }

        let attempts = state.attempts();
        let (conditions, records) = state.finish();
        if conditions.is_empty() {
            tracing::info!(attempts, "Extraction finished with no conditions");
        }

        ExtractionReport {
            conditions,
            attempts,
            records,
            usage,
            completed_at: Utc::now(),
        }
    }

    /// One model call bounded by the attempt timeout.
    async fn call_model(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<CompletionResponse, ExtractionError> {
        let timeout = self.config.attempt_timeout;
        match tokio::time::timeout(timeout, self.provider.complete(messages, &self.completion)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ExtractionError::Timeout(timeout)),
        }
    }
}

impl std::fmt::Debug for ConditionExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionExtractor")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}
