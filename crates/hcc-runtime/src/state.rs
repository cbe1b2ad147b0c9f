//! Per-request extraction state.
//!
//! One [`ExtractionState`] lives for the duration of a single `extract` call
//! and is never shared.

use serde::Serialize;

use hcc_core::ValidatedCondition;

use crate::config::HistoryMode;
use crate::providers::ChatMessage;

/// Phases of the extraction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPhase {
    Init,
    Extracting,
    Validating,
    RetryDecision,
    Done,
}

/// What one attempt produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The model replied; `conditions` may be empty
    Extracted { conditions: Vec<String> },

    /// The call or its reply failed; counts as zero conditions
    Failed { error: String },
}

impl AttemptOutcome {
    pub fn condition_count(&self) -> usize {
        match self {
            AttemptOutcome::Extracted { conditions } => conditions.len(),
            AttemptOutcome::Failed { .. } => 0,
        }
    }
}

/// Record of a single model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,

    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Mutable state threaded through the extraction loop.
#[derive(Debug)]
pub struct ExtractionState {
    phase: ExtractionPhase,
    history: Vec<ChatMessage>,
    conditions: Vec<ValidatedCondition>,
    attempts: u32,
    max_attempts: u32,
    records: Vec<AttemptRecord>,
}

impl ExtractionState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            phase: ExtractionPhase::Init,
            history: Vec::new(),
            conditions: Vec::new(),
            attempts: 0,
            max_attempts,
            records: Vec::new(),
        }
    }

    pub fn phase(&self) -> ExtractionPhase {
        self.phase
    }

    pub fn conditions(&self) -> &[ValidatedCondition] {
        &self.conditions
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    /// Enter EXTRACTING: extend the history with this attempt's messages and
    /// return the full sequence to send.
    pub fn begin_attempt(&mut self, mode: HistoryMode, messages: [ChatMessage; 2]) -> Vec<ChatMessage> {
        debug_assert!(self.attempts < self.max_attempts);
        if mode == HistoryMode::ResetPerAttempt {
            self.history.clear();
        }
        self.history.extend(messages);
        self.phase = ExtractionPhase::Extracting;
        self.history.clone()
    }

    /// The model replied; record the reply and this attempt's validated list.
    pub fn complete_attempt(&mut self, reply: String, conditions: Vec<ValidatedCondition>) {
        self.phase = ExtractionPhase::Validating;
        self.history.push(ChatMessage::assistant(reply));
        self.finish_attempt(AttemptOutcome::Extracted {
            conditions: conditions.iter().map(|c| c.name.clone()).collect(),
        });
        self.conditions = conditions;
    }

    /// The call failed; the attempt still counts.
    pub fn fail_attempt(&mut self, error: String) {
        self.phase = ExtractionPhase::Validating;
        self.conditions.clear();
        self.finish_attempt(AttemptOutcome::Failed { error });
    }

    fn finish_attempt(&mut self, outcome: AttemptOutcome) {
        self.attempts += 1;
        self.records.push(AttemptRecord {
            attempt: self.attempts,
            outcome,
        });
        self.phase = ExtractionPhase::RetryDecision;
    }

    /// RETRY_DECISION: another attempt iff nothing was found and budget remains.
    pub fn should_retry(&self) -> bool {
        self.conditions.is_empty() && self.attempts < self.max_attempts
    }

    /// Move to DONE and hand back the final names and attempt records.
    pub fn finish(&mut self) -> (Vec<String>, Vec<AttemptRecord>) {
        self.phase = ExtractionPhase::Done;
        let names = std::mem::take(&mut self.conditions)
            .into_iter()
            .map(|c| c.name)
            .collect();
        (names, std::mem::take(&mut self.records))
    }
}
