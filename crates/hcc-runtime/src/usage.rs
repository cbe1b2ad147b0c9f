//! Token accounting for model calls.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::providers::TokenUsage;

/// Accumulated LLM usage for one request, or for a pipeline's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Total tokens used
    pub total_tokens: u32,

    /// Prompt/input tokens
    pub prompt_tokens: u32,

    /// Completion/output tokens
    pub completion_tokens: u32,

    /// Successful model calls
    pub llm_calls: u32,

    /// Calls that failed or timed out
    pub failed_calls: u32,

    /// Requests answered from the result cache
    pub cache_hits: u32,
}

impl LlmUsage {
    /// Add token usage from a provider response.
    pub fn add(&mut self, usage: &TokenUsage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.llm_calls += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed_calls += 1;
    }

    /// Fold another usage record into this one.
    pub fn merge(&mut self, other: &LlmUsage) {
        self.total_tokens += other.total_tokens;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.llm_calls += other.llm_calls;
        self.failed_calls += other.failed_calls;
        self.cache_hits += other.cache_hits;
    }
}

/// Shared usage aggregate, updated from concurrent requests.
#[derive(Debug, Default)]
pub struct UsageTracker {
    usage: RwLock<LlmUsage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one request's usage into the aggregate.
    pub fn record(&self, usage: &LlmUsage) {
        self.usage.write().merge(usage);
    }

    pub fn record_cache_hit(&self) {
        self.usage.write().cache_hits += 1;
    }

    /// Snapshot of the current aggregate.
    pub fn get_usage(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    pub fn reset(&self) {
        *self.usage.write() = LlmUsage::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_usage_add() {
        let mut usage = LlmUsage::default();
        usage.add(&TokenUsage {
            prompt_tokens: 120,
            completion_tokens: 30,
        });
        usage.record_failure();

        assert_eq!(usage.total_tokens, 150);
        assert_eq!(usage.llm_calls, 1);
        assert_eq!(usage.failed_calls, 1);
    }

    #[test]
    fn test_tracker_aggregates_across_threads() {
        let tracker = Arc::new(UsageTracker::new());
        let mut per_request = LlmUsage::default();
        per_request.add(&TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
        });

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let usage = per_request.clone();
                std::thread::spawn(move || tracker.record(&usage))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        tracker.record_cache_hit();

        let total = tracker.get_usage();
        assert_eq!(total.llm_calls, 4);
        assert_eq!(total.total_tokens, 60);
        assert_eq!(total.cache_hits, 1);

        tracker.reset();
        assert_eq!(tracker.get_usage(), LlmUsage::default());
    }
}
