//! HCC relevance matching.
//!
//! A condition is relevant when, after normalization, it:
//! 1. contains an indicator substring, or
//! 2. is contained in, or contains, a vocabulary description, or
//! 3. shares at least [`MIN_SHARED_TOKENS`] non-stop-word tokens with one.
//!
//! Descriptions are scanned in vocabulary order and the first hit wins. The
//! scan is linear per condition; token sets are precomputed at construction.

use std::collections::HashSet;
use thiserror::Error;

use crate::normalize::normalize;
use crate::types::{Classification, ConditionMatch, MatchStrategy, MatchVerdict};
use crate::vocabulary::{IndicatorSet, Vocabulary};

/// Words ignored by the token-overlap test.
pub const STOP_WORDS: [&str; 9] = ["due", "to", "with", "without", "and", "or", "the", "a", "an"];

/// Shared tokens needed for two strings to count as similar.
pub const MIN_SHARED_TOKENS: usize = 2;

/// Errors while matching a single condition.
///
/// Never escapes [`RelevanceMatcher::classify`]; the condition is counted as
/// non-relevant instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("Condition '{0}' is empty after normalization")]
    EmptyCondition(String),
}

/// A vocabulary entry prepared for matching.
#[derive(Debug, Clone)]
struct PreparedEntry {
    code: String,
    normalized: String,
    tokens: HashSet<String>,
}

/// Classifies conditions against an immutable vocabulary.
///
/// Holds no interior mutability, so one instance can be shared behind an
/// `Arc` by any number of concurrent callers.
#[derive(Debug, Clone)]
pub struct RelevanceMatcher {
    entries: Vec<PreparedEntry>,
    indicators: IndicatorSet,
}

impl RelevanceMatcher {
    /// Create a matcher over a vocabulary, without indicators.
    pub fn new(vocabulary: &Vocabulary) -> Self {
        let entries = vocabulary
            .entries()
            .iter()
            .filter_map(|entry| {
                let normalized = normalize(&entry.description);
                if normalized.is_empty() {
                    // Descriptions made only of a code or a status word would
                    // be a substring of every condition.
                    tracing::warn!(code = %entry.code, "Skipping vocabulary entry with empty normalized description");
                    return None;
                }
                Some(PreparedEntry {
                    code: entry.code.clone(),
                    tokens: content_tokens(&normalized),
                    normalized,
                })
            })
            .collect();

        Self {
            entries,
            indicators: IndicatorSet::default(),
        }
    }

    /// Attach an indicator set.
    pub fn with_indicators(mut self, indicators: IndicatorSet) -> Self {
        self.indicators = indicators;
        self
    }

    /// Number of usable vocabulary descriptions.
    pub fn description_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of indicator substrings.
    pub fn indicator_count(&self) -> usize {
        self.indicators.len()
    }

    /// Partition condition names into relevant and non-relevant.
    ///
    /// Stable: each output list keeps the relative order of `names`.
    pub fn classify<S: AsRef<str>>(&self, names: &[S]) -> Classification {
        self.classify_detailed(names).into_iter().collect()
    }

    /// Classify each name and report how the verdict was reached.
    pub fn classify_detailed<S: AsRef<str>>(&self, names: &[S]) -> Vec<ConditionMatch> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let normalized = normalize(name);
                let verdict = match self.match_normalized(&normalized, name) {
                    Ok(Some((strategy, code))) => MatchVerdict::Relevant { strategy, code },
                    Ok(None) => MatchVerdict::NotRelevant,
                    Err(e) => {
                        tracing::warn!(condition = %name, error = %e, "Matching failed, treating as non-relevant");
                        MatchVerdict::Failed {
                            reason: e.to_string(),
                        }
                    }
                };
                ConditionMatch {
                    name: name.to_string(),
                    normalized,
                    verdict,
                }
            })
            .collect()
    }

    /// Whether a single condition is relevant.
    pub fn is_relevant(&self, name: &str) -> bool {
        matches!(self.match_normalized(&normalize(name), name), Ok(Some(_)))
    }

    fn match_normalized(
        &self,
        normalized: &str,
        original: &str,
    ) -> Result<Option<(MatchStrategy, Option<String>)>, MatchError> {
        if normalized.is_empty() {
            return Err(MatchError::EmptyCondition(original.to_string()));
        }

        if let Some(indicator) = self.indicators.find_in(normalized) {
            return Ok(Some((
                MatchStrategy::Indicator {
                    indicator: indicator.to_string(),
                },
                None,
            )));
        }

        let tokens = content_tokens(normalized);
        for entry in &self.entries {
            let strategy = if entry.normalized.contains(normalized) {
                Some(MatchStrategy::ContainedIn)
            } else if normalized.contains(entry.normalized.as_str()) {
                Some(MatchStrategy::Contains)
            } else {
                let shared = tokens.intersection(&entry.tokens).count();
                (shared >= MIN_SHARED_TOKENS).then_some(MatchStrategy::TokenOverlap { shared })
            };

            if let Some(strategy) = strategy {
                return Ok(Some((strategy, Some(entry.code.clone()))));
            }
        }

        Ok(None)
    }
}

/// Whitespace tokens of normalized text, minus stop words.
fn content_tokens(normalized: &str) -> HashSet<String> {
    normalized
        .split_whitespace()
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Whether two normalized strings share enough content tokens.
pub fn is_similar(a: &str, b: &str) -> bool {
    content_tokens(a).intersection(&content_tokens(b)).count() >= MIN_SHARED_TOKENS
}
