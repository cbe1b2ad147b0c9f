//! Core types shared by the parser, validator and matcher.

use serde::{Deserialize, Serialize};

/// A condition fragment pulled from one line of a model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCondition {
    /// Cleaned text of the fragment
    pub text: String,

    /// Zero-based line index in the source response
    pub line: usize,
}

impl CandidateCondition {
    pub fn new(text: impl Into<String>, line: usize) -> Self {
        Self {
            text: text.into(),
            line,
        }
    }
}

/// A candidate that passed the well-formedness checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedCondition {
    /// Condition name as extracted
    pub name: String,

    /// Free-text description (not used by classification)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Zero-based line index in the source response
    pub line: usize,
}

impl From<CandidateCondition> for ValidatedCondition {
    fn from(candidate: CandidateCondition) -> Self {
        Self {
            name: candidate.text,
            description: None,
            line: candidate.line,
        }
    }
}

/// Partition of condition names into HCC-relevant and non-relevant.
///
/// Disjoint and exhaustive over the classified input; each list keeps the
/// input's relative order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub relevant: Vec<String>,
    pub non_relevant: Vec<String>,
}

impl Classification {
    /// Total number of classified names.
    pub fn len(&self) -> usize {
        self.relevant.len() + self.non_relevant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<ConditionMatch> for Classification {
    fn from_iter<I: IntoIterator<Item = ConditionMatch>>(iter: I) -> Self {
        let mut classification = Classification::default();
        for result in iter {
            if result.verdict.is_relevant() {
                classification.relevant.push(result.name);
            } else {
                classification.non_relevant.push(result.name);
            }
        }
        classification
    }
}

/// Which strategy established relevance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchStrategy {
    /// An indicator substring appears in the condition
    Indicator { indicator: String },

    /// The condition appears inside a vocabulary description
    ContainedIn,

    /// A vocabulary description appears inside the condition
    Contains,

    /// Enough non-stop-word tokens are shared
    TokenOverlap { shared: usize },
}

/// Relevance verdict for a single condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum MatchVerdict {
    Relevant {
        strategy: MatchStrategy,
        /// Vocabulary code of the matching entry (absent for indicator hits)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    NotRelevant,
    /// Matching failed; the condition counts as non-relevant
    Failed { reason: String },
}

impl MatchVerdict {
    pub fn is_relevant(&self) -> bool {
        matches!(self, MatchVerdict::Relevant { .. })
    }
}

/// Detailed classification of one condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionMatch {
    /// Condition as given to the matcher
    pub name: String,

    /// Normalized form used for comparison
    pub normalized: String,

    #[serde(flatten)]
    pub verdict: MatchVerdict,
}
