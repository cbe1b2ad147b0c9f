//! # hcc-core
//!
//! Deterministic half of HCC condition extraction.
//!
//! This crate turns raw model output into validated condition names and
//! classifies them against a reference vocabulary:
//! - Parse a response into candidate conditions ([`parse_conditions`])
//! - Keep well-formed candidates ([`validate_all`])
//! - Normalize for comparison ([`normalize`])
//! - Partition into HCC-relevant and non-relevant ([`RelevanceMatcher`])
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input and vocabulary always give the same result
//! 2. **No LLM calls**: The model lives in `hcc-runtime`
//! 3. **Immutable vocabulary**: Safe to share across threads without locks
//!
//! ## Example
//!
//! ```rust,ignore
//! use hcc_core::{parse_conditions, validate_all, RelevanceMatcher, Vocabulary};
//!
//! let vocabulary = Vocabulary::from_csv_path("hcc_vocabulary.csv")?;
//! let matcher = RelevanceMatcher::new(&vocabulary);
//!
//! let validated = validate_all(parse_conditions("Hypertension - Stable\nCOPD"));
//! let names: Vec<_> = validated.into_iter().map(|c| c.name).collect();
//! let result = matcher.classify(&names);
//! ```

pub mod matcher;
pub mod normalize;
pub mod parser;
pub mod types;
pub mod validator;
pub mod vocabulary;

// Re-export main types at crate root
pub use matcher::{MatchError, RelevanceMatcher};
pub use normalize::normalize;
pub use parser::parse_conditions;
pub use types::{
    CandidateCondition, Classification, ConditionMatch, MatchStrategy, MatchVerdict,
    ValidatedCondition,
};
pub use validator::{validate, validate_all};
pub use vocabulary::{IndicatorSet, Vocabulary, VocabularyEntry, VocabularyError};

/// Parse and validate a model response in one step.
///
/// Returns the validated condition names in response order.
pub fn extract_names(response: &str) -> Vec<String> {
    validate_all(parse_conditions(response))
        .into_iter()
        .map(|condition| condition.name)
        .collect()
}
