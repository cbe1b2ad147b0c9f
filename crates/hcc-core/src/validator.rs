//! Well-formedness checks for parsed conditions.

use crate::parser::has_alphabetic;
use crate::types::{CandidateCondition, ValidatedCondition};

/// Minimum condition length in characters.
pub const MIN_CONDITION_CHARS: usize = 3;

/// Maximum condition length in characters.
pub const MAX_CONDITION_CHARS: usize = 100;

/// Check whether a candidate is a well-formed condition name.
///
/// Valid iff non-empty, 3 to 100 characters, and containing a letter.
pub fn validate(candidate: &CandidateCondition) -> bool {
    is_valid_name(&candidate.text)
}

/// Name-level check behind [`validate`].
pub fn is_valid_name(name: &str) -> bool {
    let chars = name.chars().count();
    !name.is_empty()
        && (MIN_CONDITION_CHARS..=MAX_CONDITION_CHARS).contains(&chars)
        && has_alphabetic(name)
}

/// Keep the valid candidates, preserving order.
pub fn validate_all(candidates: Vec<CandidateCondition>) -> Vec<ValidatedCondition> {
    candidates
        .into_iter()
        .filter(|candidate| {
            let valid = validate(candidate);
            if !valid {
                tracing::debug!(
                    condition = %candidate.text,
                    line = candidate.line,
                    "Rejected malformed condition"
                );
            }
            valid
        })
        .map(ValidatedCondition::from)
        .collect()
}
