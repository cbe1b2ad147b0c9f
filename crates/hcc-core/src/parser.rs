//! Condition parsing from raw model responses.
//!
//! The extraction prompt asks for one condition per line. Models still add
//! status annotations (`Hypertension - Stable`) and code prefixes
//! (`E11.9: Diabetes`), so each line is cut down to the bare condition name.

use crate::types::CandidateCondition;

/// Parse a model response into candidate conditions.
///
/// For each non-blank line: cut at the first hyphen, then at the first colon,
/// trim, and keep the result if it contains a letter. Order follows the
/// response; duplicates are kept.
pub fn parse_conditions(response: &str) -> Vec<CandidateCondition> {
    response
        .lines()
        .enumerate()
        .filter_map(|(line, raw)| {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return None;
            }
            let text = clean_line(trimmed);
            has_alphabetic(text).then(|| CandidateCondition::new(text, line))
        })
        .collect()
}

/// Strip the status annotation and code prefix from a single line.
fn clean_line(line: &str) -> &str {
    let before_hyphen = line.split('-').next().unwrap_or_default();
    let before_colon = before_hyphen.split(':').next().unwrap_or_default();
    before_colon.trim()
}

pub(crate) fn has_alphabetic(text: &str) -> bool {
    text.chars().any(char::is_alphabetic)
}
