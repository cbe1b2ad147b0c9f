//! Canonical form for condition strings.
//!
//! Clinical notes and model output decorate condition names with diagnosis
//! codes (`E11.9:`) and trailing status words (`- Stable`). Both are noise when
//! comparing a condition against vocabulary descriptions, so every comparison
//! in the matcher goes through [`normalize`] first.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Diagnosis code prefix: one uppercase letter, digits, '.', digits, ':'.
    ///
    /// Case-sensitive on purpose: normalized text is lower-case, so a second
    /// pass can never find a code the first pass left behind.
    pub static ref DIAGNOSIS_CODE_PATTERN: Regex = Regex::new(
        r"[A-Z]\d+\.\d+:"
    ).unwrap();

    /// Clinical status word and everything after it.
    ///
    /// Case-insensitive and not anchored to a separator, so a name that opens
    /// with a status word ("Stable angina") normalizes to nothing.
    pub static ref STATUS_SUFFIX_PATTERN: Regex = Regex::new(
        r"(?i)\s*-?\s*\b(stable|improving|unchanged|worsening)\b.*$"
    ).unwrap();
}

/// Status words recognised by [`STATUS_SUFFIX_PATTERN`].
pub const STATUS_WORDS: [&str; 4] = ["Stable", "Improving", "Unchanged", "Worsening"];

/// Normalize a condition string for comparison.
///
/// Removes diagnosis codes, strips a trailing clinical status, lower-cases and
/// collapses whitespace. `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let without_codes = DIAGNOSIS_CODE_PATTERN.replace_all(text, "");
    let without_status = STATUS_SUFFIX_PATTERN.replace(&without_codes, "");
    collapse_whitespace(&without_status.to_lowercase())
}

/// Collapse runs of whitespace to a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether the text contains a diagnosis code annotation.
pub fn contains_diagnosis_code(text: &str) -> bool {
    DIAGNOSIS_CODE_PATTERN.is_match(text)
}
