//! Indicator substrings that mark a condition as relevant on sight.

use std::fs;
use std::path::Path;

use super::VocabularyError;
use crate::normalize::normalize;

/// A set of normalized indicator substrings.
///
/// Indicators are short, code-like tokens expected verbatim inside a relevant
/// condition's normalized text. Order of first appearance is kept so matching
/// reports are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorSet {
    indicators: Vec<String>,
}

impl IndicatorSet {
    /// Build from raw indicator strings.
    ///
    /// Each indicator is normalized; blanks and duplicates are dropped. An
    /// explicitly supplied source that yields nothing is an error.
    pub fn from_lines<I, S>(lines: I) -> Result<Self, VocabularyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut indicators: Vec<String> = Vec::new();
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let normalized = normalize(line);
            if !normalized.is_empty() && !indicators.contains(&normalized) {
                indicators.push(normalized);
            }
        }

        if indicators.is_empty() {
            return Err(VocabularyError::NoIndicators);
        }

        Ok(Self { indicators })
    }

    /// Load indicators from a text file, one per line.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, VocabularyError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VocabularyError::NotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let set = Self::from_lines(contents.lines())?;
        tracing::info!(path = %path.display(), indicators = set.len(), "Loaded indicators");
        Ok(set)
    }

    /// The first indicator contained in `normalized`, if any.
    pub fn find_in(&self, normalized: &str) -> Option<&str> {
        self.indicators
            .iter()
            .find(|indicator| normalized.contains(indicator.as_str()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.indicators.iter().map(String::as_str)
    }
}
