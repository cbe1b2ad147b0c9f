//! Reference vocabulary of HCC-relevant diagnosis descriptions.
//!
//! The vocabulary is loaded once at startup and never mutated afterwards.
//! Wrap it in an `Arc` (or hand it to a [`RelevanceMatcher`](crate::RelevanceMatcher))
//! to share it across concurrent requests.

mod indicators;
mod loader;

pub use indicators::IndicatorSet;
pub use loader::{Vocabulary, VocabularyEntry, VocabularyError};
