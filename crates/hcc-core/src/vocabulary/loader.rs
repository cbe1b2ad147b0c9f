//! Vocabulary loading from CSV.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading a vocabulary.
///
/// All of these are fatal: a service without a usable vocabulary must not start.
#[derive(Error, Debug)]
pub enum VocabularyError {
    #[error("Vocabulary file not found at {0}")]
    NotFound(PathBuf),

    #[error("Failed to read vocabulary: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse vocabulary CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Vocabulary is missing required column: {0}")]
    MissingColumn(&'static str),

    #[error("Vocabulary is empty")]
    Empty,

    #[error("Vocabulary row {row} has an empty '{field}'")]
    MissingField { row: usize, field: &'static str },

    #[error("Indicator source contains no indicators")]
    NoIndicators,
}

/// Required CSV columns.
const REQUIRED_COLUMNS: [&str; 2] = ["code", "description"];

/// A single vocabulary row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    /// Short alphanumeric identifier (e.g., an HCC or ICD code)
    pub code: String,

    /// Diagnosis description
    pub description: String,
}

impl VocabularyEntry {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

/// Immutable reference vocabulary.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    entries: Vec<VocabularyEntry>,
}

impl Vocabulary {
    /// Build a vocabulary from entries.
    ///
    /// Fails if there are no entries or any entry has a blank code or
    /// description.
    pub fn from_entries(entries: Vec<VocabularyEntry>) -> Result<Self, VocabularyError> {
        if entries.is_empty() {
            return Err(VocabularyError::Empty);
        }

        for (index, entry) in entries.iter().enumerate() {
            let row = index + 1;
            if entry.code.trim().is_empty() {
                return Err(VocabularyError::MissingField { row, field: "code" });
            }
            if entry.description.trim().is_empty() {
                return Err(VocabularyError::MissingField {
                    row,
                    field: "description",
                });
            }
        }

        Ok(Self { entries })
    }

    /// Load a vocabulary from a CSV file with `code` and `description` columns.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, VocabularyError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::error!(path = %path.display(), "Vocabulary file not found");
            return Err(VocabularyError::NotFound(path.to_path_buf()));
        }

        let file = File::open(path)?;
        let vocabulary = Self::from_csv_reader(file).inspect_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to load vocabulary");
        })?;

        tracing::info!(
            path = %path.display(),
            entries = vocabulary.len(),
            "Loaded vocabulary"
        );
        Ok(vocabulary)
    }

    /// Load a vocabulary from any CSV reader.
    ///
    /// Extra columns are ignored; header names are trimmed before matching.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, VocabularyError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(VocabularyError::MissingColumn(column));
            }
        }

        let mut entries = Vec::new();
        for record in reader.deserialize::<VocabularyEntry>() {
            entries.push(record?);
        }

        Self::from_entries(entries)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed vocabulary.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in load order.
    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    /// Look up the first entry with the given code.
    pub fn get(&self, code: &str) -> Option<&VocabularyEntry> {
        self.entries.iter().find(|e| e.code == code)
    }
}
