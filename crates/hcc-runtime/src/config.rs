//! Pipeline configuration.
//!
//! Loaded from YAML or JSON. Every field has a default, so an empty file is a
//! valid configuration as long as the credential and vocabulary are present.
//!
//! ```yaml
//! provider: gemini
//! provider_config:
//!   base_url: https://generativelanguage.googleapis.com/v1beta
//! completion:
//!   model: gemini-2.0-flash
//!   temperature: 0.1
//!   timeout: 30s
//! extraction:
//!   max_attempts: 3
//!   attempt_timeout: 45s
//!   history_mode: accumulate
//! vocabulary:
//!   path: data/hcc_vocabulary.csv
//!   indicators_path: data/hcc_indicators.txt
//! cache:
//!   max_entries: 1000
//!   ttl: 1h
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::providers::CompletionConfig;
use crate::RuntimeError;

/// Default bound on extraction attempts per request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How conversation history carries over between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Each retry resends the full history, including earlier replies
    #[default]
    Accumulate,

    /// Each attempt starts from an empty history
    ResetPerAttempt,
}

/// Settings for the extraction retry loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum model calls per request (at least 1)
    pub max_attempts: u32,

    /// Deadline for a single model call, including transport
    #[serde(with = "duration_str")]
    pub attempt_timeout: Duration,

    pub history_mode: HistoryMode,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: Duration::from_secs(30),
            history_mode: HistoryMode::default(),
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.max_attempts == 0 {
            return Err(RuntimeError::Configuration(
                "extraction.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(RuntimeError::Configuration(
                "extraction.attempt_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the reference vocabulary lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// CSV with `code` and `description` columns
    pub path: PathBuf,

    /// Optional indicator list, one per line
    pub indicators_path: Option<PathBuf>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("hcc_vocabulary.csv"),
            indicators_path: None,
        }
    }
}

/// Extraction result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: u64,

    #[serde(with = "duration_str")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Top-level configuration for [`ConditionPipeline`](crate::ConditionPipeline).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Provider type registered in the [`ProviderRegistry`](crate::providers::ProviderRegistry)
    pub provider: String,

    /// Provider-specific settings (`api_key`, `base_url`)
    pub provider_config: JsonValue,

    pub completion: CompletionConfig,

    pub extraction: ExtractionConfig,

    pub vocabulary: VocabularyConfig,

    /// Disabled when absent
    pub cache: Option<CacheConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            provider_config: JsonValue::Object(Default::default()),
            completion: CompletionConfig::default(),
            extraction: ExtractionConfig::default(),
            vocabulary: VocabularyConfig::default(),
            cache: None,
        }
    }
}

impl PipelineConfig {
    /// Parse from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, RuntimeError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; `.json` is parsed as JSON, anything else as YAML.
    ///
    /// A relative vocabulary path is resolved against the file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let mut config = if is_json {
            Self::from_json(&contents)?
        } else {
            Self::from_yaml(&contents)?
        };

        if let Some(base) = path.parent() {
            config.vocabulary.path = resolve(base, &config.vocabulary.path);
            config.vocabulary.indicators_path = config
                .vocabulary
                .indicators_path
                .as_deref()
                .map(|p| resolve(base, p));
        }

        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.provider.trim().is_empty() {
            return Err(RuntimeError::Configuration(
                "provider must not be empty".to_string(),
            ));
        }
        if !self.provider_config.is_object() {
            return Err(RuntimeError::Configuration(
                "provider_config must be a mapping".to_string(),
            ));
        }
        if self.completion.timeout.is_zero() {
            return Err(RuntimeError::Configuration(
                "completion.timeout must be greater than zero".to_string(),
            ));
        }
        self.extraction.validate()
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Serde adapter for human-readable durations (`"30s"`, `"1h 30m"`).
///
/// Bare integers are read as seconds.
pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => humantime::parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }
}
