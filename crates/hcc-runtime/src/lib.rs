//! # hcc-runtime
//!
//! LLM-backed condition extraction for HCC classification.
//!
//! `hcc-core` is deterministic and never calls a model. This crate adds the
//! part that does:
//! - A provider abstraction with a Gemini implementation (feature `gemini`)
//! - The bounded retry loop that turns a clinical note into condition names
//! - A pipeline that feeds those names to the core matcher
//!
//! ## Example
//!
//! ```rust,ignore
//! use hcc_runtime::{ConditionPipeline, PipelineConfig, ProviderRegistry};
//!
//! let config = PipelineConfig::from_path("hcc.yaml")?;
//! let pipeline = ConditionPipeline::from_config(&config, &ProviderRegistry::with_defaults())?;
//!
//! let result = pipeline.run(note_text).await;
//! println!("relevant: {:?}", result.relevant);
//! ```

use thiserror::Error;

use hcc_core::VocabularyError;

pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod state;
pub mod usage;

#[cfg(test)]
mod testing;

pub use cache::{CacheKey, ExtractionCache};
pub use config::{
    CacheConfig, ExtractionConfig, HistoryMode, PipelineConfig, VocabularyConfig,
    DEFAULT_MAX_ATTEMPTS,
};
pub use orchestrator::{ConditionExtractor, ExtractionError, ExtractionReport};
pub use pipeline::{load_matcher, ConditionPipeline, PipelineReport};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, LlmProvider, ProviderError, ProviderFactory,
    ProviderRegistry,
};
pub use state::{AttemptOutcome, AttemptRecord, ExtractionPhase};
pub use usage::{LlmUsage, UsageTracker};

/// Errors surfaced to callers of the runtime.
///
/// Failures inside an extraction attempt never show up here; they are
/// absorbed by the orchestrator.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Vocabulary error: {0}")]
    Vocabulary(#[from] VocabularyError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}
