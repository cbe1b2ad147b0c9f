//! End-to-end pipeline: note text in, relevant/non-relevant conditions out.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;

use hcc_core::{Classification, ConditionMatch, IndicatorSet, RelevanceMatcher, Vocabulary};

use crate::cache::{CacheKey, ExtractionCache};
use crate::config::{PipelineConfig, VocabularyConfig};
use crate::orchestrator::{ConditionExtractor, ExtractionReport};
use crate::providers::{ProviderError, ProviderRegistry};
use crate::usage::{LlmUsage, UsageTracker};
use crate::RuntimeError;

/// Full result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    #[serde(flatten)]
    pub classification: Classification,

    /// Per-condition verdicts, in extraction order
    pub matches: Vec<ConditionMatch>,

    pub extraction: ExtractionReport,

    /// Whether the extraction came from the result cache
    pub cached: bool,
}

/// Extraction followed by relevance classification.
///
/// The matcher is immutable and shared; the pipeline can run many notes
/// concurrently.
pub struct ConditionPipeline {
    extractor: ConditionExtractor,
    matcher: Arc<RelevanceMatcher>,
    cache: Option<ExtractionCache>,
    usage: UsageTracker,
}

impl ConditionPipeline {
    pub fn new(extractor: ConditionExtractor, matcher: Arc<RelevanceMatcher>) -> Self {
        Self {
            extractor,
            matcher,
            cache: None,
            usage: UsageTracker::new(),
        }
    }

    pub fn with_cache(mut self, cache: ExtractionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build a pipeline from configuration: load the vocabulary, create the
    /// provider, wire the cache.
    ///
    /// Missing credentials and bad settings surface as
    /// [`RuntimeError::Configuration`].
    pub fn from_config(
        config: &PipelineConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;

        let matcher = load_matcher(&config.vocabulary)?;
        let provider = registry
            .create(&config.provider, &config.provider_config)
            .map_err(|e| match e {
                ProviderError::NotConfigured(msg) => RuntimeError::Configuration(msg),
                other => RuntimeError::Provider(other),
            })?;

        tracing::info!(
            provider = provider.name(),
            model = %config.completion.model,
            max_attempts = config.extraction.max_attempts,
            cache = config.cache.is_some(),
            "Pipeline ready"
        );

        let extractor =
            ConditionExtractor::new(provider, config.extraction.clone(), config.completion.clone())?;
        let pipeline = Self::new(extractor, Arc::new(matcher));

        Ok(match &config.cache {
            Some(cache) => pipeline.with_cache(ExtractionCache::from_config(cache)),
            None => pipeline,
        })
    }

    pub fn matcher(&self) -> &RelevanceMatcher {
        &self.matcher
    }

    pub fn extractor(&self) -> &ConditionExtractor {
        &self.extractor
    }

    /// Aggregate model usage since construction.
    pub fn usage(&self) -> LlmUsage {
        self.usage.get_usage()
    }

    /// Extract and classify one note.
    pub async fn run(&self, text: &str) -> Classification {
        self.run_detailed(text).await.classification
    }

    /// Extract and classify one note, keeping attempt and match details.
    pub async fn run_detailed(&self, text: &str) -> PipelineReport {
        let key = CacheKey::new(text, self.extractor.model());

        let (extraction, cached) = match self.cached(&key).await {
            Some(conditions) => {
                self.usage.record_cache_hit();
                (cached_report(conditions), true)
            }
            None => {
                let report = self.extractor.extract_with_report(text).await;
                self.usage.record(&report.usage);
                if let Some(cache) = &self.cache {
                    cache.insert(key, report.conditions.clone()).await;
                }
                (report, false)
            }
        };

        let matches = self.matcher.classify_detailed(&extraction.conditions);
        let classification: Classification = matches.iter().cloned().collect();

        tracing::info!(
            attempts = extraction.attempts,
            relevant = classification.relevant.len(),
            non_relevant = classification.non_relevant.len(),
            cached,
            "Pipeline run complete"
        );

        PipelineReport {
            classification,
            matches,
            extraction,
            cached,
        }
    }

    /// Run several notes with at most `concurrency` in flight.
    ///
    /// Results are returned in input order.
    pub async fn run_many<S>(&self, notes: &[S], concurrency: usize) -> Vec<PipelineReport>
    where
        S: AsRef<str>,
    {
        stream::iter(notes)
            .map(|note| self.run_detailed(note.as_ref()))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn cached(&self, key: &CacheKey) -> Option<Vec<String>> {
        match &self.cache {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }
}

/// Load the vocabulary and optional indicator list into a matcher.
pub fn load_matcher(config: &VocabularyConfig) -> Result<RelevanceMatcher, RuntimeError> {
    let vocabulary = Vocabulary::from_csv_path(&config.path)?;
    let matcher = RelevanceMatcher::new(&vocabulary);

    let matcher = match &config.indicators_path {
        Some(path) => matcher.with_indicators(IndicatorSet::from_path(path)?),
        None => matcher,
    };

    tracing::info!(
        entries = vocabulary.len(),
        descriptions = matcher.description_count(),
        indicators = matcher.indicator_count(),
        "Vocabulary loaded"
    );
    Ok(matcher)
}

fn cached_report(conditions: Vec<String>) -> ExtractionReport {
    ExtractionReport {
        conditions,
        attempts: 0,
        records: Vec::new(),
        usage: LlmUsage {
            cache_hits: 1,
            ..Default::default()
        },
        completed_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::providers::{CompletionConfig, LlmProvider};
    use crate::testing::{EchoProvider, ScriptedProvider, Step};
    use hcc_core::VocabularyEntry;
    use std::time::Duration;

    fn matcher() -> Arc<RelevanceMatcher> {
        let vocabulary = Vocabulary::from_entries(vec![
            VocabularyEntry::new("HCC37", "Diabetes with chronic complications"),
            VocabularyEntry::new("HCC226", "Heart failure"),
            VocabularyEntry::new("HCC280", "Chronic obstructive pulmonary disease"),
        ])
        .unwrap();
        let indicators = IndicatorSet::from_lines(["copd"]).unwrap();
        Arc::new(RelevanceMatcher::new(&vocabulary).with_indicators(indicators))
    }

    fn pipeline(provider: Arc<ScriptedProvider>) -> ConditionPipeline {
        let extractor =
            ConditionExtractor::new(provider, ExtractionConfig::default(), CompletionConfig::default())
                .unwrap();
        ConditionPipeline::new(extractor, matcher())
    }

    #[tokio::test]
    async fn test_run_partitions_extracted_conditions() {
        let provider = Arc::new(ScriptedProvider::replies(&[
            "Hypertension - Stable\nCongestive heart failure - Worsening\nCOPD\nSeasonal allergies",
        ]));
        let pipeline = pipeline(provider);

        let result = pipeline.run("Assessment/Plan ...").await;
        assert_eq!(result.relevant, vec!["Congestive heart failure", "COPD"]);
        assert_eq!(result.non_relevant, vec!["Hypertension", "Seasonal allergies"]);
    }

    #[tokio::test]
    async fn test_run_detailed_reports_strategy() {
        let provider = Arc::new(ScriptedProvider::replies(&["COPD\nHeart failure"]));
        let pipeline = pipeline(provider);

        let report = pipeline.run_detailed("note").await;
        assert!(!report.cached);
        assert_eq!(report.extraction.attempts, 1);
        assert_eq!(report.matches.len(), 2);
        assert!(report.matches.iter().all(|m| m.verdict.is_relevant()));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["relevant"][0], "COPD");
        assert_eq!(json["matches"][1]["code"], "HCC226");
    }

    #[tokio::test]
    async fn test_blank_note_yields_empty_partition() {
        let provider = Arc::new(ScriptedProvider::always("COPD"));
        let pipeline = pipeline(provider.clone());

        assert!(pipeline.run("   ").await.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_yield_empty_partition() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::Fail(ProviderError::AuthError),
            Step::Reply(String::new()),
            Step::Fail(ProviderError::Timeout(Duration::from_secs(30))),
        ]));
        let pipeline = pipeline(provider.clone());

        assert!(pipeline.run("note").await.is_empty());
        assert_eq!(provider.call_count(), 3);
        assert_eq!(pipeline.usage().failed_calls, 2);
    }

    #[tokio::test]
    async fn test_cache_skips_model_for_repeated_note() {
        let provider = Arc::new(ScriptedProvider::always("Heart failure"));
        let pipeline = pipeline(provider.clone()).with_cache(ExtractionCache::default());

        let first = pipeline.run_detailed("Assessment/Plan\n1. CHF").await;
        let second = pipeline.run_detailed("Assessment/Plan\n1. CHF").await;

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.classification, second.classification);
        assert_eq!(provider.call_count(), 1);

        let usage = pipeline.usage();
        assert_eq!(usage.llm_calls, 1);
        assert_eq!(usage.cache_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_many_preserves_order() {
        let provider = Arc::new(
            EchoProvider::new().delay("COPD", Duration::from_secs(2)),
        );
        let extractor =
            ConditionExtractor::new(provider, ExtractionConfig::default(), CompletionConfig::default())
                .unwrap();
        let pipeline = ConditionPipeline::new(extractor, matcher());

        let notes = ["COPD", "Hypertension", "Heart failure"];
        let reports = pipeline.run_many(&notes, 3).await;

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].classification.relevant, vec!["COPD"]);
        assert_eq!(reports[1].classification.non_relevant, vec!["Hypertension"]);
        assert_eq!(reports[2].classification.relevant, vec!["Heart failure"]);
        assert_eq!(pipeline.usage().llm_calls, 3);
    }

    #[test]
    fn test_from_config_unknown_provider() {
        let config = PipelineConfig {
            provider: "nonexistent".to_string(),
            ..Default::default()
        };
        let dir = std::env::temp_dir().join(format!("hcc-pipeline-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let vocab = dir.join("vocab.csv");
        std::fs::write(&vocab, "code,description\nHCC226,Heart failure\n").unwrap();
        let config = PipelineConfig {
            vocabulary: VocabularyConfig {
                path: vocab,
                indicators_path: None,
            },
            ..config
        };

        let result = ConditionPipeline::from_config(&config, &ProviderRegistry::new());
        assert!(matches!(result, Err(RuntimeError::Configuration(_))));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_bundled_data_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/hcc.yaml");
        let config = PipelineConfig::from_path(path).unwrap();
        let matcher = load_matcher(&config.vocabulary).unwrap();

        assert_eq!(matcher.indicator_count(), 5);
        let result = matcher.classify(&["COPD", "Hypertension", "Congestive heart failure"]);
        assert_eq!(result.relevant, vec!["COPD", "Congestive heart failure"]);
        assert_eq!(result.non_relevant, vec!["Hypertension"]);
    }

    #[test]
    fn test_load_matcher_missing_vocabulary() {
        let config = VocabularyConfig {
            path: "/definitely/not/here.csv".into(),
            indicators_path: None,
        };
        assert!(matches!(load_matcher(&config), Err(RuntimeError::Vocabulary(_))));
    }

    #[test]
    fn test_provider_trait_object_is_shareable() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn LlmProvider>();
        assert_send_sync::<ConditionPipeline>();
    }
}
