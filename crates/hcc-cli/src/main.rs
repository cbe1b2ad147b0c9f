//! `hcc`: extract conditions from clinical notes and flag the HCC-relevant ones.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use hcc_core::normalize;
use hcc_runtime::{
    load_matcher, ConditionPipeline, PipelineConfig, ProviderRegistry, VocabularyConfig,
};

#[derive(Debug, Parser)]
#[command(name = "hcc", version, about = "HCC condition extraction and relevance classification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract conditions from notes with the model and classify them.
    Extract(ExtractArgs),

    /// Classify condition names against a vocabulary (no model call).
    Classify(ClassifyArgs),

    /// Print the normalized form of each condition name.
    Normalize {
        /// Condition names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Validate a configuration file and its vocabulary, then health-check the provider.
    CheckConfig {
        #[arg(long, short = 'c', value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
        config: PathBuf,
    },
}

#[derive(Debug, Parser)]
struct ExtractArgs {
    /// Pipeline configuration (YAML or JSON).
    #[arg(long, short = 'c', value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    config: PathBuf,

    /// Note text as a literal string. Conflicts with --input.
    #[arg(long, value_name = "TEXT", conflicts_with = "input")]
    text: Option<String>,

    /// Note files; repeat for a batch. Use '-' to read from stdin.
    #[arg(long, short = 'i', value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    input: Vec<PathBuf>,

    /// Maximum notes processed at once in a batch.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Include attempt records, match details and usage.
    #[arg(long)]
    report: bool,
}

#[derive(Debug, Parser)]
struct ClassifyArgs {
    /// Vocabulary CSV with `code` and `description` columns.
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    vocabulary: PathBuf,

    /// Indicator list, one per line.
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    indicators: Option<PathBuf>,

    /// Show the strategy and vocabulary code behind each verdict.
    #[arg(long)]
    detailed: bool,

    /// Condition names
    #[arg(required = true)]
    names: Vec<String>,
}

#[derive(Debug, Serialize)]
struct NormalizedName<'a> {
    name: &'a str,
    normalized: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may already carry the key
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hcc=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Extract(args) => extract(args).await,
        Command::Classify(args) => classify(args),
        Command::Normalize { names } => {
            let normalized: Vec<_> = names
                .iter()
                .map(|name| NormalizedName {
                    name,
                    normalized: normalize(name),
                })
                .collect();
            print_json(&normalized)
        }
        Command::CheckConfig { config } => print_json(&check_config(&config).await?),
    }
}

async fn extract(args: ExtractArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let pipeline = ConditionPipeline::from_config(&config, &ProviderRegistry::with_defaults())
        .context("Failed to build extraction pipeline")?;

    let notes = read_notes(args.text.as_deref(), &args.input)?;
    let mut reports = pipeline.run_many(&notes, args.concurrency).await;

    if args.report {
        if reports.len() == 1 {
            print_json(&reports[0])?;
        } else {
            print_json(&reports)?;
        }
        tracing::info!(usage = ?pipeline.usage(), "Usage");
        return Ok(());
    }

    if reports.len() == 1 {
        print_json(&reports.remove(0).classification)
    } else {
        let classifications: Vec<_> = reports.into_iter().map(|r| r.classification).collect();
        print_json(&classifications)
    }
}

fn classify(args: ClassifyArgs) -> Result<()> {
    let vocabulary = VocabularyConfig {
        path: args.vocabulary,
        indicators_path: args.indicators,
    };
    let matcher = load_matcher(&vocabulary).context("Failed to load vocabulary")?;

    if args.detailed {
        print_json(&matcher.classify_detailed(&args.names))
    } else {
        print_json(&matcher.classify(&args.names))
    }
}

async fn check_config(path: &Path) -> Result<serde_json::Value> {
    let config = load_config(path)?;
    let registry = ProviderRegistry::with_defaults();
    let provider = registry
        .create(&config.provider, &config.provider_config)
        .with_context(|| format!("Provider '{}' is not usable", config.provider))?;
    let matcher = load_matcher(&config.vocabulary).context("Failed to load vocabulary")?;

    let healthy = provider.health_check().await;
    if !healthy {
        tracing::warn!(provider = provider.name(), "Provider failed its health check");
    }

    Ok(serde_json::json!({
        "provider": config.provider,
        "model": config.completion.model,
        "healthy": healthy,
        "max_attempts": config.extraction.max_attempts,
        "history_mode": config.extraction.history_mode,
        "descriptions": matcher.description_count(),
        "indicators": matcher.indicator_count(),
        "cache": config.cache.is_some(),
    }))
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::from_path(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Collect note texts from --text, --input files, or stdin.
fn read_notes(text: Option<&str>, inputs: &[PathBuf]) -> Result<Vec<String>> {
    if let Some(literal) = text {
        return Ok(vec![literal.to_string()]);
    }

    if inputs.is_empty() {
        if std::io::stdin().is_terminal() {
            anyhow::bail!("No input provided. Use --text, --input, or pipe text via stdin.");
        }
        return Ok(vec![read_stdin()?]);
    }

    let stdin_inputs = inputs.iter().filter(|p| p.as_path() == Path::new("-")).count();
    if stdin_inputs > 1 {
        anyhow::bail!("'-' (stdin) may be given as --input only once");
    }

    inputs
        .iter()
        .map(|path| {
            if path.as_path() == Path::new("-") {
                read_stdin()
            } else {
                fs::read_to_string(path)
                    .with_context(|| format!("Failed to read input file {}", path.display()))
            }
        })
        .collect()
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read stdin")?;
    Ok(buffer)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
