//! Daily paper digest entry point.
//!
//! Fetches yesterday's papers from the configured journals and preprint
//! servers, keeps the ones matching the tracked topics or authors, summarizes
//! them and posts the digest to Slack.
//!
//! # Examples
//!
//! Regular run (needs `ANTHROPIC_API_KEY` and `SLACK_BOT_TOKEN`):
//! ```bash
//! paper-digest --config config/config.yaml
//! ```
//!
//! Dry run printing matches to the terminal:
//! ```bash
//! paper-digest --dry-run --threshold 0.35
//! ```

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use paper_digest::{
    config::{Config, DEFAULT_CONFIG_PATH},
    embedding::{fastembed::FastEmbedProvider, EmbeddingProvider},
    filter::FilterEngine,
    notifier::{ConsoleNotifier, Notifier, SlackNotifier},
    pipeline::DigestPipeline,
    provider::{biorxiv::BioRxivProvider, pubmed::PubMedProvider, PaperProvider, SearchWindow},
    summarizer::{AnthropicSummarizer, PlaceholderSummarizer, Summarizer},
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Research paper digest
#[derive(Parser, Debug)]
#[command(
    name = "paper-digest",
    version,
    about = "Filter new research papers by topic and author and post a digest",
    long_about = "Fetches newly published papers from PubMed, bioRxiv and medRxiv, keeps those \
semantically related to the configured topics or written by tracked authors, summarizes them and \
posts the digest to Slack.

EXAMPLES:
  Regular run:
    ANTHROPIC_API_KEY=... SLACK_BOT_TOKEN=xoxb-... paper-digest -c config/config.yaml

  Dry run with a looser threshold:
    paper-digest --dry-run --threshold 0.3

  Dry run as JSON:
    paper-digest -n --json > matches.json"
)]
struct DigestArgs {
    /// YAML configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Skip summarization and Slack; print matches to stdout
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Override filter.similarity_threshold
    #[arg(long, value_name = "F")]
    threshold: Option<f32>,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// With --dry-run, print matches as JSON instead of a table
    #[arg(long, requires = "dry_run")]
    json: bool,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Load the file and apply command-line overrides
fn load_config(args: &DigestArgs) -> Result<Config> {
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {:?}", args.config))?;

    match args.threshold {
        Some(threshold) => {
            info!("Similarity threshold overridden to {:.2}", threshold);
            config
                .with_threshold(threshold)
                .context("Invalid --threshold")
        }
        None => Ok(config),
    }
}

/// One provider per configured source
fn create_providers(config: &Config) -> Result<Vec<Box<dyn PaperProvider>>> {
    let mut providers: Vec<Box<dyn PaperProvider>> = Vec::new();

    if !config.journals.pubmed.is_empty() {
        let provider = PubMedProvider::new(
            config.journals.pubmed.clone(),
            config.secrets.pubmed_api_key.clone(),
        )
        .context("Failed to create PubMed provider")?;
        providers.push(Box::new(provider));
    }

    for server in config.preprint_servers()? {
        let categories = config.categories_for(server).unwrap_or_default();
        let provider = BioRxivProvider::new(server, categories)
            .with_context(|| format!("Failed to create {} provider", server))?;
        providers.push(Box::new(provider));
    }

    if providers.is_empty() {
        warn!("No journals or preprint servers configured; nothing will be fetched");
    }
    Ok(providers)
}

/// Real summarizer and Slack, or their dry-run stand-ins
fn create_outputs(args: &DigestArgs, config: &Config) -> Result<(Box<dyn Summarizer>, Box<dyn Notifier>)> {
    if args.dry_run {
        info!("Dry run: summaries and Slack are skipped");
        return Ok((
            Box::new(PlaceholderSummarizer),
            Box::new(ConsoleNotifier::new(args.json)),
        ));
    }

    let api_key = config.secrets.require_anthropic()?;
    let token = config.secrets.require_slack()?;

    let summarizer = AnthropicSummarizer::new(api_key, &config.summarizer)
        .context("Failed to create summarizer")?;
    let notifier = SlackNotifier::new(token, &config.slack).context("Failed to create Slack notifier")?;
    Ok((Box::new(summarizer), Box::new(notifier)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = DigestArgs::parse();

    init_logging(&args.log_level).context("Failed to initialize logging")?;

    info!("Starting paper digest");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();

    let config = load_config(&args)?;
    debug!("Configuration: {:?}", config);

    // Check secrets before loading the model
    let (summarizer, notifier) = create_outputs(&args, &config)?;
    let providers = create_providers(&config)?;

    let embedder = FastEmbedProvider::new(&config.filter.model, config.filter.cache_dir.clone())
        .context("Failed to initialize embedding model")?;
    info!(
        "Embedding model ready: model={}, dimension={}",
        embedder.model_name(),
        embedder.dimension()
    );

    let engine = FilterEngine::new(embedder, &config.filter_criteria())
        .await
        .context("Failed to prepare topic filter")?;

    let pipeline = DigestPipeline::new(
        providers,
        engine,
        summarizer,
        notifier,
        SearchWindow::ending_yesterday(config.search.days_back, Local::now().date_naive()),
    )
    .with_progress(!args.dry_run);

    let stats = pipeline.run().await.context("Digest run failed")?;

    let elapsed = start_time.elapsed();
    if !args.json {
        println!("\n╔════════════════════════════════════════╗");
        println!("║      Digest Completed                  ║");
        println!("╠════════════════════════════════════════╣");
        let window = pipeline.window();
        println!("║ Window:       {} .. {} ║", window.start, window.end);
        println!("║ Fetched:              {:>16} ║", stats.fetched);
        println!("║ Matched:              {:>16} ║", stats.matched);
        println!("║ Summarized:           {:>16} ║", stats.summarized);
        println!("║ Summary failures:     {:>16} ║", stats.summary_failures);
        println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
        println!("╚════════════════════════════════════════╝");
    }

    if stats.summary_failures > 0 {
        warn!(
            "{} papers were delivered without a summary - check logs for details",
            stats.summary_failures
        );
    }

    info!("Paper digest completed successfully");

    Ok(())
}
