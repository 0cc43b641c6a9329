//! Daily digest pipeline.
//!
//! One run fetches the search window from every provider, filters the papers,
//! summarizes the matches and hands them to the notifier:
//!
//! ```ignore
//! use paper_digest::pipeline::DigestPipeline;
//!
//! let pipeline = DigestPipeline::new(providers, engine, summarizer, notifier, window);
//! let stats = pipeline.run().await?;
//! println!("Matched {} of {} papers", stats.matched, stats.fetched);
//! ```
//!
//! A provider or notifier failure aborts the run. A summary failure does not:
//! the paper is delivered without a summary.

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{info, warn};

use crate::embedding::EmbeddingProvider;
use crate::filter::FilterEngine;
use crate::models::{PaperRecord, SummarizedPaper};
use crate::notifier::{Notifier, NotifierError};
use crate::provider::{PaperProvider, ProviderError, SearchWindow};
use crate::summarizer::Summarizer;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A provider could not deliver its papers
    #[error("Fetching from {provider} failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    /// The digest could not be delivered
    #[error("Notification failed: {0}")]
    Notifier(#[from] NotifierError),
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Counters from one pipeline run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// Papers returned by all providers
    pub fetched: usize,

    /// Papers that passed the filter
    pub matched: usize,

    /// Matched papers that received a summary
    pub summarized: usize,

    /// Matched papers whose summary failed
    pub summary_failures: usize,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetched(&mut self, count: usize) {
        self.fetched += count;
    }

    pub fn record_matched(&mut self, count: usize) {
        self.matched += count;
    }

    pub fn record_summarized(&mut self) {
        self.summarized += 1;
    }

    pub fn record_summary_failure(&mut self) {
        self.summary_failures += 1;
    }
}

/// Fetch, filter, summarize, notify.
pub struct DigestPipeline<E: EmbeddingProvider> {
    providers: Vec<Box<dyn PaperProvider>>,
    filter: FilterEngine<E>,
    summarizer: Box<dyn Summarizer>,
    notifier: Box<dyn Notifier>,
    window: SearchWindow,
    show_progress: bool,
}

impl<E: EmbeddingProvider> DigestPipeline<E> {
    pub fn new(
        providers: Vec<Box<dyn PaperProvider>>,
        filter: FilterEngine<E>,
        summarizer: Box<dyn Summarizer>,
        notifier: Box<dyn Notifier>,
        window: SearchWindow,
    ) -> Self {
        Self {
            providers,
            filter,
            summarizer,
            notifier,
            window,
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr while summarizing.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Publication dates this pipeline searches.
    pub fn window(&self) -> &SearchWindow {
        &self.window
    }

    /// Execute one run.
    ///
    /// # Errors
    /// Returns `PipelineError` if any provider or the notifier fails
    pub async fn run(&self) -> PipelineResult<RunStats> {
        let mut stats = RunStats::new();

        info!(
            "Searching {} to {} across {} sources",
            self.window.start,
            self.window.end,
            self.providers.len()
        );
        let papers = self.fetch_all().await?;
        stats.record_fetched(papers.len());

        let matched = self.filter.filter(&papers).await;
        stats.record_matched(matched.len());
        info!("{} papers matched", matched.len());

        let progress = self.progress_bar(matched.len());
        let mut summarized = Vec::with_capacity(matched.len());
        for item in matched {
            let summary = match self.summarizer.summarize(&item.paper).await {
                Ok(summary) => {
                    stats.record_summarized();
                    Some(summary)
                }
                Err(e) => {
                    warn!("Failed to summarize {}: {}", item.paper.identifier(), e);
                    stats.record_summary_failure();
                    None
                }
            };
            progress.inc(1);
            summarized.push(SummarizedPaper {
                paper: item.paper,
                result: item.result,
                summary,
            });
        }
        progress.finish_and_clear();

        self.notifier.notify(&summarized).await?;
        Ok(stats)
    }

    async fn fetch_all(&self) -> PipelineResult<Vec<PaperRecord>> {
        let mut papers = Vec::new();
        for provider in &self.providers {
            let fetched = provider
                .fetch_papers(&self.window)
                .await
                .map_err(|source| PipelineError::Provider {
                    provider: provider.name().to_string(),
                    source,
                })?;
            info!("{}: {} papers", provider.name(), fetched.len());
            papers.extend(fetched);
        }
        Ok(papers)
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress || total == 0 {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} summaries")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        pb.set_style(style);
        pb
    }
}
