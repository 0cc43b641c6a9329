//! Paper filtering by tracked authors and topic relevance.
//!
//! The filter engine combines the two matchers: a paper is kept when at least
//! one tracked author appears on it, or when its best topic similarity reaches
//! the threshold. Every kept paper carries the reasons it was kept.
//!
//! # Usage
//!
//! ```ignore
//! use paper_digest::embedding::fastembed::FastEmbedProvider;
//! use paper_digest::filter::{FilterCriteria, FilterEngine};
//!
//! let provider = FastEmbedProvider::new("all-MiniLM-L6-v2", None)?;
//! let criteria = FilterCriteria::new(
//!     vec!["pangenome".to_string()],
//!     vec!["Evan Eichler".to_string()],
//!     0.4,
//! )?;
//! let engine = FilterEngine::new(provider, &criteria).await?;
//!
//! for matched in engine.filter(&papers).await {
//!     println!("{} - {}", matched.paper.title(), matched.result.reason());
//! }
//! ```

pub mod names;
pub mod topics;

use thiserror::Error;
use tracing::{debug, info};

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::models::{MatchResult, MatchedPaper, PaperRecord};

pub use names::{names_match, NameMatcher, PersonName};
pub use topics::{TopicEvaluation, TopicMatcher, TopicScore};

/// Default minimum cosine similarity for a topic match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.4;

/// Errors that can occur while setting up filtering.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Threshold outside [0, 1] or not a number
    #[error("Invalid similarity threshold: {0}")]
    InvalidThreshold(f32),

    /// Topic vectors could not be computed
    #[error("Embedding error: {0}")]
    EmbeddingError(#[from] EmbeddingError),
}

/// Result type for filter operations.
pub type FilterResult<T> = Result<T, FilterError>;

/// What the engine filters for.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    /// Topic keywords or phrases
    pub topics: Vec<String>,

    /// Tracked author names, "Firstname [Middle] Lastname"
    pub authors: Vec<String>,

    /// Minimum best-topic similarity for a topic match
    pub similarity_threshold: f32,
}

impl FilterCriteria {
    /// Build criteria, validating the threshold.
    ///
    /// # Errors
    /// Returns `FilterError::InvalidThreshold` unless the threshold is within [0, 1]
    pub fn new(topics: Vec<String>, authors: Vec<String>, similarity_threshold: f32) -> FilterResult<Self> {
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(FilterError::InvalidThreshold(similarity_threshold));
        }
        Ok(Self {
            topics,
            authors,
            similarity_threshold,
        })
    }
}

/// Decides which papers to keep and why.
pub struct FilterEngine<E: EmbeddingProvider> {
    names: NameMatcher,
    topics: TopicMatcher<E>,
    threshold: f32,
}

impl<E: EmbeddingProvider> FilterEngine<E> {
    /// Build the engine, embedding the topic set up front.
    ///
    /// # Errors
    /// Returns `FilterError::EmbeddingError` if the topic vectors cannot be
    /// computed; filtering cannot proceed without them
    pub async fn new(provider: E, criteria: &FilterCriteria) -> FilterResult<Self> {
        if !(0.0..=1.0).contains(&criteria.similarity_threshold) {
            return Err(FilterError::InvalidThreshold(criteria.similarity_threshold));
        }

        let names = NameMatcher::new(&criteria.authors);
        let topics = TopicMatcher::new(provider, &criteria.topics).await?;

        info!(
            "Filter ready: {} topics, {} tracked authors, threshold {:.2}",
            topics.topic_count(),
            criteria.authors.len(),
            criteria.similarity_threshold
        );

        Ok(Self {
            names,
            topics,
            threshold: criteria.similarity_threshold,
        })
    }

    /// Evaluate one paper against both criteria.
    pub async fn evaluate(&self, paper: &PaperRecord) -> MatchResult {
        let matched_authors = self.names.matched_authors(paper.authors());
        let evaluation = self.topics.evaluate(&paper.match_text()).await;

        let best = evaluation.best();
        let best_topic_score = best.map_or(0.0, |b| b.score);
        let topic_matched = best.is_some() && best_topic_score >= self.threshold;

        let mut reasons = Vec::new();
        if !matched_authors.is_empty() {
            reasons.push(format!("Authors: {}", matched_authors.join(", ")));
        }
        if let (true, Some(best)) = (topic_matched, best) {
            reasons.push(format!("Topics: {} ({:.2})", best.topic, best.score));
        }

        MatchResult {
            matched: !reasons.is_empty(),
            reasons,
            best_topic_score,
            best_topic: best.map(|b| b.topic.clone()),
            matched_authors,
        }
    }

    /// Keep the papers that match, in input order.
    ///
    /// Papers are evaluated one after another; the input is not modified,
    /// de-duplicated or re-ordered.
    pub async fn filter(&self, papers: &[PaperRecord]) -> Vec<MatchedPaper> {
        let mut matched = Vec::new();

        for paper in papers {
            let result = self.evaluate(paper).await;
            debug!(
                "{} '{}' (best topic score {:.3})",
                if result.matched { "Keep" } else { "Drop" },
                paper.title(),
                result.best_topic_score
            );
            if result.matched {
                matched.push(MatchedPaper {
                    paper: paper.clone(),
                    result,
                });
            }
        }

        info!("{} of {} papers matched", matched.len(), papers.len());
        matched
    }
}
