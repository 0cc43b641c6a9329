//! Paper Digest - daily filtering of new research papers.
//!
//! This library fetches newly published papers, keeps the ones that are
//! semantically related to a set of research topics or written by tracked
//! authors, and delivers them with short summaries.
//!
//! # Architecture
//!
//! - **models**: Core data structures (PaperRecord, MatchResult, SummarizedPaper)
//! - **embedding**: Sentence embeddings and cosine similarity
//! - **filter**: Author name matching, topic matching and the filter engine
//! - **provider**: PubMed and bioRxiv/medRxiv fetchers
//! - **summarizer**: Paper summaries via the Anthropic API
//! - **notifier**: Slack and console delivery
//! - **pipeline**: One fetch, filter, summarize, notify run
//! - **config**: YAML configuration and environment secrets
//!
//! # Workflow
//!
//! 1. Fetch papers published in the search window from every source
//! 2. Keep papers with a tracked author or a topic similarity at or above the threshold
//! 3. Summarize each kept paper
//! 4. Post the digest, even when nothing matched
//!
//! # Example
//!
//! ```ignore
//! use paper_digest::{
//!     embedding::fastembed::FastEmbedProvider,
//!     filter::{FilterCriteria, FilterEngine},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let criteria = FilterCriteria::new(
//!         vec!["pangenome graph construction".to_string()],
//!         vec!["Evan E. Eichler".to_string()],
//!         0.4,
//!     )?;
//!     let embedder = FastEmbedProvider::new("all-MiniLM-L6-v2", None)?;
//!     let engine = FilterEngine::new(embedder, &criteria).await?;
//!
//!     for matched in engine.filter(&papers).await {
//!         println!("{}: {}", matched.paper.title(), matched.result.reason());
//!     }
//!
//!     Ok(())
//! }
//! ```

// Public modules
pub mod config;
pub mod embedding;
pub mod filter;
pub mod models;
pub mod notifier;
pub mod pipeline;
pub mod provider;
pub mod summarizer;

// Re-export commonly used types at the crate root
pub use config::Config;
pub use embedding::EmbeddingProvider;
pub use filter::{FilterCriteria, FilterEngine, NameMatcher, TopicMatcher};
pub use models::{MatchResult, MatchedPaper, PaperRecord, PaperSource, PaperSummary, SummarizedPaper};
pub use pipeline::{DigestPipeline, RunStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
