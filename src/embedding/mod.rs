//! Embedding provider abstraction and vector helpers.
//!
//! This module defines the interface for text embedding generation used by the
//! topic matcher. The provider is constructed once per process and injected into
//! the filter engine, so tests can substitute a deterministic stub for the real
//! model.

pub mod fastembed;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The model could not be loaded or initialized
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// Invalid input text (e.g., empty)
    #[error("Invalid input text: {0}")]
    InvalidInput(String),

    /// Configuration error (e.g., unknown model name)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Inference failed or returned nothing
    #[error("Embedding generation failed: {0}")]
    Inference(String),
}

/// Result type for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Trait for text embedding providers.
///
/// Implementors generate fixed-dimension vectors from text. Vectors from the
/// same provider are comparable with [`cosine_similarity`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    ///
    /// # Errors
    /// Returns `EmbeddingError::InvalidInput` for blank text, or another
    /// variant if generation fails
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    ///
    /// # Errors
    /// Returns `EmbeddingError` if any text is blank or generation fails
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Number of dimensions in produced vectors.
    fn dimension(&self) -> usize;

    /// Identifier of the underlying model.
    fn model_name(&self) -> &str;
}

/// Normalizes text for consistent embedding generation.
///
/// Lowercases, trims, and collapses runs of whitespace to a single space.
///
/// # Example
/// ```
/// use paper_digest::embedding::normalize_text;
/// assert_eq!(normalize_text("  Hello   World  "), "hello world");
/// ```
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1]. Vectors of different lengths, or with zero
/// magnitude, have similarity 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
