//! FastEmbed embedding provider implementation.
//!
//! This module provides an implementation of the `EmbeddingProvider` trait
//! using the fastembed library for local embedding generation. Loading the model
//! is the expensive step, so a provider is built once per run and shared by
//! every scoring call.

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Default model name, matching the sentence-transformers checkpoint.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Resolve a configured model name to a fastembed model and its dimension.
///
/// Names are matched case-insensitively.
///
/// # Errors
/// Returns `EmbeddingError::ConfigError` for unsupported names
pub fn resolve_model(name: &str) -> EmbeddingResult<(EmbeddingModel, usize)> {
    let resolved = match name.trim().to_lowercase().as_str() {
        "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
        "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
        "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
        "bge-large-en-v1.5" => (EmbeddingModel::BGELargeENV15, 1024),
        "nomic-embed-text-v1.5" => (EmbeddingModel::NomicEmbedTextV15, 768),
        "paraphrase-multilingual-minilm-l12-v2" => (EmbeddingModel::ParaphraseMLMiniLML12V2, 384),
        other => {
            return Err(EmbeddingError::ConfigError(format!(
                "Unsupported embedding model '{}'",
                other
            )))
        }
    };
    Ok(resolved)
}

/// Default model cache location: `<user cache dir>/fastembed`.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("fastembed"))
        .unwrap_or_else(|| PathBuf::from(".cache/fastembed"))
}

/// Locally running sentence-embedding model.
#[derive(Clone)]
pub struct FastEmbedProvider {
    /// The loaded model (inference needs exclusive access)
    model: Arc<Mutex<TextEmbedding>>,

    /// Configured model name
    model_name: String,

    /// Dimension of produced vectors
    embedding_dimension: usize,
}

impl FastEmbedProvider {
    /// Load a model by name.
    ///
    /// # Arguments
    /// * `model_name` - One of the names accepted by [`resolve_model`]
    /// * `cache_dir` - Model cache directory (defaults to [`default_cache_dir`])
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` for unknown names and
    /// `EmbeddingError::ModelLoad` if the model cannot be downloaded or loaded
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>) -> EmbeddingResult<Self> {
        let (model_type, embedding_dimension) = resolve_model(model_name)?;
        let cache_dir = cache_dir.unwrap_or_else(default_cache_dir);
        debug!("Using embedding model cache: {}", cache_dir.display());

        let init_options = TextInitOptions::new(model_type)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(false);

        let text_embedding = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::ModelLoad(format!("{}: {}", model_name, e)))?;

        info!(
            "Embedding model loaded: model={}, dimension={}",
            model_name, embedding_dimension
        );

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name: model_name.to_string(),
            embedding_dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }

        let mut model = self.model.lock().await;
        let embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Inference("No embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput("All texts must be non-empty".to_string()));
        }

        let mut model = self.model.lock().await;
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        model
            .embed(text_strings, None)
            .map_err(|e| EmbeddingError::Inference(format!("Batch embedding failed: {}", e)))
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// TextEmbedding does not implement Debug
impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}
