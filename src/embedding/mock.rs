//! Deterministic stub embedding provider for tests.
//!
//! Each vocabulary word owns one dimension and every other word is ignored.
//! Texts sharing vocabulary words therefore score above zero, unrelated texts
//! embed to the zero vector and score zero, and results never change between runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{normalize_text, EmbeddingError, EmbeddingProvider, EmbeddingResult};

pub(crate) struct KeywordEmbedder {
    vocabulary: Vec<String>,
    fail_on: Option<String>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub(crate) fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
            fail_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every `embed` call whose text contains `needle`.
    pub(crate) fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_lowercase());
        self
    }

    /// Number of texts embedded so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.vocabulary.len()];
        for word in normalize_text(text).split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            if let Some(idx) = self.vocabulary.iter().position(|v| v == word) {
                vector[idx] += 1.0;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }
        if let Some(needle) = &self.fail_on {
            if text.to_lowercase().contains(needle.as_str()) {
                return Err(EmbeddingError::Inference("stub failure".to_string()));
            }
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    fn model_name(&self) -> &str {
        "keyword-stub"
    }
}
