//! Semantic topic scoring.
//!
//! Topic strings are embedded once when the matcher is built; each paper then
//! costs a single embedding call plus one cosine similarity per topic.

use tracing::{debug, warn};

use crate::embedding::{cosine_similarity, normalize_text, EmbeddingProvider, EmbeddingResult};

/// Similarity of a paper's text to one configured topic.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicScore {
    pub topic: String,

    /// Cosine similarity clamped to [0, 1]
    pub score: f32,
}

/// Scores of one paper against every configured topic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopicEvaluation {
    /// One entry per topic, in configured order (empty if nothing was scored)
    pub scores: Vec<TopicScore>,
}

impl TopicEvaluation {
    /// Highest-scoring topic. Ties go to the topic configured first.
    pub fn best(&self) -> Option<&TopicScore> {
        self.scores.iter().fold(None, |best: Option<&TopicScore>, candidate| match best {
            Some(current) if current.score >= candidate.score => Some(current),
            _ => Some(candidate),
        })
    }

    /// Score of [`TopicEvaluation::best`], or 0 when nothing was scored.
    pub fn best_score(&self) -> f32 {
        self.best().map_or(0.0, |best| best.score)
    }
}

struct TopicVector {
    topic: String,
    vector: Vec<f32>,
}

/// Scores paper text against a fixed set of topics.
pub struct TopicMatcher<E: EmbeddingProvider> {
    provider: E,
    topics: Vec<TopicVector>,
}

impl<E: EmbeddingProvider> TopicMatcher<E> {
    /// Embed the topic strings and keep the vectors for the whole run.
    ///
    /// Blank topics are skipped. An empty topic list makes no embedding call.
    ///
    /// # Errors
    /// Returns `EmbeddingError` if the topic vectors cannot be computed
    pub async fn new<S: AsRef<str>>(provider: E, topics: &[S]) -> EmbeddingResult<Self> {
        let topics: Vec<&str> = topics
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .collect();

        let normalized: Vec<String> = topics.iter().map(|t| normalize_text(t)).collect();
        let refs: Vec<&str> = normalized.iter().map(String::as_str).collect();
        let vectors = provider.embed_batch(&refs).await?;

        let topics = topics
            .into_iter()
            .zip(vectors)
            .map(|(topic, vector)| TopicVector {
                topic: topic.to_string(),
                vector,
            })
            .collect();

        Ok(Self { provider, topics })
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Score `text` against every topic.
    ///
    /// Blank text, an empty topic set, or a failed embedding call all yield
    /// an empty evaluation (best score 0) instead of an error.
    pub async fn evaluate(&self, text: &str) -> TopicEvaluation {
        let normalized = normalize_text(text);
        if normalized.is_empty() || self.topics.is_empty() {
            return TopicEvaluation::default();
        }

        let text_vector = match self.provider.embed(&normalized).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Topic scoring skipped: {}", e);
                return TopicEvaluation::default();
            }
        };

        let scores = self
            .topics
            .iter()
            .map(|topic| TopicScore {
                topic: topic.topic.clone(),
                score: cosine_similarity(&text_vector, &topic.vector).clamp(0.0, 1.0),
            })
            .collect::<Vec<_>>();

        debug!("Topic scores: {:?}", scores);
        TopicEvaluation { scores }
    }
}
