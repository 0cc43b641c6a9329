//! Paper summarization.
//!
//! `AnthropicSummarizer` asks the Anthropic Messages API for a structured
//! summary of each matched paper. `PlaceholderSummarizer` stands in for dry runs
//! and never touches the network.
//!
//! With a secondary language configured, the model writes the summary twice,
//! separated by a marker line such as `---JAPANESE---`, and the reply is split
//! on that marker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SummarizerConfig;
use crate::models::{PaperRecord, PaperSummary};
use crate::provider::REQUEST_TIMEOUT;

/// Anthropic API base URL.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Multiplier on the provider request timeout for summary requests.
const SUMMARY_TIMEOUT_FACTOR: u32 = 4;

/// Authors listed in the prompt before eliding the rest.
const PROMPT_AUTHOR_LIMIT: usize = 5;

/// Text produced by `PlaceholderSummarizer`.
pub const PLACEHOLDER_SUMMARY: &str = "(summary skipped in dry run)";

/// Errors that can occur while summarizing a paper.
#[derive(Debug, Error)]
pub enum SummarizerError {
    /// Request could not be sent or the body could not be read
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status} from Anthropic API: {body}")]
    Status { status: u16, body: String },

    /// Response did not contain a text block
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// Result type for summarizer operations.
pub type SummarizerResult<T> = Result<T, SummarizerError>;

/// Trait for paper summarizers.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize one paper.
    ///
    /// # Errors
    /// Returns `SummarizerError` if no summary could be produced
    async fn summarize(&self, paper: &PaperRecord) -> SummarizerResult<PaperSummary>;
}

/// Summarizer backed by the Anthropic Messages API.
pub struct AnthropicSummarizer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    language: String,
    secondary_language: Option<String>,
}

impl AnthropicSummarizer {
    /// Create a summarizer from its configuration section.
    ///
    /// # Errors
    /// Returns `SummarizerError::Request` if the HTTP client cannot be built
    pub fn new(api_key: impl Into<String>, config: &SummarizerConfig) -> SummarizerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT * SUMMARY_TIMEOUT_FACTOR)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            language: config.language.clone(),
            secondary_language: config.secondary_language.clone(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn system_prompt(&self) -> String {
        let sections = "## Background\n\
             The research background and motivation in 2-3 sentences: why the work matters \
             and which problem it addresses.\n\n\
             ## Methods\n\
             (If applicable) The main methods, techniques and datasets.\n\n\
             ## Key Findings\n\
             3-5 main results as bullet points, with numbers where available.\n\n\
             ## Conclusions\n\
             The conclusions and significance in 2-3 sentences.\n\n\
             ## Impact & Perspectives\n\
             Your own analysis in 10-15 sentences, covering:\n\
             1. **Author Background**: the likely expertise of the group, focusing on the first, \
             second, second-last and last authors and how it shaped the study.\n\
             2. **Comparison with Related Work**: novelty and advantages over existing methods \
             and findings in the field.\n\
             3. **Scientific & Social Impact**: significance as basic research, possible clinical \
             applications, contributions to technology.\n\
             4. **Future Directions**: open challenges and where the work could go next.";

        match &self.secondary_language {
            None => format!(
                "You are an expert in summarizing and analyzing academic papers. \
                 Write your answer in {language} using these sections:\n\n\
                 {sections}\n\n\
                 Technical terms may be kept in English.",
                language = self.language,
            ),
            Some(secondary) => format!(
                "You are an expert in summarizing and analyzing academic papers. \
                 Write the summary in {language}, then a line containing only {marker}, \
                 then the same summary in {secondary}. Use these sections in both:\n\n\
                 {sections}\n\n\
                 Technical terms may be kept in English.",
                language = self.language,
                marker = language_marker(secondary),
            ),
        }
    }

    /// Split a reply into the primary and secondary-language summaries.
    ///
    /// A reply without the marker is kept whole as the primary summary and the
    /// secondary one is replaced by a notice.
    fn split_reply(&self, reply: String) -> PaperSummary {
        let Some(secondary) = &self.secondary_language else {
            return PaperSummary::new(reply);
        };

        let marker = language_marker(secondary);
        let parts = reply
            .split_once(marker.as_str())
            .map(|(primary, rest)| (primary.trim().to_string(), rest.trim().to_string()))
            .filter(|(_, rest)| !rest.is_empty());

        match parts {
            Some((primary, rest)) => PaperSummary::new(primary).with_translation(secondary, rest),
            None => {
                warn!("Reply has no {} marker; {} summary missing", marker, secondary);
                PaperSummary::new(reply)
                    .with_translation(secondary, format!("({} summary could not be generated)", secondary))
            }
        }
    }

    fn user_prompt(paper: &PaperRecord) -> String {
        let authors = paper.authors();
        let mut author_line = authors
            .iter()
            .take(PROMPT_AUTHOR_LIMIT)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if authors.len() > PROMPT_AUTHOR_LIMIT {
            author_line.push_str("...");
        }

        format!(
            "Please summarize the following paper.\n\n\
             Title: {}\n\n\
             Authors: {}\n\n\
             Journal: {}\n\n\
             Abstract:\n{}",
            paper.title(),
            author_line,
            paper.journal(),
            paper.abstract_text()
        )
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl Summarizer for AnthropicSummarizer {
    async fn summarize(&self, paper: &PaperRecord) -> SummarizerResult<PaperSummary> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: self.system_prompt(),
            messages: vec![Message {
                role: "user",
                content: Self::user_prompt(paper),
            }],
        };
        let url = format!("{}/messages", self.base_url);
        debug!(model = self.model.as_str(), paper = paper.identifier(), "Requesting summary");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await?;
        if !status.is_success() {
            return Err(SummarizerError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&body_text)
            .map_err(|e| SummarizerError::InvalidResponse(format!("Invalid JSON: {}", e)))?;

        let reply = parsed
            .content
            .into_iter()
            .next()
            .filter(|block| block.kind == "text")
            .and_then(|block| block.text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| SummarizerError::InvalidResponse("No text content".to_string()))?;

        Ok(self.split_reply(reply))
    }
}

/// Marker line separating the two languages, e.g. `---JAPANESE---`.
fn language_marker(language: &str) -> String {
    format!("---{}---", language.to_uppercase())
}

/// Dry-run summarizer returning a fixed text.
#[derive(Debug, Default)]
pub struct PlaceholderSummarizer;

#[async_trait]
impl Summarizer for PlaceholderSummarizer {
    async fn summarize(&self, _paper: &PaperRecord) -> SummarizerResult<PaperSummary> {
        Ok(PaperSummary::new(PLACEHOLDER_SUMMARY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperSource;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn paper(authors: &[&str]) -> PaperRecord {
        PaperRecord::new(
            PaperSource::PubMed,
            "40000001",
            "A pangenome graph",
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        )
        .unwrap()
        .with_abstract("We built a graph.")
        .with_authors(authors.iter().copied())
        .with_journal("Genome Research")
    }

    fn summarizer(base_url: &str) -> AnthropicSummarizer {
        AnthropicSummarizer::new("test-key", &SummarizerConfig::default())
            .unwrap()
            .with_base_url(base_url)
    }

    fn bilingual_summarizer(base_url: &str) -> AnthropicSummarizer {
        let config = SummarizerConfig {
            secondary_language: Some("Japanese".to_string()),
            ..SummarizerConfig::default()
        };
        AnthropicSummarizer::new("test-key", &config)
            .unwrap()
            .with_base_url(base_url)
    }

    async fn mount_reply(mock_server: &MockServer, text: &str) {
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": text}]
            })))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    #[test]
    fn test_user_prompt_elides_authors() {
        let prompt = AnthropicSummarizer::user_prompt(&paper(&["A", "B", "C", "D", "E", "F"]));
        assert!(prompt.contains("Authors: A, B, C, D, E..."));
        assert!(prompt.contains("Title: A pangenome graph"));
        assert!(prompt.contains("Journal: Genome Research"));
        assert!(prompt.ends_with("Abstract:\nWe built a graph."));

        let short = AnthropicSummarizer::user_prompt(&paper(&["A", "B"]));
        assert!(short.contains("Authors: A, B\n"));
    }

    #[test]
    fn test_system_prompt_uses_language() {
        let config = SummarizerConfig {
            language: "Japanese".to_string(),
            ..SummarizerConfig::default()
        };
        let summarizer = AnthropicSummarizer::new("k", &config).unwrap();
        let prompt = summarizer.system_prompt();
        assert!(prompt.contains("in Japanese"));
        assert!(prompt.contains("## Impact & Perspectives"));
        assert!(!prompt.contains("---"));
    }

    #[test]
    fn test_system_prompt_names_marker_for_secondary_language() {
        let prompt = bilingual_summarizer("http://localhost").system_prompt();
        assert!(prompt.contains("Write the summary in English"));
        assert!(prompt.contains("a line containing only ---JAPANESE---"));
        assert!(prompt.contains("same summary in Japanese"));
        assert!(prompt.contains("second-last and last authors"));
    }

    #[tokio::test]
    async fn test_summarize_returns_first_text_block() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({"model": "claude-opus-4-5-20251101", "max_tokens": 5000})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": "  ## Background\nGraphs.  "}],
                "stop_reason": "end_turn"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let summary = summarizer(&mock_server.uri()).summarize(&paper(&["A"])).await.unwrap();
        assert_eq!(summary, PaperSummary::new("## Background\nGraphs."));
    }

    #[tokio::test]
    async fn test_summarize_splits_on_language_marker() {
        let mock_server = MockServer::start().await;
        mount_reply(
            &mock_server,
            "## Background\nGraphs.\n\n---JAPANESE---\n\n## 背景\nグラフ。\n",
        )
        .await;

        let summary = bilingual_summarizer(&mock_server.uri())
            .summarize(&paper(&["A"]))
            .await
            .unwrap();
        assert_eq!(summary.text, "## Background\nGraphs.");
        let translation = summary.translation.unwrap();
        assert_eq!(translation.language, "Japanese");
        assert_eq!(translation.text, "## 背景\nグラフ。");
    }

    #[tokio::test]
    async fn test_summarize_without_marker_keeps_whole_reply() {
        let mock_server = MockServer::start().await;
        mount_reply(&mock_server, "## Background\nGraphs only.").await;

        let summary = bilingual_summarizer(&mock_server.uri())
            .summarize(&paper(&["A"]))
            .await
            .unwrap();
        assert_eq!(summary.text, "## Background\nGraphs only.");
        assert_eq!(
            summary.translation.unwrap().text,
            "(Japanese summary could not be generated)"
        );
    }

    #[tokio::test]
    async fn test_marker_ignored_without_secondary_language() {
        let mock_server = MockServer::start().await;
        mount_reply(&mock_server, "English.\n---JAPANESE---\n日本語。").await;

        let summary = summarizer(&mock_server.uri()).summarize(&paper(&["A"])).await.unwrap();
        assert_eq!(summary.text, "English.\n---JAPANESE---\n日本語。");
        assert!(summary.translation.is_none());
    }

    #[tokio::test]
    async fn test_summarize_http_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&mock_server)
            .await;

        let err = summarizer(&mock_server.uri())
            .summarize(&paper(&["A"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::Status { status: 529, .. }));
    }

    #[tokio::test]
    async fn test_summarize_without_text_block() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
            .mount(&mock_server)
            .await;

        let err = summarizer(&mock_server.uri())
            .summarize(&paper(&["A"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_placeholder() {
        let summary = PlaceholderSummarizer.summarize(&paper(&[])).await.unwrap();
        assert_eq!(summary, PaperSummary::new(PLACEHOLDER_SUMMARY));
    }
}
