//! Delivery of the digest.
//!
//! `SlackNotifier` posts Block Kit messages through `chat.postMessage`.
//! `ConsoleNotifier` prints a table (or JSON) to stdout for dry runs.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SlackConfig;
use crate::models::{PaperSource, SummarizedPaper};
use crate::provider::REQUEST_TIMEOUT;

/// Slack Web API base URL.
pub const SLACK_API_BASE_URL: &str = "https://slack.com/api";

/// Slack rejects messages with more blocks than this.
pub const MAX_BLOCKS_PER_MESSAGE: usize = 50;

/// Slack's limit on the text of one section block.
const SECTION_TEXT_LIMIT: usize = 3000;

/// Authors shown per paper before collapsing into "et al.".
const DISPLAY_AUTHOR_LIMIT: usize = 3;

const FALLBACK_TEXT: &str = "Paper digest";

/// Errors that can occur while delivering a digest.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// Request could not be sent or the body could not be read
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status} from Slack: {body}")]
    Status { status: u16, body: String },

    /// Slack answered with `"ok": false`
    #[error("Slack API error: {0}")]
    Api(String),

    /// Output could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for notifier operations.
pub type NotifierResult<T> = Result<T, NotifierError>;

/// Trait for digest destinations.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the digest. `papers` may be empty.
    ///
    /// # Errors
    /// Returns `NotifierError` if delivery fails
    async fn notify(&self, papers: &[SummarizedPaper]) -> NotifierResult<()>;
}

/// "A, B, C et al. (7 authors)" style author line.
pub fn author_line(authors: &[String]) -> String {
    let mut line = authors
        .iter()
        .take(DISPLAY_AUTHOR_LIMIT)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if authors.len() > DISPLAY_AUTHOR_LIMIT {
        line.push_str(&format!(" et al. ({} authors)", authors.len()));
    }
    line
}

/// Cut `text` to at most `max_chars` characters, marking the cut with "...".
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn mrkdwn_section(text: String) -> Value {
    json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": truncate_chars(&text, SECTION_TEXT_LIMIT) }
    })
}

fn header_block(today: NaiveDate) -> Value {
    json!({
        "type": "header",
        "text": {
            "type": "plain_text",
            "text": format!("📖 Paper digest ({})", today.format("%Y-%m-%d")),
            "emoji": true
        }
    })
}

/// Posts the digest to a Slack channel.
pub struct SlackNotifier {
    client: reqwest::Client,
    token: String,
    base_url: String,
    channel: String,
    notify_when_empty: bool,
}

impl SlackNotifier {
    /// Create a notifier for the configured channel.
    ///
    /// # Errors
    /// Returns `NotifierError::Request` if the HTTP client cannot be built
    pub fn new(token: impl Into<String>, config: &SlackConfig) -> NotifierResult<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            token: token.into(),
            base_url: SLACK_API_BASE_URL.to_string(),
            channel: config.channel.clone(),
            notify_when_empty: config.notify_when_empty,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// All blocks for one digest. Empty when there is nothing to post.
    pub fn build_blocks(&self, papers: &[SummarizedPaper], today: NaiveDate) -> Vec<Value> {
        if papers.is_empty() {
            if !self.notify_when_empty {
                return Vec::new();
            }
            return vec![
                header_block(today),
                mrkdwn_section("No new matching papers today.".to_string()),
            ];
        }

        let mut blocks = vec![
            header_block(today),
            mrkdwn_section(format!("Found *{}* matching papers.", papers.len())),
            json!({ "type": "divider" }),
        ];
        for paper in papers {
            blocks.extend(Self::paper_blocks(paper));
        }
        blocks
    }

    fn paper_blocks(item: &SummarizedPaper) -> Vec<Value> {
        let paper = &item.paper;
        let title = if paper.url().is_empty() {
            format!("*{}*", paper.title())
        } else {
            format!("*<{}|{}>*", paper.url(), paper.title())
        };
        let summary = item
            .summary
            .as_ref()
            .map_or("_No summary available._", |s| s.text.as_str());

        let mut blocks = vec![
            mrkdwn_section(title),
            json!({
                "type": "context",
                "elements": [{
                    "type": "mrkdwn",
                    "text": format!("📚 {} | 👤 {}", paper.journal(), author_line(paper.authors()))
                }]
            }),
            mrkdwn_section(format!("🔍 *Match reason:* {}", item.result.reason())),
            mrkdwn_section(format!("📝 *Summary:*\n{}", summary)),
        ];
        if let Some(translation) = item.summary.as_ref().and_then(|s| s.translation.as_ref()) {
            blocks.push(mrkdwn_section(format!(
                "🌐 *Summary ({}):*\n{}",
                translation.language, translation.text
            )));
        }
        blocks.push(json!({ "type": "divider" }));
        blocks
    }

    async fn post_blocks(&self, blocks: &[Value]) -> NotifierResult<()> {
        let body = json!({
            "channel": self.channel,
            "blocks": blocks,
            "text": FALLBACK_TEXT,
        });

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await?;
        if !status.is_success() {
            return Err(NotifierError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let reply: Value = serde_json::from_str(&body_text)?;
        if reply.get("ok") != Some(&Value::Bool(true)) {
            let error = reply
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            warn!(error = %error, "Slack API returned error");
            return Err(NotifierError::Api(error.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, papers: &[SummarizedPaper]) -> NotifierResult<()> {
        let blocks = self.build_blocks(papers, Local::now().date_naive());
        if blocks.is_empty() {
            info!("No papers to post and empty notifications are disabled");
            return Ok(());
        }

        let chunks: Vec<&[Value]> = blocks.chunks(MAX_BLOCKS_PER_MESSAGE).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            debug!("Posting message {}/{} ({} blocks)", i + 1, chunks.len(), chunk.len());
            self.post_blocks(chunk).await?;
        }
        info!("Posted {} papers to {}", papers.len(), self.channel);
        Ok(())
    }
}

/// Prints the digest to stdout.
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    json: bool,
}

impl ConsoleNotifier {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Render the digest as it would be printed.
    ///
    /// # Errors
    /// Returns `NotifierError::Serialize` if JSON output fails
    pub fn render(&self, papers: &[SummarizedPaper]) -> NotifierResult<String> {
        if self.json {
            return Ok(serde_json::to_string_pretty(papers)?);
        }
        if papers.is_empty() {
            return Ok("No matching papers.".to_string());
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(vec![
            Cell::new("Rank").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Source").add_attribute(Attribute::Bold),
            Cell::new("Reason").add_attribute(Attribute::Bold),
            Cell::new("URL").add_attribute(Attribute::Bold),
        ]);

        for (idx, item) in papers.iter().enumerate() {
            let color = match item.paper.source() {
                PaperSource::PubMed => Color::Cyan,
                PaperSource::BioRxiv | PaperSource::MedRxiv => Color::Yellow,
            };
            table.add_row(vec![
                Cell::new(idx + 1),
                Cell::new(truncate_chars(item.paper.title(), 60)),
                Cell::new(item.paper.journal()).fg(color),
                Cell::new(item.result.reason()),
                Cell::new(item.paper.url()),
            ]);
        }

        let mut output = table.to_string();
        for (idx, item) in papers.iter().enumerate() {
            output.push_str(&format!(
                "\n\n[{}] {}\n{}",
                idx + 1,
                item.paper.title(),
                item.summary.as_ref().map_or("(no summary)", |s| s.text.as_str())
            ));
            if let Some(translation) = item.summary.as_ref().and_then(|s| s.translation.as_ref()) {
                output.push_str(&format!("\n\n({})\n{}", translation.language, translation.text));
            }
        }
        Ok(output)
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, papers: &[SummarizedPaper]) -> NotifierResult<()> {
        println!("{}", self.render(papers)?);
        Ok(())
    }
}
