//! bioRxiv and medRxiv provider using the public `details` API.
//!
//! The API pages results 100 at a time through a cursor and reports the total
//! count in the first message object.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{http_client, squash_whitespace, PaperProvider, ProviderError, ProviderResult, SearchWindow};
use crate::models::{PaperRecord, PaperSource};

/// Base URL of the `details` endpoint.
pub const DETAILS_BASE_URL: &str = "https://api.biorxiv.org/details";

const DEFAULT_MAX_PAPERS: usize = 2000;

/// Fetches preprints posted to bioRxiv or medRxiv.
pub struct BioRxivProvider {
    client: reqwest::Client,
    base_url: String,
    server: PaperSource,
    categories: Vec<String>,
    max_papers: usize,
}

impl BioRxivProvider {
    /// Create a provider for one preprint server.
    ///
    /// An empty `categories` list accepts every category; otherwise matching
    /// is case-insensitive.
    ///
    /// # Errors
    /// Returns `ProviderError::ConfigError` if `server` is not a preprint server
    pub fn new(server: PaperSource, categories: Vec<String>) -> ProviderResult<Self> {
        if server == PaperSource::PubMed {
            return Err(ProviderError::ConfigError(
                "PubMed is not a preprint server".to_string(),
            ));
        }
        Ok(Self {
            client: http_client()?,
            base_url: DETAILS_BASE_URL.to_string(),
            server,
            categories: categories
                .into_iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
            max_papers: DEFAULT_MAX_PAPERS,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_papers(mut self, max_papers: usize) -> Self {
        self.max_papers = max_papers;
        self
    }

    fn accepts_category(&self, category: &str) -> bool {
        self.categories.is_empty() || self.categories.contains(&category.trim().to_lowercase())
    }

    fn page_url(&self, window: &SearchWindow, cursor: usize) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.base_url,
            self.server.as_str(),
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d"),
            cursor
        )
    }

    async fn fetch_page(&self, window: &SearchWindow, cursor: usize) -> ProviderResult<DetailsResponse> {
        let url = self.page_url(window, cursor);
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }

    fn to_record(&self, item: PreprintItem, window: &SearchWindow) -> Option<PaperRecord> {
        let date = NaiveDate::parse_from_str(item.date.trim(), "%Y-%m-%d").unwrap_or(window.end);
        let doi = item.doi.trim().to_string();
        let authors = item
            .authors
            .split(';')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();

        let category = item.category.trim();
        let journal = if category.is_empty() {
            self.name().to_string()
        } else {
            format!("{} ({})", self.name(), category)
        };

        let record = PaperRecord::new(self.server, doi.clone(), squash_whitespace(&item.title), date)
            .map_err(|e| warn!("Skipping {} preprint: {}", self.name(), e))
            .ok()?;

        Some(
            record
                .with_abstract(squash_whitespace(&item.abstract_text))
                .with_authors(authors)
                .with_journal(journal)
                .with_url(format!("https://doi.org/{}", doi)),
        )
    }
}

#[async_trait]
impl PaperProvider for BioRxivProvider {
    async fn fetch_papers(&self, window: &SearchWindow) -> ProviderResult<Vec<PaperRecord>> {
        let mut papers = Vec::new();
        let mut cursor = 0;

        while papers.len() < self.max_papers {
            let page = self.fetch_page(window, cursor).await?;
            if page.collection.is_empty() {
                break;
            }

            let page_len = page.collection.len();
            for item in page.collection {
                if !self.accepts_category(&item.category) {
                    continue;
                }
                if let Some(record) = self.to_record(item, window) {
                    papers.push(record);
                }
                if papers.len() >= self.max_papers {
                    break;
                }
            }

            let Some(total) = page.messages.first().and_then(DetailsMessage::total) else {
                break;
            };
            cursor += page_len;
            if cursor >= total {
                break;
            }
        }

        info!("{} returned {} preprints", self.name(), papers.len());
        Ok(papers)
    }

    fn name(&self) -> &str {
        match self.server {
            PaperSource::MedRxiv => "medRxiv",
            _ => "bioRxiv",
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    messages: Vec<DetailsMessage>,
    #[serde(default)]
    collection: Vec<PreprintItem>,
}

#[derive(Debug, Deserialize)]
struct DetailsMessage {
    #[serde(default)]
    total: Option<serde_json::Value>,
}

impl DetailsMessage {
    /// The API reports `total` as either a number or a numeric string.
    fn total(&self) -> Option<usize> {
        match self.total.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().map(|n| n as usize),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PreprintItem {
    #[serde(default)]
    doi: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: String,
    #[serde(default, rename = "abstract")]
    abstract_text: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    category: String,
}
