//! Paper provider module.
//!
//! This module defines the interface for sourcing newly published papers and
//! includes the PubMed and bioRxiv/medRxiv implementations.
//!
//! The `PaperProvider` trait abstracts the source of paper data, so the pipeline
//! can fetch from any mix of sources and tests can substitute canned papers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use thiserror::Error;

use crate::models::PaperRecord;

pub mod biorxiv;
pub mod pubmed;

/// Timeout applied to every provider HTTP request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when fetching papers from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport failure or non-success HTTP status
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid provider configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Inclusive range of publication dates to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SearchWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days_back` days before `today`, excluding today itself.
    ///
    /// With `days_back = 1` the window is just yesterday.
    pub fn ending_yesterday(days_back: u32, today: NaiveDate) -> Self {
        let days_back = u64::from(days_back.max(1));
        Self {
            start: today - Days::new(days_back),
            end: today - Days::new(1),
        }
    }
}

/// Trait for sources of newly published papers.
///
/// Implementations handle their own pagination and rate limiting. Returned
/// papers are not de-duplicated.
#[async_trait]
pub trait PaperProvider: Send + Sync {
    /// Fetch papers published within `window`.
    ///
    /// # Errors
    /// Returns `ProviderError` if the source cannot be queried or its
    /// response cannot be parsed
    async fn fetch_papers(&self, window: &SearchWindow) -> ProviderResult<Vec<PaperRecord>>;

    /// Human-readable name, for logging.
    fn name(&self) -> &str;
}

/// Shared HTTP client settings for providers.
pub(crate) fn http_client() -> ProviderResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("paper-digest/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Collapse runs of whitespace, trimming the ends.
pub(crate) fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_one_day_is_yesterday() {
        let window = SearchWindow::ending_yesterday(1, date(2026, 10, 19));
        assert_eq!(window.start, date(2026, 10, 18));
        assert_eq!(window.end, date(2026, 10, 18));
    }

    #[test]
    fn test_window_several_days() {
        let window = SearchWindow::ending_yesterday(7, date(2026, 3, 3));
        assert_eq!(window.start, date(2026, 2, 24));
        assert_eq!(window.end, date(2026, 3, 2));
    }

    #[test]
    fn test_window_zero_days_treated_as_one() {
        let window = SearchWindow::ending_yesterday(0, date(2026, 10, 19));
        assert_eq!(window.start, window.end);
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(squash_whitespace("  a \n b\t c "), "a b c");
    }
}
