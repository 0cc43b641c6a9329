//! Core data models for the paper digest pipeline.
//!
//! This module contains the records shared by every stage: the papers produced by
//! fetchers, the match results produced by the filter engine, and the summarized
//! papers handed to notifiers.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while constructing model values.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// A required field was empty or blank
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Unknown bibliographic source name
    #[error("Unknown paper source: {0}")]
    UnknownSource(String),
}

/// Result type for model construction.
pub type ModelResult<T> = Result<T, ModelError>;

/// Bibliographic source a paper was discovered in.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaperSource {
    /// PubMed (NCBI E-utilities)
    PubMed,

    /// bioRxiv preprint server
    BioRxiv,

    /// medRxiv preprint server
    MedRxiv,
}

impl PaperSource {
    /// Lowercase identifier, also used as the preprint API server segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperSource::PubMed => "pubmed",
            PaperSource::BioRxiv => "biorxiv",
            PaperSource::MedRxiv => "medrxiv",
        }
    }
}

impl fmt::Display for PaperSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaperSource {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pubmed" => Ok(PaperSource::PubMed),
            "biorxiv" => Ok(PaperSource::BioRxiv),
            "medrxiv" => Ok(PaperSource::MedRxiv),
            other => Err(ModelError::UnknownSource(other.to_string())),
        }
    }
}

/// One discovered publication.
///
/// Records are validated once, when a fetcher builds them, and are immutable
/// afterwards: fields are private and only exposed through accessors. The
/// `with_*` methods consume the record and are meant for the construction site.
///
/// The order of `authors` is whatever the source returned and carries no
/// meaning for matching.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaperRecord {
    title: String,
    abstract_text: String,
    authors: Vec<String>,
    source: PaperSource,
    published_date: NaiveDate,
    identifier: String,
    url: String,
    journal: String,
}

impl PaperRecord {
    /// Create a record with the required fields.
    ///
    /// Title and identifier are trimmed and must be non-empty. The URL defaults
    /// to an empty string until [`PaperRecord::with_url`] is applied, and the
    /// journal defaults to the source name.
    ///
    /// # Errors
    /// Returns `ModelError::MissingField` if the title or identifier is blank
    pub fn new(
        source: PaperSource,
        identifier: impl Into<String>,
        title: impl Into<String>,
        published_date: NaiveDate,
    ) -> ModelResult<Self> {
        let identifier = identifier.into().trim().to_string();
        if identifier.is_empty() {
            return Err(ModelError::MissingField("identifier"));
        }
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(ModelError::MissingField("title"));
        }

        Ok(Self {
            title,
            abstract_text: String::new(),
            authors: Vec::new(),
            source,
            published_date,
            identifier,
            url: String::new(),
            journal: source.as_str().to_string(),
        })
    }

    /// Set the abstract (may be empty).
    pub fn with_abstract(mut self, abstract_text: impl Into<String>) -> Self {
        self.abstract_text = abstract_text.into().trim().to_string();
        self
    }

    /// Set the raw author names, dropping blank entries.
    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors
            .into_iter()
            .map(|a| a.into().trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        self
    }

    /// Set the display URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the journal or venue label used for display.
    pub fn with_journal(mut self, journal: impl Into<String>) -> Self {
        let journal = journal.into();
        if !journal.trim().is_empty() {
            self.journal = journal.trim().to_string();
        }
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn abstract_text(&self) -> &str {
        &self.abstract_text
    }

    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    pub fn source(&self) -> PaperSource {
        self.source
    }

    pub fn published_date(&self) -> NaiveDate {
        self.published_date
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn journal(&self) -> &str {
        &self.journal
    }

    /// Text used for topic scoring: title and abstract, or the title alone
    /// when the abstract is empty.
    pub fn match_text(&self) -> String {
        if self.abstract_text.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.abstract_text)
        }
    }
}

/// Outcome of evaluating one paper against the configured criteria.
///
/// `reasons` holds one entry per satisfied criterion, authors first, then
/// topics. An excluded paper has no reasons.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MatchResult {
    /// Whether the paper passed either criterion
    pub matched: bool,

    /// Human-readable reasons, in evaluation order
    pub reasons: Vec<String>,

    /// Highest topic similarity in [0, 1]
    pub best_topic_score: f32,

    /// Topic achieving `best_topic_score`, if any topic was scored
    pub best_topic: Option<String>,

    /// Tracked authors found on the paper, in configured order
    pub matched_authors: Vec<String>,
}

impl MatchResult {
    /// The reason string shown in notifications (`"; "`-joined reasons).
    pub fn reason(&self) -> String {
        self.reasons.join("; ")
    }
}

/// A paper that passed the filter, paired with why.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MatchedPaper {
    pub paper: PaperRecord,
    pub result: MatchResult,
}

/// Summary in a second language.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Translation {
    pub language: String,
    pub text: String,
}

/// Generated summary of one paper.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaperSummary {
    /// Summary in the primary language
    pub text: String,

    /// Second-language summary, when one was requested
    pub translation: Option<Translation>,
}

impl PaperSummary {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            translation: None,
        }
    }

    pub fn with_translation(mut self, language: impl Into<String>, text: impl Into<String>) -> Self {
        self.translation = Some(Translation {
            language: language.into(),
            text: text.into(),
        });
        self
    }
}

/// A matched paper with its generated summary.
///
/// `summary` is `None` when summarization failed or was skipped.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummarizedPaper {
    pub paper: PaperRecord,
    pub result: MatchResult,
    pub summary: Option<PaperSummary>,
}
