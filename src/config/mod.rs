//! Configuration loading.
//!
//! Settings come from a YAML file; secrets come from environment variables.
//! Every section is optional and falls back to defaults, so a file containing
//! only `keywords` is a valid configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::embedding::fastembed::DEFAULT_MODEL_NAME;
use crate::filter::{FilterCriteria, DEFAULT_SIMILARITY_THRESHOLD};
use crate::models::PaperSource;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Environment variable holding the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Environment variable holding the Slack bot token.
pub const SLACK_BOT_TOKEN_ENV: &str = "SLACK_BOT_TOKEN";

/// Environment variable holding the optional NCBI API key.
pub const PUBMED_API_KEY_ENV: &str = "PUBMED_API_KEY";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// A secret required for this run is not set
    #[error("Environment variable {0} is not set")]
    MissingSecret(&'static str),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where to look for papers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JournalsConfig {
    /// PubMed journal names
    pub pubmed: Vec<String>,

    /// Preprint servers ("bioRxiv", "medRxiv")
    pub preprint: Vec<String>,

    /// Optional category allow-list per preprint server
    pub preprint_categories: HashMap<String, Vec<String>>,
}

/// What to match papers against.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeywordsConfig {
    pub topics: Vec<String>,
    pub authors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// How many days back to search, ending yesterday
    pub days_back: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { days_back: 1 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub similarity_threshold: f32,

    /// Embedding model name
    pub model: String,

    /// Model cache directory
    pub cache_dir: Option<PathBuf>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            model: DEFAULT_MODEL_NAME.to_string(),
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub model: String,
    pub max_tokens: u32,

    /// Language the summaries are written in
    pub language: String,

    /// Optional second language, written after the primary summary
    pub secondary_language: Option<String>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: "claude-opus-4-5-20251101".to_string(),
            max_tokens: 5000,
            language: "English".to_string(),
            secondary_language: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub channel: String,

    /// Post a "nothing new" message when no paper matched
    pub notify_when_empty: bool,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            channel: "#research-papers".to_string(),
            notify_when_empty: true,
        }
    }
}

/// Secrets read from the environment.
#[derive(Clone, Default)]
pub struct Secrets {
    pub anthropic_api_key: Option<String>,
    pub slack_bot_token: Option<String>,
    pub pubmed_api_key: Option<String>,
}

impl Secrets {
    /// Read secrets from the process environment; blank values count as unset.
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            anthropic_api_key: read(ANTHROPIC_API_KEY_ENV),
            slack_bot_token: read(SLACK_BOT_TOKEN_ENV),
            pubmed_api_key: read(PUBMED_API_KEY_ENV),
        }
    }

    /// The Anthropic key, required for real summarization.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingSecret` when unset
    pub fn require_anthropic(&self) -> ConfigResult<&str> {
        self.anthropic_api_key
            .as_deref()
            .ok_or(ConfigError::MissingSecret(ANTHROPIC_API_KEY_ENV))
    }

    /// The Slack token, required for posting.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingSecret` when unset
    pub fn require_slack(&self) -> ConfigResult<&str> {
        self.slack_bot_token
            .as_deref()
            .ok_or(ConfigError::MissingSecret(SLACK_BOT_TOKEN_ENV))
    }
}

// Keep tokens out of logs
impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("anthropic_api_key", &self.anthropic_api_key.is_some())
            .field("slack_bot_token", &self.slack_bot_token.is_some())
            .field("pubmed_api_key", &self.pubmed_api_key.is_some())
            .finish()
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub journals: JournalsConfig,
    pub keywords: KeywordsConfig,
    pub search: SearchConfig,
    pub filter: FilterConfig,
    pub summarizer: SummarizerConfig,
    pub slack: SlackConfig,

    #[serde(skip)]
    pub secrets: Secrets,
}

impl Config {
    /// Load a YAML file and read secrets from the environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed or validated
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&text)?;
        config.secrets = Secrets::from_env();
        Ok(config)
    }

    /// Parse and validate YAML text. Secrets are left empty.
    ///
    /// # Errors
    /// Returns `ConfigError` on malformed YAML or invalid values
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        // An empty document deserializes to unit, not to a mapping
        let mut config: Config = if text.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.keywords.topics = dedup_entries(&config.keywords.topics);
        config.keywords.authors = dedup_entries(&config.keywords.authors);
        config.summarizer.secondary_language = config
            .summarizer
            .secondary_language
            .take()
            .map(|language| language.trim().to_string())
            .filter(|language| !language.is_empty());
        config.validate()?;
        Ok(config)
    }

    /// Replace the similarity threshold, re-validating it.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if the new threshold is out of range
    pub fn with_threshold(mut self, threshold: f32) -> ConfigResult<Self> {
        self.filter.similarity_threshold = threshold;
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges and server names.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` describing the first problem found
    pub fn validate(&self) -> ConfigResult<()> {
        let threshold = self.filter.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "filter.similarity_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.search.days_back == 0 {
            return Err(ConfigError::Invalid("search.days_back must be at least 1".to_string()));
        }
        self.preprint_servers()?;
        Ok(())
    }

    /// Configured preprint servers, parsed.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for anything other than bioRxiv or medRxiv
    pub fn preprint_servers(&self) -> ConfigResult<Vec<PaperSource>> {
        self.journals
            .preprint
            .iter()
            .map(|name| match name.parse::<PaperSource>() {
                Ok(source @ (PaperSource::BioRxiv | PaperSource::MedRxiv)) => Ok(source),
                _ => Err(ConfigError::Invalid(format!(
                    "Unknown preprint server '{}' (expected bioRxiv or medRxiv)",
                    name
                ))),
            })
            .collect()
    }

    /// Category allow-list for a preprint server, matched case-insensitively
    /// on the server name.
    pub fn categories_for(&self, server: PaperSource) -> Option<Vec<String>> {
        self.journals
            .preprint_categories
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(server.as_str()))
            .map(|(_, categories)| categories.clone())
    }

    /// Filter engine criteria derived from this configuration.
    pub fn filter_criteria(&self) -> FilterCriteria {
        FilterCriteria {
            topics: self.keywords.topics.clone(),
            authors: self.keywords.authors.clone(),
            similarity_threshold: self.filter.similarity_threshold,
        }
    }
}

/// Trim entries, drop blanks and repeats, keep first-seen order.
fn dedup_entries(entries: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(entries.len());
    for entry in entries {
        let entry = entry.trim();
        if !entry.is_empty() && !seen.iter().any(|s: &String| s == entry) {
            seen.push(entry.to_string());
        }
    }
    seen
}
