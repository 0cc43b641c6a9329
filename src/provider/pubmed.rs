//! PubMed provider using the NCBI E-utilities API.
//!
//! Searching is a two-step exchange: `esearch` returns the PMIDs published in
//! the window for the configured journals, then `efetch` returns the article
//! XML for those PMIDs in batches.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{http_client, squash_whitespace, PaperProvider, ProviderError, ProviderResult, SearchWindow};
use crate::models::{PaperRecord, PaperSource};

/// E-utilities base URL.
pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

const DEFAULT_MAX_RESULTS: usize = 500;
const DEFAULT_BATCH_SIZE: usize = 200;

/// Pause between efetch batches without an API key (NCBI allows 3 req/s).
const UNAUTHENTICATED_BATCH_DELAY: Duration = Duration::from_millis(340);

/// Fetches recent journal articles from PubMed.
pub struct PubMedProvider {
    client: reqwest::Client,
    base_url: String,
    journals: Vec<String>,
    api_key: Option<String>,
    max_results: usize,
    batch_size: usize,
}

impl PubMedProvider {
    /// Create a provider for the given journal names.
    ///
    /// # Errors
    /// Returns `ProviderError::ConfigError` if no journals are given, or
    /// `ProviderError::Http` if the HTTP client cannot be built
    pub fn new(journals: Vec<String>, api_key: Option<String>) -> ProviderResult<Self> {
        if journals.is_empty() {
            return Err(ProviderError::ConfigError("No PubMed journals configured".to_string()));
        }
        Ok(Self {
            client: http_client()?,
            base_url: EUTILS_BASE_URL.to_string(),
            journals,
            api_key,
            max_results: DEFAULT_MAX_RESULTS,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Point the provider at a different E-utilities endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Build the esearch term for the journals and date window.
    pub fn build_query(journals: &[String], window: &SearchWindow) -> String {
        let journal_filter = journals
            .iter()
            .map(|j| format!("\"{}\"[Journal]", j))
            .collect::<Vec<_>>()
            .join(" OR ");

        format!(
            "({}) AND (\"{}\"[Date - Publication] : \"{}\"[Date - Publication])",
            journal_filter,
            window.start.format("%Y/%m/%d"),
            window.end.format("%Y/%m/%d")
        )
    }

    fn params(&self, extra: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        let mut params = vec![("db", "pubmed".to_string())];
        params.extend(extra);
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// Run esearch and return matching PMIDs.
    async fn search(&self, window: &SearchWindow) -> ProviderResult<Vec<String>> {
        let query = Self::build_query(&self.journals, window);
        debug!("PubMed query: {}", query);

        let params = self.params(vec![
            ("term", query),
            ("retmax", self.max_results.to_string()),
            ("retmode", "json".to_string()),
            ("sort", "pub_date".to_string()),
        ]);

        let response: SearchResponse = self
            .client
            .get(format!("{}/esearch.fcgi", self.base_url))
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.esearchresult.idlist)
    }

    /// Run efetch over `pmids` in batches and parse the articles.
    async fn fetch_details(&self, pmids: &[String]) -> ProviderResult<Vec<PaperRecord>> {
        let fetched_on = Utc::now().date_naive();
        let mut papers = Vec::with_capacity(pmids.len());
        let batches: Vec<&[String]> = pmids.chunks(self.batch_size).collect();

        for (i, batch) in batches.iter().enumerate() {
            let params = self.params(vec![
                ("id", batch.join(",")),
                ("retmode", "xml".to_string()),
            ]);

            let xml = self
                .client
                .get(format!("{}/efetch.fcgi", self.base_url))
                .query(&params)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;

            papers.extend(parse_efetch_xml(&xml, fetched_on)?);

            if self.api_key.is_none() && i + 1 < batches.len() {
                tokio::time::sleep(UNAUTHENTICATED_BATCH_DELAY).await;
            }
        }

        Ok(papers)
    }
}

#[async_trait]
impl PaperProvider for PubMedProvider {
    async fn fetch_papers(&self, window: &SearchWindow) -> ProviderResult<Vec<PaperRecord>> {
        let pmids = self.search(window).await?;
        info!("PubMed returned {} PMIDs", pmids.len());
        if pmids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_details(&pmids).await
    }

    fn name(&self) -> &str {
        "PubMed"
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    esearchresult: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// Parse an efetch `PubmedArticleSet` document.
///
/// Articles lacking a PMID or title are skipped. Articles whose publication
/// date cannot be read get `fallback_date`.
///
/// # Errors
/// Returns `ProviderError::ParseError` if the XML is malformed
pub fn parse_efetch_xml(xml: &str, fallback_date: NaiveDate) -> ProviderResult<Vec<PaperRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut article: Option<ArticleDraft> = None;
    let mut author: Option<AuthorDraft> = None;
    let mut capture: Option<Capture> = None;
    let mut papers = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ProviderError::ParseError(format!("PubMed XML: {}", e)))?;

        match event {
            Event::Start(e) => {
                let name = element_name(&e);
                let parent = stack.last().map(String::as_str).unwrap_or("");

                match name.as_str() {
                    "PubmedArticle" => article = Some(ArticleDraft::default()),
                    "Author" if parent == "AuthorList" => author = Some(AuthorDraft::default()),
                    _ => {}
                }

                if capture.is_none() && article.is_some() {
                    if let Some(field) = Field::for_element(&name, parent, &e, author.is_some()) {
                        capture = Some(Capture {
                            field,
                            depth: stack.len() + 1,
                            text: String::new(),
                        });
                    }
                }
                stack.push(name);
            }
            Event::Text(t) => {
                if let Some(capture) = capture.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| ProviderError::ParseError(format!("PubMed XML text: {}", e)))?;
                    capture.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(capture) = capture.as_mut() {
                    capture.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if capture.as_ref().is_some_and(|c| c.depth == stack.len()) {
                    if let (Some(done), Some(draft)) = (capture.take(), article.as_mut()) {
                        done.apply(draft, author.as_mut());
                    }
                }

                match stack.pop().as_deref() {
                    Some("Author") => {
                        if let (Some(finished), Some(draft)) = (author.take(), article.as_mut()) {
                            if let Some(display) = finished.display_name() {
                                draft.authors.push(display);
                            }
                        }
                    }
                    Some("PubmedArticle") => {
                        if let Some(draft) = article.take() {
                            match draft.into_record(fallback_date) {
                                Some(record) => papers.push(record),
                                None => warn!("Skipping PubMed article without PMID or title"),
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(papers)
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

#[derive(Debug)]
enum Field {
    Pmid,
    Title,
    AbstractText { label: Option<String> },
    LastName,
    ForeName,
    CollectiveName,
    Journal,
    Doi,
    Year,
    Month,
    Day,
}

impl Field {
    fn for_element(name: &str, parent: &str, e: &BytesStart<'_>, in_author: bool) -> Option<Self> {
        let field = match (name, parent) {
            ("PMID", "MedlineCitation") => Field::Pmid,
            ("ArticleTitle", _) => Field::Title,
            ("AbstractText", "Abstract") => Field::AbstractText {
                label: attribute(e, "Label"),
            },
            ("LastName", _) if in_author => Field::LastName,
            ("ForeName", _) if in_author => Field::ForeName,
            ("CollectiveName", _) if in_author => Field::CollectiveName,
            ("Title", "Journal") => Field::Journal,
            ("ELocationID", _) if attribute(e, "EIdType").as_deref() == Some("doi") => Field::Doi,
            ("ArticleId", "ArticleIdList") if attribute(e, "IdType").as_deref() == Some("doi") => Field::Doi,
            ("Year", "PubDate") => Field::Year,
            ("Month", "PubDate") => Field::Month,
            ("Day", "PubDate") => Field::Day,
            _ => return None,
        };
        Some(field)
    }
}

struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

impl Capture {
    fn apply(self, draft: &mut ArticleDraft, author: Option<&mut AuthorDraft>) {
        let text = squash_whitespace(&self.text);
        if text.is_empty() {
            return;
        }

        match self.field {
            Field::Pmid => {
                draft.pmid.get_or_insert(text);
            }
            Field::Title if draft.title.is_empty() => draft.title = text,
            Field::Title => {}
            Field::AbstractText { label } => draft.abstract_parts.push(match label {
                Some(label) if !label.is_empty() => format!("{}: {}", label, text),
                _ => text,
            }),
            Field::LastName => {
                if let Some(author) = author {
                    author.last = Some(text);
                }
            }
            Field::ForeName => {
                if let Some(author) = author {
                    author.fore = Some(text);
                }
            }
            Field::CollectiveName => {
                if let Some(author) = author {
                    author.collective = Some(text);
                }
            }
            Field::Journal => draft.journal = text,
            Field::Doi => {
                draft.doi.get_or_insert(text);
            }
            Field::Year => draft.year = text.parse().ok(),
            Field::Month => draft.month = parse_month(&text),
            Field::Day => draft.day = text.parse().ok(),
        }
    }
}

#[derive(Debug, Default)]
struct AuthorDraft {
    last: Option<String>,
    fore: Option<String>,
    collective: Option<String>,
}

impl AuthorDraft {
    fn display_name(self) -> Option<String> {
        match (self.fore, self.last, self.collective) {
            (Some(fore), Some(last), _) => Some(format!("{} {}", fore, last)),
            (None, Some(last), _) => Some(last),
            (_, None, collective) => collective,
        }
    }
}

#[derive(Debug, Default)]
struct ArticleDraft {
    pmid: Option<String>,
    title: String,
    abstract_parts: Vec<String>,
    authors: Vec<String>,
    journal: String,
    doi: Option<String>,
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

impl ArticleDraft {
    fn published_date(&self) -> Option<NaiveDate> {
        let year = self.year?;
        let month = self.month.unwrap_or(1);
        NaiveDate::from_ymd_opt(year, month, self.day.unwrap_or(1))
            .or_else(|| NaiveDate::from_ymd_opt(year, month, 1))
    }

    fn into_record(self, fallback_date: NaiveDate) -> Option<PaperRecord> {
        let pmid = self.pmid.clone()?;
        let date = self.published_date().unwrap_or(fallback_date);
        let url = match &self.doi {
            Some(doi) => format!("https://doi.org/{}", doi),
            None => format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid),
        };

        PaperRecord::new(PaperSource::PubMed, pmid, self.title, date)
            .ok()
            .map(|record| {
                record
                    .with_abstract(self.abstract_parts.join(" "))
                    .with_authors(self.authors)
                    .with_journal(self.journal)
                    .with_url(url)
            })
    }
}

/// Month as a number ("10") or English name/abbreviation ("Oct", "October").
fn parse_month(text: &str) -> Option<u32> {
    if let Ok(n) = text.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let prefix: String = text.chars().take(3).collect::<String>().to_lowercase();
    MONTHS.iter().position(|m| *m == prefix).map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAMPLE_XML: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2024//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_240101.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="Publisher" Owner="NLM">
      <PMID Version="1">40000001</PMID>
      <Article PubModel="Print-Electronic">
        <Journal>
          <JournalIssue CitedMedium="Internet">
            <PubDate><Year>2026</Year><Month>Oct</Month><Day>17</Day></PubDate>
          </JournalIssue>
          <Title>Genome research</Title>
        </Journal>
        <ArticleTitle>A <i>human</i> pangenome &amp; graph reference</ArticleTitle>
        <ELocationID EIdType="doi" ValidYN="Y">10.1101/gr.123</ELocationID>
        <Abstract>
          <AbstractText Label="BACKGROUND">Reference genomes are
            incomplete.</AbstractText>
          <AbstractText Label="RESULTS">We built a graph.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y"><LastName>Eichler</LastName><ForeName>Evan E</ForeName><Initials>EE</Initials></Author>
          <Author ValidYN="Y"><LastName>Logsdon</LastName><Initials>GA</Initials></Author>
          <Author ValidYN="Y"><CollectiveName>Human Pangenome Consortium</CollectiveName></Author>
        </AuthorList>
      </Article>
      <CommentsCorrectionsList>
        <CommentsCorrections RefType="CommentIn"><PMID Version="1">39999999</PMID></CommentsCorrections>
      </CommentsCorrectionsList>
    </MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">40000002</PMID>
      <Article>
        <Journal><JournalIssue><PubDate><MedlineDate>2026 Fall</MedlineDate></PubDate></JournalIssue><Title>Nature</Title></Journal>
        <ArticleTitle>No abstract here</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">40000003</PMID>
      <Article><ArticleTitle></ArticleTitle></Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    fn fallback() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_build_query() {
        let window = SearchWindow::new(
            NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        );
        let query = PubMedProvider::build_query(&["Nature".into(), "Genome Research".into()], &window);
        assert_eq!(
            query,
            "(\"Nature\"[Journal] OR \"Genome Research\"[Journal]) AND \
             (\"2026/10/17\"[Date - Publication] : \"2026/10/18\"[Date - Publication])"
        );
    }

    #[test]
    fn test_parse_efetch_article_fields() {
        let papers = parse_efetch_xml(SAMPLE_XML, fallback()).unwrap();
        assert_eq!(papers.len(), 2, "article without a title is skipped");

        let first = &papers[0];
        assert_eq!(first.identifier(), "40000001");
        assert_eq!(first.title(), "A human pangenome & graph reference");
        assert_eq!(
            first.abstract_text(),
            "BACKGROUND: Reference genomes are incomplete. RESULTS: We built a graph."
        );
        assert_eq!(
            first.authors(),
            &["Evan E Eichler", "Logsdon", "Human Pangenome Consortium"]
        );
        assert_eq!(first.journal(), "Genome research");
        assert_eq!(first.url(), "https://doi.org/10.1101/gr.123");
        assert_eq!(first.published_date(), NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        assert_eq!(first.source(), PaperSource::PubMed);
    }

    #[test]
    fn test_parse_efetch_fallbacks() {
        let papers = parse_efetch_xml(SAMPLE_XML, fallback()).unwrap();
        let second = &papers[1];
        assert_eq!(second.abstract_text(), "");
        assert_eq!(second.url(), "https://pubmed.ncbi.nlm.nih.gov/40000002/");
        assert_eq!(second.published_date(), fallback());
    }

    #[test]
    fn test_parse_malformed_xml() {
        let result = parse_efetch_xml("<PubmedArticleSet><PubmedArticle></Oops>", fallback());
        assert!(matches!(result, Err(ProviderError::ParseError(_))));
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("10"), Some(10));
        assert_eq!(parse_month("Oct"), Some(10));
        assert_eq!(parse_month("September"), Some(9));
        assert_eq!(parse_month("13"), None);
        assert_eq!(parse_month("Fall"), None);
    }

    #[test]
    fn test_requires_journals() {
        assert!(matches!(
            PubMedProvider::new(vec![], None),
            Err(ProviderError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_papers_against_mock_server() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .and(query_param("retmode", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "esearchresult": { "count": "2", "idlist": ["40000001", "40000002"] }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/efetch.fcgi"))
            .and(query_param("id", "40000001,40000002"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_XML))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = PubMedProvider::new(vec!["Genome Research".into()], Some("key".into()))
            .unwrap()
            .with_base_url(mock_server.uri());
        let window = SearchWindow::ending_yesterday(1, fallback());

        let papers = provider.fetch_papers(&window).await.unwrap();
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].identifier(), "40000001");
    }

    #[tokio::test]
    async fn test_fetch_batches_ids() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "esearchresult": { "idlist": ["1", "2", "3"] }
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/efetch.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<PubmedArticleSet/>"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let provider = PubMedProvider::new(vec!["Nature".into()], Some("key".into()))
            .unwrap()
            .with_base_url(mock_server.uri())
            .with_batch_size(2);

        let papers = provider
            .fetch_papers(&SearchWindow::ending_yesterday(1, fallback()))
            .await
            .unwrap();
        assert!(papers.is_empty());
    }

    #[tokio::test]
    async fn test_empty_search_skips_efetch() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "esearchresult": { "idlist": [] }
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/efetch.fcgi"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let provider = PubMedProvider::new(vec!["Nature".into()], None)
            .unwrap()
            .with_base_url(mock_server.uri());
        let papers = provider
            .fetch_papers(&SearchWindow::ending_yesterday(1, fallback()))
            .await
            .unwrap();
        assert!(papers.is_empty());
    }

    #[tokio::test]
    async fn test_http_error_is_surfaced() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let provider = PubMedProvider::new(vec!["Nature".into()], None)
            .unwrap()
            .with_base_url(mock_server.uri());
        let result = provider
            .fetch_papers(&SearchWindow::ending_yesterday(1, fallback()))
            .await;
        assert!(matches!(result, Err(ProviderError::Http(_))));
    }
}
