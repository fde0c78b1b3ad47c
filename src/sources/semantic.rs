//! Semantic Scholar research source implementation.

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{is_arxiv_id, BibtexRecord, CrossReference, SourceId};
use crate::sources::{Source, SourceError};
use crate::utils::HttpClient;

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

const PAPER_FIELDS: &str = "citationStyles,externalIds";

/// Semantic Scholar source
///
/// Uses the Graph API `paper` endpoint, which accepts prefixed external ids
/// (`ARXIV:2508.18080`, `DOI:10.1103/...`) as well as its own paper ids, and
/// returns a BibTeX rendering under `citationStyles`. An API key is optional
/// and only raises the rate limit.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarSource {
    pub fn new(http: HttpClient, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: SEMANTIC_API_BASE.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Point the client at another API root (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Add API key to request headers if available
    fn add_api_key_if_present(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref key) = self.api_key {
            builder.header("x-api-key", key)
        } else {
            builder
        }
    }

    async fn paper(&self, paper_id: &str) -> Result<S2Paper, SourceError> {
        let url = format!("{}/paper/{}", self.base_url, urlencoding::encode(paper_id));
        tracing::debug!("Semantic Scholar lookup: {}", paper_id);

        let response = self
            .http
            .send(|c| self.add_api_key_if_present(c.get(&url).query(&[("fields", PAPER_FIELDS)])))
            .await?;

        Ok(serde_json::from_str(&response.text().await?)?)
    }

    async fn record(&self, paper_id: &str, identifier: String) -> Result<BibtexRecord, SourceError> {
        let paper = self.paper(paper_id).await?;
        match paper.citation_styles.and_then(|s| s.bibtex) {
            Some(bibtex) if !bibtex.trim().is_empty() => {
                Ok(BibtexRecord::new(bibtex.trim(), identifier))
            }
            _ => Err(SourceError::NotFound(format!(
                "Semantic Scholar has no BibTeX for {}",
                paper_id
            ))),
        }
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn id(&self) -> SourceId {
        SourceId::SemanticScholar
    }

    async fn fetch_by_key(&self, key: &str) -> Result<BibtexRecord, SourceError> {
        match self.record(&format!("ARXIV:{}", key), format!("arXiv:{}", key)).await {
            Err(e) if e.is_not_found() => {
                self.record(key, format!("paper {}", key)).await
            }
            other => other,
        }
    }

    async fn cross_reference(&self, key: &str) -> Result<CrossReference, SourceError> {
        // An arXiv key is its own cross-reference
        if is_arxiv_id(key) {
            return Ok(CrossReference {
                arxiv_id: Some(key.to_string()),
                ..Default::default()
            });
        }

        let paper = match self.paper(key).await {
            Ok(paper) => paper,
            Err(e) if e.is_not_found() => return Ok(CrossReference::default()),
            Err(e) => return Err(e),
        };
        let ids = paper.external_ids.unwrap_or_default();
        Ok(CrossReference {
            arxiv_id: ids.arxiv,
            doi: ids.doi,
            ..Default::default()
        })
    }

    async fn fetch_by_cross_reference(
        &self,
        xref: &CrossReference,
    ) -> Result<BibtexRecord, SourceError> {
        if let Some(ref arxiv_id) = xref.arxiv_id {
            match self
                .record(&format!("ARXIV:{}", arxiv_id), format!("arXiv:{}", arxiv_id))
                .await
            {
                Err(e) if e.is_not_found() => {}
                other => return other,
            }
        }
        if let Some(ref doi) = xref.doi {
            match self.record(&format!("DOI:{}", doi), format!("doi {}", doi)).await {
                Err(e) if e.is_not_found() => {}
                other => return other,
            }
        }

        Err(SourceError::NotFound(format!(
            "Semantic Scholar has no record for {}",
            xref.describe()
        )))
    }
}

#[derive(Debug, Deserialize)]
struct S2Paper {
    #[serde(rename = "citationStyles")]
    citation_styles: Option<CitationStyles>,
    #[serde(rename = "externalIds")]
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct CitationStyles {
    bibtex: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalIds {
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::RetryConfig;
    use mockito::Matcher;
    use std::time::Duration;

    const BIBTEX: &str = "@Article{Abbott2025GW250114,\n author = {A. G. Abbott and others},\n title = {GW250114},\n year = {2025}\n}";

    fn source(server: &mockito::Server, key: Option<&str>) -> SemanticScholarSource {
        let http = HttpClient::new(Duration::from_secs(5))
            .unwrap()
            .with_retry(RetryConfig::no_retry());
        SemanticScholarSource::new(http, key.map(str::to_string)).with_base_url(server.url())
    }

    fn paper_body(bibtex: Option<&str>) -> String {
        serde_json::json!({
            "paperId": "abc123",
            "externalIds": {"ArXiv": "2508.18080", "DOI": "10.1103/x"},
            "citationStyles": {"bibtex": bibtex}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_fetch_by_arxiv_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/paper/ARXIV(:|%3A)2508\.18080$".to_string()))
            .match_query(Matcher::UrlEncoded("fields".into(), PAPER_FIELDS.into()))
            .match_header("x-api-key", "s2key")
            .with_body(paper_body(Some(BIBTEX)))
            .create_async()
            .await;

        let record = source(&server, Some("s2key"))
            .fetch_by_key("2508.18080")
            .await
            .unwrap();
        assert_eq!(record.bibtex, BIBTEX);
        assert_eq!(record.identifier, "arXiv:2508.18080");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_bibtex_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Regex(r"^/paper/".to_string()))
            .match_query(Matcher::Any)
            .with_body(paper_body(None))
            .create_async()
            .await;

        let err = source(&server, None).fetch_by_key("2508.18080").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Regex(r"^/paper/".to_string()))
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("retry-after", "1")
            .create_async()
            .await;

        let err = source(&server, None).fetch_by_key("2508.18080").await.unwrap_err();
        assert!(matches!(err, SourceError::RateLimit(Some(1))));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_cross_reference_of_arxiv_key_needs_no_request() {
        let server = mockito::Server::new_async().await;
        let xref = source(&server, None).cross_reference("2508.18080").await.unwrap();
        assert_eq!(xref.arxiv_id.as_deref(), Some("2508.18080"));
        assert!(xref.bibcode.is_none());
    }

    #[tokio::test]
    async fn test_fetch_by_cross_reference_falls_back_to_doi() {
        let mut server = mockito::Server::new_async().await;
        let by_arxiv = server
            .mock("GET", Matcher::Regex(r"^/paper/ARXIV".to_string()))
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error": "Paper not found"}"#)
            .create_async()
            .await;
        let by_doi = server
            .mock("GET", Matcher::Regex(r"^/paper/DOI".to_string()))
            .match_query(Matcher::Any)
            .with_body(paper_body(Some(BIBTEX)))
            .create_async()
            .await;

        let xref = CrossReference {
            arxiv_id: Some("2508.18080".to_string()),
            doi: Some("10.1103/x".to_string()),
            ..Default::default()
        };
        let record = source(&server, None)
            .fetch_by_cross_reference(&xref)
            .await
            .unwrap();
        assert_eq!(record.identifier, "doi 10.1103/x");
        by_arxiv.assert_async().await;
        by_doi.assert_async().await;

        let only_texkey = CrossReference {
            texkey: Some("X:2020ab".to_string()),
            ..Default::default()
        };
        let err = source(&server, None)
            .fetch_by_cross_reference(&only_texkey)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
