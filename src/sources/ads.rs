//! NASA Astrophysics Data System (ADS) source.

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{BibtexRecord, CrossReference, SourceId};
use crate::sources::{Source, SourceError};
use crate::utils::HttpClient;

const ADS_API_BASE: &str = "https://api.adsabs.harvard.edu/v1";

/// Fields requested from the search endpoint
const SEARCH_FIELDS: &str = "bibcode,identifier,doi";

/// NASA ADS source
///
/// Native keys are bibcodes (`2016PhRvL.116f1102A`). Every endpoint needs a
/// bearer token; without one each operation fails with
/// [`SourceError::MissingCredential`] before any request is made.
#[derive(Debug, Clone)]
pub struct AdsSource {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl AdsSource {
    pub fn new(http: HttpClient, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: ADS_API_BASE.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Point the client at another API root (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn token(&self) -> Result<&str, SourceError> {
        self.api_key.as_deref().ok_or_else(|| {
            SourceError::MissingCredential("ADS_API_KEY is not set".to_string())
        })
    }

    /// Export the BibTeX of one bibcode
    async fn export(&self, bibcode: &str) -> Result<BibtexRecord, SourceError> {
        let token = self.token()?;
        let url = format!("{}/export/bibtex", self.base_url);
        let body = serde_json::json!({ "bibcode": [bibcode] });
        tracing::debug!("ADS export: {}", bibcode);

        let response = self
            .http
            .send(|c| c.post(&url).bearer_auth(token).json(&body))
            .await?;

        let data: ExportResponse = serde_json::from_str(&response.text().await?)?;
        let export = data.export.trim();
        if export.is_empty() || export.starts_with("No records") {
            return Err(SourceError::NotFound(format!("ADS has no record for {}", bibcode)));
        }
        Ok(BibtexRecord::new(export, format!("bibcode {}", bibcode)))
    }

    /// First search hit for an ADS query
    async fn search(&self, query: &str) -> Result<Option<AdsDocument>, SourceError> {
        let token = self.token()?;
        let url = format!("{}/search/query", self.base_url);
        tracing::debug!("ADS search: {}", query);

        let response = self
            .http
            .send(|c| {
                c.get(&url)
                    .bearer_auth(token)
                    .query(&[("q", query), ("fl", SEARCH_FIELDS), ("rows", "1")])
            })
            .await?;

        let data: SearchResponse = serde_json::from_str(&response.text().await?)?;
        Ok(data.response.docs.into_iter().next())
    }

    /// Bibcode found by `query`, exported
    async fn export_first_hit(&self, query: &str) -> Result<BibtexRecord, SourceError> {
        match self.search(query).await? {
            Some(doc) => self.export(&doc.bibcode).await,
            None => Err(SourceError::NotFound(format!("ADS has no record for {}", query))),
        }
    }
}

#[async_trait]
impl Source for AdsSource {
    fn id(&self) -> SourceId {
        SourceId::Ads
    }

    async fn fetch_by_key(&self, key: &str) -> Result<BibtexRecord, SourceError> {
        self.export(key).await
    }

    async fn cross_reference(&self, key: &str) -> Result<CrossReference, SourceError> {
        let Some(doc) = self.search(&format!("bibcode:{}", key)).await? else {
            return Ok(CrossReference::default());
        };

        let arxiv_id = doc
            .identifier
            .iter()
            .find_map(|id| id.strip_prefix("arXiv:"))
            .map(str::to_string);

        Ok(CrossReference {
            arxiv_id,
            bibcode: Some(doc.bibcode),
            texkey: None,
            doi: doc.doi.into_iter().next(),
        })
    }

    async fn fetch_by_cross_reference(
        &self,
        xref: &CrossReference,
    ) -> Result<BibtexRecord, SourceError> {
        self.token()?;

        if let Some(ref bibcode) = xref.bibcode {
            match self.export(bibcode).await {
                Err(e) if e.is_not_found() => {}
                other => return other,
            }
        }
        if let Some(ref arxiv_id) = xref.arxiv_id {
            match self.export_first_hit(&format!("arXiv:{}", arxiv_id)).await {
                Err(e) if e.is_not_found() => {}
                Ok(record) => {
                    return Ok(BibtexRecord::new(record.bibtex, format!("arXiv:{}", arxiv_id)))
                }
                Err(e) => return Err(e),
            }
        }
        if let Some(ref doi) = xref.doi {
            match self.export_first_hit(&format!("doi:\"{}\"", doi)).await {
                Err(e) if e.is_not_found() => {}
                Ok(record) => return Ok(BibtexRecord::new(record.bibtex, format!("doi {}", doi))),
                Err(e) => return Err(e),
            }
        }

        Err(SourceError::NotFound(format!(
            "ADS has no record for {}",
            xref.describe()
        )))
    }
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    #[serde(default)]
    export: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    response: SearchDocs,
}

#[derive(Debug, Default, Deserialize)]
struct SearchDocs {
    #[serde(default)]
    docs: Vec<AdsDocument>,
}

#[derive(Debug, Deserialize)]
struct AdsDocument {
    bibcode: String,
    #[serde(default)]
    identifier: Vec<String>,
    #[serde(default)]
    doi: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::RetryConfig;
    use mockito::Matcher;
    use std::time::Duration;

    const BIBTEX: &str = "@ARTICLE{2016PhRvL.116f1102A,\n       author = {{Abbott}, B.~P. and {Abbott}, R.},\n        title = \"{Observation of Gravitational Waves}\"\n}";

    fn source(server: &mockito::Server, key: Option<&str>) -> AdsSource {
        let http = HttpClient::new(Duration::from_secs(5))
            .unwrap()
            .with_retry(RetryConfig::no_retry());
        AdsSource::new(http, key.map(str::to_string)).with_base_url(server.url())
    }

    fn export_body(export: &str) -> String {
        serde_json::json!({ "msg": "Retrieved 1 abstracts", "export": export }).to_string()
    }

    #[tokio::test]
    async fn test_fetch_by_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/export/bibtex")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(serde_json::json!({"bibcode": ["2016PhRvL.116f1102A"]})))
            .with_body(export_body(&format!("{}\n\n", BIBTEX)))
            .create_async()
            .await;

        let record = source(&server, Some("secret"))
            .fetch_by_key("2016PhRvL.116f1102A")
            .await
            .unwrap();
        assert_eq!(record.bibtex, BIBTEX);
        assert_eq!(record.identifier, "bibcode 2016PhRvL.116f1102A");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_records_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/export/bibtex")
            .with_body(export_body("No records found for the bibcodes provided"))
            .create_async()
            .await;

        let err = source(&server, Some("secret"))
            .fetch_by_key("2099XXXX.999..999Z")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/export/bibtex")
            .expect(0)
            .create_async()
            .await;

        let ads = source(&server, None);
        assert!(!ads.has_api_key());
        let err = ads.fetch_by_key("2016PhRvL.116f1102A").await.unwrap_err();
        assert!(matches!(err, SourceError::MissingCredential(_)));

        let xref = CrossReference {
            bibcode: Some("2016PhRvL.116f1102A".to_string()),
            ..Default::default()
        };
        let err = ads.fetch_by_cross_reference(&xref).await.unwrap_err();
        assert!(matches!(err, SourceError::MissingCredential(_)));
        assert!(!source(&server, Some("  ")).has_api_key());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_transient() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/export/bibtex")
            .with_status(401)
            .with_body(r#"{"error": "Unauthorized"}"#)
            .create_async()
            .await;

        let err = source(&server, Some("wrong"))
            .fetch_by_key("2016PhRvL.116f1102A")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_cross_reference() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/search/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "bibcode:2016PhRvL.116f1102A".into()),
                Matcher::UrlEncoded("fl".into(), "bibcode,identifier,doi".into()),
            ]))
            .with_body(
                r#"{"response": {"numFound": 1, "docs": [{
                    "bibcode": "2016PhRvL.116f1102A",
                    "identifier": ["2016PhRvL.116f1102A", "10.1103/PhysRevLett.116.061102", "arXiv:1602.03837"],
                    "doi": ["10.1103/PhysRevLett.116.061102"]
                }]}}"#,
            )
            .create_async()
            .await;

        let xref = source(&server, Some("secret"))
            .cross_reference("2016PhRvL.116f1102A")
            .await
            .unwrap();
        assert_eq!(xref.arxiv_id.as_deref(), Some("1602.03837"));
        assert_eq!(xref.bibcode.as_deref(), Some("2016PhRvL.116f1102A"));
        assert_eq!(xref.doi.as_deref(), Some("10.1103/PhysRevLett.116.061102"));
        assert_eq!(xref.texkey, None);
    }

    #[tokio::test]
    async fn test_fetch_by_cross_reference_searches_arxiv() {
        let mut server = mockito::Server::new_async().await;
        let search = server
            .mock("GET", "/search/query")
            .match_query(Matcher::UrlEncoded("q".into(), "arXiv:1602.03837".into()))
            .with_body(r#"{"response": {"docs": [{"bibcode": "2016PhRvL.116f1102A"}]}}"#)
            .create_async()
            .await;
        let export = server
            .mock("POST", "/export/bibtex")
            .match_body(Matcher::Json(serde_json::json!({"bibcode": ["2016PhRvL.116f1102A"]})))
            .with_body(export_body(BIBTEX))
            .create_async()
            .await;

        let xref = CrossReference {
            arxiv_id: Some("1602.03837".to_string()),
            ..Default::default()
        };
        let record = source(&server, Some("secret"))
            .fetch_by_cross_reference(&xref)
            .await
            .unwrap();
        assert_eq!(record.identifier, "arXiv:1602.03837");
        assert_eq!(record.bibtex, BIBTEX);
        search.assert_async().await;
        export.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_by_cross_reference_without_usable_ids() {
        let server = mockito::Server::new_async().await;
        let xref = CrossReference {
            texkey: Some("Abbott:2016blz".to_string()),
            ..Default::default()
        };
        let err = source(&server, Some("secret"))
            .fetch_by_cross_reference(&xref)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
