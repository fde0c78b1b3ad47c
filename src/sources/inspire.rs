//! INSPIRE-HEP literature source.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::models::{BibtexRecord, CrossReference, SourceId};
use crate::sources::{Source, SourceError};
use crate::utils::HttpClient;

const INSPIRE_API_BASE: &str = "https://inspirehep.net/api";

/// Metadata fields needed for cross-referencing
const XREF_FIELDS: &str = "external_system_identifiers,arxiv_eprints,dois,texkeys";

/// INSPIRE-HEP source
///
/// Native keys are texkeys (`Abbott:2016blz`). Queries use the `texkeys:`
/// field so the colon in the key is not read as a field operator.
#[derive(Debug, Clone)]
pub struct InspireSource {
    http: HttpClient,
    base_url: String,
}

impl InspireSource {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: INSPIRE_API_BASE.to_string(),
        }
    }

    /// Point the client at another API root (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn literature_url(&self) -> String {
        format!("{}/literature", self.base_url)
    }

    /// BibTeX of the first record matching an INSPIRE search query
    async fn bibtex_for_query(&self, query: &str, identifier: String) -> Result<BibtexRecord, SourceError> {
        let url = self.literature_url();
        tracing::debug!("INSPIRE BibTeX query: {}", query);

        let response = self
            .http
            .send(|c| {
                c.get(&url)
                    .query(&[("q", query), ("size", "1")])
                    .header(ACCEPT, "application/x-bibtex")
            })
            .await?;

        let text = response.text().await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SourceError::NotFound(format!("INSPIRE has no record for {}", query)));
        }
        Ok(BibtexRecord::new(text, identifier))
    }

    /// JSON metadata of the first record matching a query
    async fn metadata_for_query(&self, query: &str) -> Result<Option<InspireMetadata>, SourceError> {
        let url = self.literature_url();
        tracing::debug!("INSPIRE metadata query: {}", query);

        let response = self
            .http
            .send(|c| {
                c.get(&url)
                    .query(&[("q", query), ("size", "1"), ("fields", XREF_FIELDS)])
                    .header(ACCEPT, "application/json")
            })
            .await?;

        let body = response.text().await?;
        let data: LiteratureResponse = serde_json::from_str(&body)?;
        Ok(data.hits.hits.into_iter().next().map(|hit| hit.metadata))
    }
}

#[async_trait]
impl Source for InspireSource {
    fn id(&self) -> SourceId {
        SourceId::Inspire
    }

    async fn fetch_by_key(&self, key: &str) -> Result<BibtexRecord, SourceError> {
        self.bibtex_for_query(&format!("texkeys:{}", key), format!("texkey {}", key))
            .await
    }

    async fn cross_reference(&self, key: &str) -> Result<CrossReference, SourceError> {
        let Some(metadata) = self.metadata_for_query(&format!("texkeys:{}", key)).await? else {
            return Ok(CrossReference::default());
        };

        let bibcode = metadata
            .external_system_identifiers
            .into_iter()
            .find(|ext| ext.schema.eq_ignore_ascii_case("ADS"))
            .map(|ext| ext.value);

        Ok(CrossReference {
            arxiv_id: metadata.arxiv_eprints.into_iter().next().map(|e| e.value),
            bibcode,
            texkey: metadata.texkeys.into_iter().next(),
            doi: metadata.dois.into_iter().next().map(|d| d.value),
        })
    }

    async fn fetch_by_cross_reference(
        &self,
        xref: &CrossReference,
    ) -> Result<BibtexRecord, SourceError> {
        let mut queries = Vec::new();
        if let Some(ref texkey) = xref.texkey {
            queries.push((format!("texkeys:{}", texkey), format!("texkey {}", texkey)));
        }
        if let Some(ref arxiv_id) = xref.arxiv_id {
            queries.push((format!("arxiv:{}", arxiv_id), format!("arXiv:{}", arxiv_id)));
        }
        if let Some(ref doi) = xref.doi {
            queries.push((format!("doi:{}", doi), format!("doi {}", doi)));
        }

        for (query, identifier) in queries {
            match self.bibtex_for_query(&query, identifier).await {
                Err(e) if e.is_not_found() => continue,
                other => return other,
            }
        }

        Err(SourceError::NotFound(format!(
            "INSPIRE has no record for {}",
            xref.describe()
        )))
    }
}

#[derive(Debug, Deserialize)]
struct LiteratureResponse {
    #[serde(default)]
    hits: Hits,
}

#[derive(Debug, Default, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(default)]
    metadata: InspireMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct InspireMetadata {
    #[serde(default)]
    external_system_identifiers: Vec<ExternalIdentifier>,
    #[serde(default)]
    arxiv_eprints: Vec<ValueField>,
    #[serde(default)]
    dois: Vec<ValueField>,
    #[serde(default)]
    texkeys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIdentifier {
    schema: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ValueField {
    value: String,
}
