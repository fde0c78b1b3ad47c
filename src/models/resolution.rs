//! Source identifiers and the values exchanged while resolving a key.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::key::{CitationKey, Provenance};

/// An external citation database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceId {
    Inspire,
    Ads,
    SemanticScholar,
}

impl SourceId {
    /// All sources, in declaration order
    pub const ALL: [SourceId; 3] = [SourceId::Inspire, SourceId::Ads, SourceId::SemanticScholar];

    /// Display name used in reports and log lines
    pub fn name(&self) -> &'static str {
        match self {
            SourceId::Inspire => "INSPIRE",
            SourceId::Ads => "ADS",
            SourceId::SemanticScholar => "Semantic Scholar",
        }
    }

    /// Name accepted on the command line and in the config file
    pub fn cli_name(&self) -> &'static str {
        match self {
            SourceId::Inspire => "inspire",
            SourceId::Ads => "ads",
            SourceId::SemanticScholar => "semantic-scholar",
        }
    }

    /// Key family this source can fetch directly
    pub fn native_format(&self) -> Provenance {
        match self {
            SourceId::Inspire => Provenance::PrimaryFormat,
            SourceId::Ads => Provenance::BibcodeFormat,
            SourceId::SemanticScholar => Provenance::ArxivFormat,
        }
    }

    /// Source whose native format is `provenance`, if any
    pub fn for_format(provenance: Provenance) -> Option<SourceId> {
        SourceId::ALL
            .into_iter()
            .find(|id| id.native_format() == provenance)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which source the user wants tried first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreferredSource {
    Inspire,
    #[default]
    Ads,
    SemanticScholar,
    /// Pick the chain from the key's own format
    Auto,
}

impl PreferredSource {
    pub fn cli_name(&self) -> &'static str {
        match self {
            PreferredSource::Inspire => "inspire",
            PreferredSource::Ads => "ads",
            PreferredSource::SemanticScholar => "semantic-scholar",
            PreferredSource::Auto => "auto",
        }
    }
}

impl fmt::Display for PreferredSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl std::str::FromStr for PreferredSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inspire" => Ok(PreferredSource::Inspire),
            "ads" => Ok(PreferredSource::Ads),
            "semantic-scholar" | "semantic_scholar" | "semanticscholar" => {
                Ok(PreferredSource::SemanticScholar)
            }
            "auto" => Ok(PreferredSource::Auto),
            other => Err(format!(
                "unknown source '{}' (expected ads, inspire, semantic-scholar or auto)",
                other
            )),
        }
    }
}

/// Identifiers that point at the same work in different databases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    pub arxiv_id: Option<String>,
    pub bibcode: Option<String>,
    pub texkey: Option<String>,
    pub doi: Option<String>,
}

impl CrossReference {
    pub fn is_empty(&self) -> bool {
        self.arxiv_id.is_none() && self.bibcode.is_none() && self.texkey.is_none() && self.doi.is_none()
    }

    /// Short description of the identifiers present, for log lines
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref id) = self.arxiv_id {
            parts.push(format!("arXiv:{}", id));
        }
        if let Some(ref bibcode) = self.bibcode {
            parts.push(format!("bibcode {}", bibcode));
        }
        if let Some(ref texkey) = self.texkey {
            parts.push(format!("texkey {}", texkey));
        }
        if let Some(ref doi) = self.doi {
            parts.push(format!("doi {}", doi));
        }
        parts.join(", ")
    }
}

/// A BibTeX record as returned by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibtexRecord {
    /// Raw entry text
    pub bibtex: String,
    /// Identifier the source used to find the record
    pub identifier: String,
}

impl BibtexRecord {
    pub fn new(bibtex: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            bibtex: bibtex.into(),
            identifier: identifier.into(),
        }
    }
}

/// Result of resolving one key against the fallback chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success {
        bibtex: String,
        source: SourceId,
        /// How the record was obtained, e.g. `ADS via INSPIRE (bibcode ...)`
        route: String,
    },
    /// At least one source definitively reported no record
    NotFound,
    /// Every failure was transient
    TransientError { reasons: Vec<String> },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}

/// One key to resolve, with the user's source preference
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    pub key: CitationKey,
    pub preferred: PreferredSource,
}

impl ResolutionRequest {
    pub fn new(key: CitationKey, preferred: PreferredSource) -> Self {
        Self { key, preferred }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_native_formats() {
        assert_eq!(SourceId::for_format(Provenance::PrimaryFormat), Some(SourceId::Inspire));
        assert_eq!(SourceId::for_format(Provenance::BibcodeFormat), Some(SourceId::Ads));
        assert_eq!(
            SourceId::for_format(Provenance::ArxivFormat),
            Some(SourceId::SemanticScholar)
        );
        assert_eq!(SourceId::for_format(Provenance::Unknown), None);
    }

    #[test]
    fn test_preferred_source_parsing() {
        assert_eq!("ads".parse::<PreferredSource>().unwrap(), PreferredSource::Ads);
        assert_eq!("INSPIRE".parse::<PreferredSource>().unwrap(), PreferredSource::Inspire);
        assert_eq!(
            "semantic-scholar".parse::<PreferredSource>().unwrap(),
            PreferredSource::SemanticScholar
        );
        assert_eq!("auto".parse::<PreferredSource>().unwrap(), PreferredSource::Auto);
        assert!("crossref".parse::<PreferredSource>().is_err());
        assert_eq!(PreferredSource::default(), PreferredSource::Ads);
    }

    #[test]
    fn test_cross_reference_describe() {
        let xref = CrossReference::default();
        assert!(xref.is_empty());

        let xref = CrossReference {
            arxiv_id: Some("1602.03837".to_string()),
            bibcode: Some("2016PhRvL.116f1102A".to_string()),
            ..Default::default()
        };
        assert!(!xref.is_empty());
        assert_eq!(xref.describe(), "arXiv:1602.03837, bibcode 2016PhRvL.116f1102A");
    }
}
