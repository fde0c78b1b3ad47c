//! Citation database clients behind one trait.
//!
//! Each database implements [`Source`]: it can fetch a record by a key in its
//! own native format, look up the identifiers it knows for such a key
//! (a [`CrossReference`]), and fetch a record given identifiers found by
//! another source. The [`SourceRegistry`] maps each [`SourceId`] to its client.
//!
//! | Source            | Native keys | Credential                 |
//! |-------------------|-------------|----------------------------|
//! | INSPIRE-HEP       | texkeys     | none                       |
//! | NASA ADS          | bibcodes    | `ADS_API_KEY` (required)   |
//! | Semantic Scholar  | arXiv ids   | `SEMANTIC_SCHOLAR_API_KEY` (optional) |

mod ads;
mod inspire;
mod registry;
mod semantic;

pub mod mock;

pub use ads::AdsSource;
pub use inspire::InspireSource;
pub use mock::{MockReply, MockSource};
pub use registry::{Credentials, SourceRegistry};
pub use semantic::SemanticScholarSource;

use async_trait::async_trait;

use crate::models::{BibtexRecord, CrossReference, Provenance, SourceId};

/// Interface shared by all citation databases.
///
/// All three operations distinguish a definitive miss
/// ([`SourceError::NotFound`]) from every other failure, which the resolution
/// engine treats as transient.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Which database this is
    fn id(&self) -> SourceId;

    /// Human-readable name of this source
    fn name(&self) -> &str {
        self.id().name()
    }

    /// Key family this source can fetch directly
    fn native_format(&self) -> Provenance {
        self.id().native_format()
    }

    /// Fetch the record for a key in this source's native format
    async fn fetch_by_key(&self, key: &str) -> Result<BibtexRecord, SourceError>;

    /// Identifiers this source associates with a native-format key.
    ///
    /// An empty [`CrossReference`] means the key is unknown here.
    async fn cross_reference(&self, key: &str) -> Result<CrossReference, SourceError>;

    /// Fetch a record using identifiers obtained from another source.
    ///
    /// Returns [`SourceError::NotFound`] when none of the identifiers is
    /// usable or none matches a record.
    async fn fetch_by_cross_reference(
        &self,
        xref: &CrossReference,
    ) -> Result<BibtexRecord, SourceError>;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source has no record for the identifier
    #[error("Not found: {0}")]
    NotFound(String),

    /// A required API key is not configured
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Network or HTTP transport error
    #[error("Network error: {0}")]
    Network(String),

    /// The request timed out
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Rate limit exceeded (with optional retry-after seconds)
    #[error("Rate limit exceeded")]
    RateLimit(Option<u64>),

    /// 5xx response
    #[error("Server error: {0}")]
    Server(String),

    /// Any other unexpected response from the source
    #[error("API error: {0}")]
    Api(String),

    /// Response body could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl SourceError {
    /// A definitive "no such record"
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }

    /// Everything that is not a definitive miss
    pub fn is_transient(&self) -> bool {
        !self.is_not_found()
    }

    /// Conditions worth retrying after a delay
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::Network(_)
                | SourceError::Timeout(_)
                | SourceError::RateLimit(_)
                | SourceError::Server(_)
        )
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(SourceError::NotFound("x".into()).is_not_found());
        assert!(!SourceError::NotFound("x".into()).is_transient());
        assert!(!SourceError::NotFound("x".into()).is_retryable());

        assert!(SourceError::MissingCredential("ADS_API_KEY".into()).is_transient());
        assert!(!SourceError::MissingCredential("ADS_API_KEY".into()).is_retryable());
        assert!(!SourceError::Parse("bad".into()).is_retryable());
        assert!(!SourceError::Api("HTTP 401".into()).is_retryable());

        assert!(SourceError::RateLimit(Some(3)).is_retryable());
        assert!(SourceError::Server("HTTP 503".into()).is_retryable());
        assert!(SourceError::Timeout("slow".into()).is_retryable());
        assert!(SourceError::Network("refused".into()).is_retryable());
    }

    #[test]
    fn test_json_error_is_parse_error() {
        let err: SourceError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, SourceError::Parse(_)));
    }
}
