//! Registry mapping each source id to its client.

use std::collections::HashMap;
use std::sync::Arc;

use super::{AdsSource, InspireSource, SemanticScholarSource, Source};
use crate::models::{Provenance, SourceId};
use crate::utils::HttpClient;

/// API keys handed to the source clients that need them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Required by ADS
    pub ads_api_key: Option<String>,
    /// Optional for Semantic Scholar (raises the rate limit)
    pub semantic_scholar_api_key: Option<String>,
}

/// Registry for the citation databases
///
/// The resolution engine looks sources up by [`SourceId`] when walking a
/// fallback chain, and by [`Provenance`] when it needs the source that can
/// cross-reference a key.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<SourceId, Arc<dyn Source>>,
}

impl SourceRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The three live sources sharing one HTTP client
    pub fn with_live_sources(http: HttpClient, credentials: &Credentials) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(InspireSource::new(http.clone())));
        registry.register(Arc::new(AdsSource::new(
            http.clone(),
            credentials.ads_api_key.clone(),
        )));
        registry.register(Arc::new(SemanticScholarSource::new(
            http,
            credentials.semantic_scholar_api_key.clone(),
        )));
        registry
    }

    /// Register a source, replacing any previous one with the same id
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.id(), source);
    }

    /// Get a source by ID
    pub fn get(&self, id: SourceId) -> Option<&Arc<dyn Source>> {
        self.sources.get(&id)
    }

    /// The source whose native format is `provenance`
    pub fn for_format(&self, provenance: Provenance) -> Option<&Arc<dyn Source>> {
        SourceId::for_format(provenance).and_then(|id| self.get(id))
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
