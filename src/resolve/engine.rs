//! The fallback chain: resolve one key against the sources in order.

use crate::models::{
    CitationKey, CrossReference, FetchOutcome, PreferredSource, Provenance, ResolutionRequest,
    SourceId,
};
use crate::sources::{Source, SourceRegistry};

/// Ordered sources to try for a key.
///
/// Always three distinct sources. `Auto` starts with the source that owns the
/// key's format and falls back to the INSPIRE order for anything else.
pub fn chain_for(preferred: PreferredSource, provenance: Provenance) -> [SourceId; 3] {
    use SourceId::*;

    let preferred = match preferred {
        PreferredSource::Auto => match provenance {
            Provenance::BibcodeFormat => PreferredSource::Ads,
            Provenance::ArxivFormat => PreferredSource::SemanticScholar,
            Provenance::PrimaryFormat | Provenance::Unknown => PreferredSource::Inspire,
        },
        other => other,
    };

    match preferred {
        PreferredSource::Inspire | PreferredSource::Auto => [Inspire, Ads, SemanticScholar],
        PreferredSource::Ads => [Ads, Inspire, SemanticScholar],
        PreferredSource::SemanticScholar => [SemanticScholar, Ads, Inspire],
    }
}

/// Result of the one-hop cross-reference lookup, memoized per resolution
#[derive(Debug)]
enum Lookup {
    Found { via: SourceId, xref: CrossReference },
    Missing { via: SourceId },
    Failed(String),
}

/// Why one source in the chain did not produce a record
enum Failure {
    NotFound(String),
    Transient(String),
}

/// Drives the fallback chain for one key at a time
#[derive(Debug, Clone)]
pub struct ResolutionEngine {
    registry: SourceRegistry,
}

impl ResolutionEngine {
    pub fn new(registry: SourceRegistry) -> Self {
        Self { registry }
    }

    /// Resolve one key.
    ///
    /// Walks the chain until a source returns a record. The outcome is
    /// `NotFound` if any source definitively had no record, otherwise
    /// `TransientError` with every recorded reason.
    pub async fn resolve(&self, request: &ResolutionRequest) -> FetchOutcome {
        let key = &request.key;
        let chain = chain_for(request.preferred, key.provenance());
        tracing::debug!(
            "Resolving {} ({}) via {}",
            key,
            key.provenance(),
            chain.map(|id| id.name()).join(" -> ")
        );

        let mut lookup: Option<Lookup> = None;
        let mut definitive_miss = false;
        let mut reasons = Vec::new();

        for id in chain {
            let Some(source) = self.registry.get(id) else {
                reasons.push(format!("{}: source not configured", id.name()));
                continue;
            };

            match self.try_source(source.as_ref(), key, &mut lookup).await {
                Ok((bibtex, route)) => {
                    tracing::info!("Resolved {} from {}", key, route);
                    return FetchOutcome::Success {
                        bibtex,
                        source: id,
                        route,
                    };
                }
                Err(Failure::NotFound(detail)) => {
                    tracing::debug!("{}: {} not found ({})", id.name(), key, detail);
                    definitive_miss = true;
                }
                Err(Failure::Transient(reason)) => {
                    tracing::warn!("{}: {} failed: {}", id.name(), key, reason);
                    reasons.push(format!("{}: {}", id.name(), reason));
                }
            }
        }

        if definitive_miss {
            tracing::info!("No source has a record for {}", key);
            FetchOutcome::NotFound
        } else {
            FetchOutcome::TransientError { reasons }
        }
    }

    async fn try_source(
        &self,
        source: &dyn Source,
        key: &CitationKey,
        lookup: &mut Option<Lookup>,
    ) -> Result<(String, String), Failure> {
        if !key.provenance().is_fetchable() {
            return Err(Failure::NotFound(format!("'{}' is not a fetchable key", key)));
        }

        if source.native_format() == key.provenance() {
            tracing::debug!("{}: direct fetch of {}", source.name(), key);
            return source
                .fetch_by_key(key.as_str())
                .await
                .map(|record| (record.bibtex, source.name().to_string()))
                .map_err(classify_error);
        }

        if lookup.is_none() {
            *lookup = Some(self.cross_reference(key).await);
        }

        match lookup.as_ref() {
            Some(Lookup::Found { via, xref }) => {
                tracing::debug!(
                    "{}: fetching {} via {} ({})",
                    source.name(),
                    key,
                    via.name(),
                    xref.describe()
                );
                source
                    .fetch_by_cross_reference(xref)
                    .await
                    .map(|record| {
                        let route = format!("{} via {} ({})", source.name(), via.name(), record.identifier);
                        (record.bibtex, route)
                    })
                    .map_err(classify_error)
            }
            Some(Lookup::Missing { via }) => Err(Failure::NotFound(format!(
                "{} knows no identifiers for {}",
                via.name(),
                key
            ))),
            Some(Lookup::Failed(reason)) => Err(Failure::Transient(reason.clone())),
            None => Err(Failure::Transient("cross-reference lookup not performed".to_string())),
        }
    }

    /// Look the key up on the source that owns its format
    async fn cross_reference(&self, key: &CitationKey) -> Lookup {
        let Some(source) = self.registry.for_format(key.provenance()) else {
            return Lookup::Failed(format!("no source handles {} keys", key.provenance()));
        };
        let via = source.id();

        match source.cross_reference(key.as_str()).await {
            Ok(xref) if xref.is_empty() => Lookup::Missing { via },
            Ok(xref) => {
                tracing::debug!("Cross-reference for {} on {}: {}", key, via.name(), xref.describe());
                Lookup::Found { via, xref }
            }
            Err(e) if e.is_not_found() => Lookup::Missing { via },
            Err(e) => Lookup::Failed(format!("cross-reference on {} failed: {}", via.name(), e)),
        }
    }
}

fn classify_error(err: crate::sources::SourceError) -> Failure {
    if err.is_not_found() {
        Failure::NotFound(err.to_string())
    } else {
        Failure::Transient(err.to_string())
    }
}
