//! Merge coordinator: decide which keys need fetching, resolve them one by
//! one, and assemble the output bibliography.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::engine::ResolutionEngine;
use crate::bibtex::{self, BibliographyDocument};
use crate::models::{CitationKey, FetchOutcome, PreferredSource, ResolutionRequest, SourceId};

/// Options for one merge run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Ignore the existing bibliography entirely
    pub fresh: bool,
    /// Author list limit applied to fetched records (0 = no limit)
    pub max_authors: usize,
    pub preferred: PreferredSource,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            fresh: false,
            max_authors: 3,
            preferred: PreferredSource::default(),
        }
    }
}

/// What happened to one requested key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStatus {
    /// Already in the bibliography; not fetched
    Existing,
    /// Fetched and added
    Fetched { source: SourceId, route: String },
    /// Fetched record matches an entry already present; a crossref stub was added
    Duplicate { of: String, matched_by: String },
    NotFound,
    TransientError { reasons: Vec<String> },
    /// Not a fetchable key
    Skipped { reason: String },
}

impl KeyStatus {
    /// Whether the key ended without an entry
    pub fn is_unresolved(&self) -> bool {
        matches!(self, KeyStatus::NotFound | KeyStatus::TransientError { .. })
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStatus::Existing => write!(f, "already present"),
            KeyStatus::Fetched { route, .. } => write!(f, "{}", route),
            KeyStatus::Duplicate { of, matched_by } => {
                write!(f, "duplicate of {} (same {})", of, matched_by)
            }
            KeyStatus::NotFound => write!(f, "not found"),
            KeyStatus::TransientError { reasons } => write!(f, "failed: {}", reasons.join("; ")),
            KeyStatus::Skipped { reason } => write!(f, "skipped: {}", reason),
        }
    }
}

/// Report line for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReport {
    pub key: String,
    pub status: KeyStatus,
}

/// Output of a merge run
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub document: BibliographyDocument,
    /// One line per requested key, in key order
    pub keys: Vec<KeyReport>,
}

impl MergeReport {
    /// Keys that ended in NotFound or TransientError
    pub fn unresolved(&self) -> Vec<&KeyReport> {
        self.keys.iter().filter(|r| r.status.is_unresolved()).collect()
    }

    pub fn fetched_count(&self) -> usize {
        self.count(|s| matches!(s, KeyStatus::Fetched { .. }))
    }

    pub fn existing_count(&self) -> usize {
        self.count(|s| matches!(s, KeyStatus::Existing))
    }

    pub fn duplicate_count(&self) -> usize {
        self.count(|s| matches!(s, KeyStatus::Duplicate { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|s| matches!(s, KeyStatus::Skipped { .. }))
    }

    fn count(&self, predicate: impl Fn(&KeyStatus) -> bool) -> usize {
        self.keys.iter().filter(|r| predicate(&r.status)).count()
    }
}

/// Progress callbacks. `on_start` fires before a key is sent to the
/// sources; `on_finish` fires for every requested key.
pub trait MergeObserver {
    fn on_start(&self, _key: &str) {}
    fn on_finish(&self, _report: &KeyReport) {}
}

impl MergeObserver for () {}

/// Entries already in the document, indexed by identifiers that reveal
/// the same work under a different key
#[derive(Debug, Default)]
struct DuplicateIndex {
    eprints: HashMap<String, String>,
    dois: HashMap<String, String>,
}

fn normalize_eprint(value: &str) -> String {
    let value = value.trim().to_lowercase();
    value.strip_prefix("arxiv:").unwrap_or(&value).to_string()
}

fn normalize_doi(value: &str) -> String {
    let value = value.trim().to_lowercase();
    value
        .strip_prefix("https://doi.org/")
        .unwrap_or(&value)
        .to_string()
}

impl DuplicateIndex {
    fn build(document: &BibliographyDocument) -> Self {
        let mut index = Self::default();
        for (key, text) in document.entries() {
            index.add(key, text);
        }
        index
    }

    fn add(&mut self, key: &str, text: &str) {
        if let Some(eprint) = bibtex::field_value(text, "eprint") {
            self.eprints
                .entry(normalize_eprint(&eprint))
                .or_insert_with(|| key.to_string());
        }
        if let Some(doi) = bibtex::field_value(text, "doi") {
            self.dois
                .entry(normalize_doi(&doi))
                .or_insert_with(|| key.to_string());
        }
    }

    /// Existing entry matching a fetched record, and what matched
    fn find(
        &self,
        document: &BibliographyDocument,
        natural_key: Option<&str>,
        text: &str,
    ) -> Option<(String, &'static str)> {
        if let Some(key) = natural_key.filter(|k| document.contains(k)) {
            return Some((key.to_string(), "key"));
        }
        if let Some(key) = bibtex::field_value(text, "eprint")
            .and_then(|e| self.eprints.get(&normalize_eprint(&e)))
        {
            return Some((key.clone(), "eprint"));
        }
        if let Some(key) =
            bibtex::field_value(text, "doi").and_then(|d| self.dois.get(&normalize_doi(&d)))
        {
            return Some((key.clone(), "doi"));
        }
        None
    }
}

/// Runs the resolution engine over a batch of keys
#[derive(Debug)]
pub struct MergeCoordinator<'a> {
    engine: &'a ResolutionEngine,
    options: MergeOptions,
}

impl<'a> MergeCoordinator<'a> {
    pub fn new(engine: &'a ResolutionEngine, options: MergeOptions) -> Self {
        Self { engine, options }
    }

    /// Merge `requested` keys into `existing`.
    ///
    /// Every block of `existing` is kept (unless `fresh`). Keys already
    /// present are never sent to a source. Keys are resolved sequentially in
    /// sorted order, and one failing key never stops the batch.
    pub async fn run(
        &self,
        requested: &BTreeSet<String>,
        existing: BibliographyDocument,
        observer: &dyn MergeObserver,
    ) -> MergeReport {
        let mut document = if self.options.fresh {
            BibliographyDocument::new()
        } else {
            existing
        };
        let mut index = DuplicateIndex::build(&document);
        let mut reports = Vec::with_capacity(requested.len());

        for raw in requested {
            let key = CitationKey::new(raw.as_str());
            let status = if document.contains(raw) {
                KeyStatus::Existing
            } else if !key.provenance().is_fetchable() {
                tracing::warn!("Skipping '{}': not a texkey, bibcode or arXiv id", raw);
                KeyStatus::Skipped {
                    reason: "not a texkey, bibcode or arXiv id".to_string(),
                }
            } else {
                observer.on_start(raw);
                let request = ResolutionRequest::new(key.clone(), self.options.preferred);
                match self.engine.resolve(&request).await {
                    FetchOutcome::Success {
                        bibtex: text,
                        source,
                        route,
                    } => self.add_record(&mut document, &mut index, &key, &text, source, route),
                    FetchOutcome::NotFound => KeyStatus::NotFound,
                    FetchOutcome::TransientError { reasons } => KeyStatus::TransientError { reasons },
                }
            };

            let report = KeyReport {
                key: raw.clone(),
                status,
            };
            observer.on_finish(&report);
            reports.push(report);
        }

        MergeReport {
            document,
            keys: reports,
        }
    }

    /// Insert a fetched record, or a stub if the work is already present
    fn add_record(
        &self,
        document: &mut BibliographyDocument,
        index: &mut DuplicateIndex,
        key: &CitationKey,
        text: &str,
        source: SourceId,
        route: String,
    ) -> KeyStatus {
        let raw = key.as_str();
        let record = bibtex::truncate_authors(text, self.options.max_authors);
        let natural_key = bibtex::entry_key(&record).map(str::to_string);

        let Some(natural_key) = natural_key else {
            tracing::warn!("{} returned a record without an entry key for {}", source, raw);
            return KeyStatus::TransientError {
                reasons: vec![format!("{}: record has no entry key", source.name())],
            };
        };

        if let Some((of, matched_by)) = index.find(document, Some(natural_key.as_str()), &record) {
            tracing::warn!("Duplicate: {} is the same work as {} (same {})", raw, of, matched_by);
            return match document.insert_before(&bibtex::crossref_stub(raw, &of), &of) {
                Ok(()) => KeyStatus::Duplicate {
                    of,
                    matched_by: matched_by.to_string(),
                },
                Err(e) => KeyStatus::TransientError {
                    reasons: vec![e.to_string()],
                },
            };
        }

        let entry = bibtex::replace_key(&record, raw);
        if let Err(e) = document.insert(&entry) {
            return KeyStatus::TransientError {
                reasons: vec![e.to_string()],
            };
        }
        index.add(raw, &entry);

        KeyStatus::Fetched { source, route }
    }
}
