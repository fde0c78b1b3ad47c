//! Mock source for testing purposes.
//!
//! Replies are scripted per key or per identifier up front; every call is
//! counted and logged so tests can check exactly which requests the
//! resolution engine made.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{BibtexRecord, CrossReference, SourceId};
use crate::sources::{Source, SourceError};

/// Scripted reply for one key or identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    Record(String),
    NotFound,
    Transient(String),
}

impl MockReply {
    fn into_result(self, identifier: &str) -> Result<BibtexRecord, SourceError> {
        match self {
            MockReply::Record(bibtex) => Ok(BibtexRecord::new(bibtex, identifier)),
            MockReply::NotFound => Err(SourceError::NotFound(identifier.to_string())),
            MockReply::Transient(reason) => Err(SourceError::Network(reason)),
        }
    }
}

/// A mock source for testing that returns predefined responses.
#[derive(Debug)]
pub struct MockSource {
    id: SourceId,
    by_key: HashMap<String, MockReply>,
    cross_references: HashMap<String, CrossReference>,
    by_identifier: HashMap<String, MockReply>,
    unavailable: Option<String>,
    calls: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl MockSource {
    /// A source that knows nothing: every lookup is a miss
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            by_key: HashMap::new(),
            cross_references: HashMap::new(),
            by_identifier: HashMap::new(),
            unavailable: None,
            calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// A source whose every call fails transiently
    pub fn unavailable(id: SourceId, reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::new(id)
        }
    }

    /// Answer `fetch_by_key(key)` with `bibtex`
    pub fn with_record(self, key: impl Into<String>, bibtex: impl Into<String>) -> Self {
        self.with_reply(key, MockReply::Record(bibtex.into()))
    }

    /// Answer `fetch_by_key(key)` with `reply`
    pub fn with_reply(mut self, key: impl Into<String>, reply: MockReply) -> Self {
        self.by_key.insert(key.into(), reply);
        self
    }

    /// Answer `cross_reference(key)` with `xref`
    pub fn with_cross_reference(mut self, key: impl Into<String>, xref: CrossReference) -> Self {
        self.cross_references.insert(key.into(), xref);
        self
    }

    /// Answer `fetch_by_cross_reference` for any reference containing `identifier`
    pub fn with_identifier_record(
        self,
        identifier: impl Into<String>,
        bibtex: impl Into<String>,
    ) -> Self {
        self.with_identifier_reply(identifier, MockReply::Record(bibtex.into()))
    }

    pub fn with_identifier_reply(mut self, identifier: impl Into<String>, reply: MockReply) -> Self {
        self.by_identifier.insert(identifier.into(), reply);
        self
    }

    /// Number of calls made to this source
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls made so far, as `operation argument` strings
    pub fn calls(&self) -> Vec<String> {
        self.log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn record_call(&self, call: String) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.log.lock() {
            Ok(mut log) => log.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
        match self.unavailable {
            Some(ref reason) => Err(SourceError::Network(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn fetch_by_key(&self, key: &str) -> Result<BibtexRecord, SourceError> {
        self.record_call(format!("fetch_by_key {}", key))?;
        self.by_key
            .get(key)
            .cloned()
            .unwrap_or(MockReply::NotFound)
            .into_result(key)
    }

    async fn cross_reference(&self, key: &str) -> Result<CrossReference, SourceError> {
        self.record_call(format!("cross_reference {}", key))?;
        Ok(self.cross_references.get(key).cloned().unwrap_or_default())
    }

    async fn fetch_by_cross_reference(
        &self,
        xref: &CrossReference,
    ) -> Result<BibtexRecord, SourceError> {
        self.record_call(format!("fetch_by_cross_reference {}", xref.describe()))?;

        let identifiers = [&xref.bibcode, &xref.arxiv_id, &xref.texkey, &xref.doi];
        for identifier in identifiers.into_iter().flatten() {
            if let Some(reply) = self.by_identifier.get(identifier) {
                match reply.clone().into_result(identifier) {
                    Err(e) if e.is_not_found() => continue,
                    other => return other,
                }
            }
        }
        Err(SourceError::NotFound(xref.describe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies() {
        let source = MockSource::new(SourceId::Inspire)
            .with_record("A:2020aa", "@article{A:2020aa,\n}")
            .with_reply("B:2020bb", MockReply::Transient("HTTP 503".into()))
            .with_cross_reference(
                "A:2020aa",
                CrossReference {
                    arxiv_id: Some("2001.00001".into()),
                    ..Default::default()
                },
            )
            .with_identifier_record("2001.00001", "@article{A:2020aa,\n}");

        assert_eq!(source.fetch_by_key("A:2020aa").await.unwrap().identifier, "A:2020aa");
        assert!(source.fetch_by_key("B:2020bb").await.unwrap_err().is_transient());
        assert!(source.fetch_by_key("C:2020cc").await.unwrap_err().is_not_found());

        let xref = source.cross_reference("A:2020aa").await.unwrap();
        assert!(source.fetch_by_cross_reference(&xref).await.is_ok());
        assert!(source.cross_reference("C:2020cc").await.unwrap().is_empty());

        assert_eq!(source.call_count(), 6);
        assert_eq!(source.calls()[0], "fetch_by_key A:2020aa");
    }

    #[tokio::test]
    async fn test_unavailable_source() {
        let source = MockSource::unavailable(SourceId::Ads, "connection refused");
        let err = source.fetch_by_key("2016PhRvL.116f1102A").await.unwrap_err();
        assert!(err.is_transient());
        assert!(source.cross_reference("x").await.is_err());
        assert_eq!(source.call_count(), 2);
    }
}
