//! Core data models: citation keys, sources and resolution outcomes.

mod key;
mod resolution;

pub use key::{classify, is_arxiv_id, is_bibcode, is_texkey, CitationKey, Provenance};
pub use resolution::{
    BibtexRecord, CrossReference, FetchOutcome, PreferredSource, ResolutionRequest, SourceId,
};
