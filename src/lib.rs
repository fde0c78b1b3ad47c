//! # citefetch
//!
//! Fetch BibTeX entries for the citation keys used in a LaTeX project from
//! INSPIRE, NASA ADS and Semantic Scholar, and merge them into a
//! bibliography file without touching entries that are already there.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Citation keys, their provenance, source ids and fetch outcomes
//! - [`extract`]: Citation key extraction from `.tex` sources
//! - [`bibtex`]: BibTeX entry transforms and the bibliography document
//! - [`sources`]: Citation database clients behind the [`Source`] trait
//! - [`resolve`]: The per-key fallback chain and the batch merge
//! - [`config`]: Configuration file, CLI overrides and credentials
//! - [`ui`]: Terminal output
//! - [`utils`]: HTTP client, retries and atomic file writes

pub mod bibtex;
pub mod config;
pub mod extract;
pub mod models;
pub mod resolve;
pub mod sources;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use bibtex::BibliographyDocument;
pub use models::{CitationKey, FetchOutcome, PreferredSource, Provenance, SourceId};
pub use resolve::{MergeCoordinator, MergeOptions, MergeReport, ResolutionEngine};
pub use sources::{Source, SourceError, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
