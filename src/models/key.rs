//! Citation keys and their provenance.
//!
//! A citation key is classified once, when it is constructed, into one of the
//! identifier families the resolution engine knows how to fetch:
//!
//! - INSPIRE texkeys such as `Abbott:2016blz`
//! - NASA ADS bibcodes such as `2016PhRvL.116f1102A`
//! - arXiv identifiers such as `2508.18080` or `hep-ph/9905318`
//!
//! Anything else is [`Provenance::Unknown`] and is never sent to a source.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Minimum length of an ADS bibcode. Real bibcodes are 19 characters, but
/// some exported keys are trimmed of their padding dots.
const MIN_BIBCODE_LEN: usize = 15;

/// Identifier family a citation key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// INSPIRE texkey: `Author:YYYYsuffix`
    PrimaryFormat,
    /// ADS bibcode: `YYYYJJJJJVVVVMPPPPA`
    BibcodeFormat,
    /// arXiv identifier, new (`YYMM.NNNNN`) or old (`archive/YYMMNNN`) style
    ArxivFormat,
    /// Not a fetchable identifier
    Unknown,
}

impl Provenance {
    /// Human-readable name of the identifier family
    pub fn name(&self) -> &'static str {
        match self {
            Provenance::PrimaryFormat => "texkey",
            Provenance::BibcodeFormat => "bibcode",
            Provenance::ArxivFormat => "arXiv id",
            Provenance::Unknown => "unknown",
        }
    }

    /// Whether keys of this family can be resolved against a source
    pub fn is_fetchable(&self) -> bool {
        !matches!(self, Provenance::Unknown)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn bibcode_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}[A-Za-z&.]+\..*[A-Z]$").expect("valid bibcode regex"))
}

fn arxiv_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:\d{4}\.\d{4,5}|[a-z][a-z-]*(?:\.[A-Z]{2})?/\d{7})(?:v\d+)?$")
            .expect("valid arXiv regex")
    })
}

fn texkey_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]*:\d{4}[A-Za-z0-9]*$").expect("valid texkey regex")
    })
}

/// Check if a key looks like an ADS bibcode (e.g. `2016PhRvL.116f1102A`)
pub fn is_bibcode(key: &str) -> bool {
    key.len() >= MIN_BIBCODE_LEN && bibcode_regex().is_match(key)
}

/// Check if a key looks like an arXiv identifier (e.g. `2508.18080`, `gr-qc/0002091`)
pub fn is_arxiv_id(key: &str) -> bool {
    arxiv_regex().is_match(key)
}

/// Check if a key looks like an INSPIRE texkey (e.g. `Abbott:2016blz`)
pub fn is_texkey(key: &str) -> bool {
    texkey_regex().is_match(key)
}

/// Classify a citation key.
///
/// Total and deterministic. The bibcode shape is tested first because it is
/// the most specific: a bibcode never contains a colon, and its leading year
/// would otherwise be indistinguishable from free text.
pub fn classify(key: &str) -> Provenance {
    if is_bibcode(key) {
        Provenance::BibcodeFormat
    } else if is_arxiv_id(key) {
        Provenance::ArxivFormat
    } else if is_texkey(key) {
        Provenance::PrimaryFormat
    } else {
        Provenance::Unknown
    }
}

/// A citation key together with its classified provenance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CitationKey {
    raw: String,
    provenance: Provenance,
}

impl CitationKey {
    /// Create and classify a key
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let provenance = classify(&raw);
        Self { raw, provenance }
    }

    /// The key text exactly as cited
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

impl fmt::Display for CitationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for CitationKey {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bibcodes() {
        assert!(is_bibcode("2016PhRvL.116f1102A"));
        assert!(is_bibcode("2020A&A...641A...6P"));
        assert!(is_bibcode("2025ApJ...995L..18A"));

        assert!(!is_bibcode("Abbott:2016blz"));
        assert!(!is_bibcode("2020"));
        assert!(!is_bibcode("PhRvL.116f1102A"));
    }

    #[test]
    fn test_texkeys() {
        assert!(is_texkey("Abbott:2016blz"));
        assert!(is_texkey("LIGO-Scientific:2020abc"));
        assert!(is_texkey("Smith:2020"));

        assert!(!is_texkey("2016PhRvL.116f1102A"));
        assert!(!is_texkey("Abbott2016blz"));
        assert!(!is_texkey("sec:intro"));
        assert!(!is_texkey(":2020abc"));
    }

    #[test]
    fn test_arxiv_ids() {
        assert!(is_arxiv_id("2508.18080"));
        assert!(is_arxiv_id("2001.1234"));
        assert!(is_arxiv_id("2106.15928v2"));
        assert!(is_arxiv_id("hep-ph/9905318"));
        assert!(is_arxiv_id("gr-qc/0002091"));
        assert!(is_arxiv_id("math.GT/0309136"));

        assert!(!is_arxiv_id("Abbott:2016blz"));
        assert!(!is_arxiv_id("2016PhRvL.116f1102A"));
        assert!(!is_arxiv_id("nocolon"));
        assert!(!is_arxiv_id("2508.180800"));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("2016PhRvL.116f1102A"), Provenance::BibcodeFormat);
        assert_eq!(classify("Smith:2020abc"), Provenance::PrimaryFormat);
        assert_eq!(classify("2508.18080"), Provenance::ArxivFormat);
        assert_eq!(classify("knuth84"), Provenance::Unknown);
        assert_eq!(classify("fig:setup"), Provenance::Unknown);
        assert_eq!(classify(""), Provenance::Unknown);
    }

    #[test]
    fn test_citation_key_keeps_raw_text() {
        let key = CitationKey::new("Smith:2020abc");
        assert_eq!(key.as_str(), "Smith:2020abc");
        assert_eq!(key.provenance(), Provenance::PrimaryFormat);
        assert_eq!(key.to_string(), "Smith:2020abc");
        assert!(key.provenance().is_fetchable());
        assert!(!CitationKey::new("plain").provenance().is_fetchable());
    }
}
