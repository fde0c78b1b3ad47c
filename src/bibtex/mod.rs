//! BibTeX text utilities.
//!
//! Records fetched from the sources are kept as raw entry text. These helpers
//! do the few edits the merge step needs (renaming the entry key, truncating
//! the author list, reading single fields) without round-tripping the entry
//! through a full data model, so the source's formatting is preserved.

mod document;

pub use document::{BibliographyDocument, Block};

use regex::Regex;
use std::sync::OnceLock;

/// Errors raised while building a bibliography document
#[derive(Debug, thiserror::Error)]
pub enum BibtexError {
    /// An entry with this key is already in the document
    #[error("Duplicate entry key: {0}")]
    DuplicateKey(String),

    /// The entry text has no `@type{key,` header
    #[error("Entry has no key: {0}")]
    MissingKey(String),

    /// Reading the bibliography file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn entry_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@\w+\s*[{(]\s*([^,\s]+)\s*,").expect("valid entry header regex"))
}

fn entry_key_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(@\w+\s*[{(]\s*)[^,\s]+").expect("valid entry key regex"))
}

fn author_separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s+and\s+").expect("valid separator regex"))
}

/// Key of the first entry in `bibtex`
pub fn entry_key(bibtex: &str) -> Option<&str> {
    entry_header_regex()
        .captures(bibtex)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Replace the key of the first entry in `bibtex` with `new_key`.
///
/// Only the first header is touched. The replacement is literal, so keys
/// that start with digits or contain `$` are inserted as-is.
pub fn replace_key(bibtex: &str, new_key: &str) -> String {
    entry_key_prefix_regex()
        .replacen(bibtex, 1, |caps: &regex::Captures| format!("{}{}", &caps[1], new_key))
        .into_owned()
}

/// Location of a field value inside an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSpan {
    /// Start of the value including its delimiter
    start: usize,
    /// End of the value including its delimiter
    end: usize,
    /// The value without delimiters
    inner_start: usize,
    inner_end: usize,
}

fn find_field(bibtex: &str, name: &str) -> Option<FieldSpan> {
    let pattern = format!(r"(?i)[,{{(\s]{}\s*=\s*", regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    let m = re.find(bibtex)?;
    parse_value(bibtex, m.end())
}

/// Parse a field value starting at byte `pos`: `{...}`, `"..."` or a bare word
fn parse_value(text: &str, pos: usize) -> Option<FieldSpan> {
    let bytes = text.as_bytes();
    match bytes.get(pos)? {
        b'{' => {
            let mut depth = 0usize;
            for (i, &b) in bytes.iter().enumerate().skip(pos) {
                match b {
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(FieldSpan {
                                start: pos,
                                end: i + 1,
                                inner_start: pos + 1,
                                inner_end: i,
                            });
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        b'"' => {
            let mut depth = 0usize;
            let mut prev = 0u8;
            for (i, &b) in bytes.iter().enumerate().skip(pos + 1) {
                match b {
                    b'{' => depth += 1,
                    b'}' => depth = depth.saturating_sub(1),
                    b'"' if depth == 0 && prev != b'\\' => {
                        return Some(FieldSpan {
                            start: pos,
                            end: i + 1,
                            inner_start: pos + 1,
                            inner_end: i,
                        });
                    }
                    _ => {}
                }
                prev = b;
            }
            None
        }
        _ => {
            let rest = &text[pos..];
            let len = rest
                .find(|c: char| c == ',' || c == '}' || c == ')' || c == '\n')
                .unwrap_or(rest.len());
            let value = rest[..len].trim_end();
            if value.is_empty() {
                return None;
            }
            Some(FieldSpan {
                start: pos,
                end: pos + value.len(),
                inner_start: pos,
                inner_end: pos + value.len(),
            })
        }
    }
}

/// Value of field `name` (case-insensitive), without its delimiters
pub fn field_value(bibtex: &str, name: &str) -> Option<String> {
    let span = find_field(bibtex, name)?;
    Some(bibtex[span.inner_start..span.inner_end].trim().to_string())
}


/// Split an author list on ` and ` at brace depth zero
fn split_authors(value: &str) -> Vec<&str> {
    let mut authors = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;
    let bytes = value.as_bytes();

    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b' ' | b'\t' | b'\n' | b'\r' if depth == 0 => {
                if let Some(m) = author_separator_regex().find(&value[i..]) {
                    authors.push(value[start..i].trim());
                    i += m.end();
                    start = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    authors.push(value[start..].trim());
    authors.retain(|a| !a.is_empty());
    authors
}

/// Keep the first `max_authors` authors and append `and others`.
///
/// `max_authors == 0` disables truncation. Entries without an author field,
/// or with no more than `max_authors` authors, are returned unchanged.
pub fn truncate_authors(bibtex: &str, max_authors: usize) -> String {
    if max_authors == 0 {
        return bibtex.to_string();
    }
    let Some(span) = find_field(bibtex, "author") else {
        return bibtex.to_string();
    };

    let authors = split_authors(&bibtex[span.inner_start..span.inner_end]);
    if authors.len() <= max_authors {
        return bibtex.to_string();
    }

    let mut kept: Vec<&str> = authors[..max_authors].to_vec();
    kept.push("others");
    let (open, close) = match bibtex.as_bytes()[span.start] {
        b'"' => ("\"", "\""),
        _ => ("{", "}"),
    };

    format!(
        "{}{}{}{}{}",
        &bibtex[..span.start],
        open,
        kept.join(" and "),
        close,
        &bibtex[span.end..]
    )
}

/// A `@misc` entry that points at `target` through the `crossref` field
pub fn crossref_stub(key: &str, target: &str) -> String {
    format!("@misc{{{},\n    crossref = {{{}}}\n}}", key, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: &str = r#"@article{Abbott:2016blz,
    author = "Abbott, B. P. and Abbott, R. and Abbott, T. D. and Acernese, F.",
    title = "{Observation of Gravitational Waves from a Binary Black Hole Merger}",
    journal = "Phys. Rev. Lett.",
    volume = 116,
    eprint = "1602.03837",
    doi = {10.1103/PhysRevLett.116.061102},
    year = "2016"
}"#;

    #[test]
    fn test_entry_key() {
        assert_eq!(entry_key(ENTRY), Some("Abbott:2016blz"));
        assert_eq!(entry_key("@misc{ 2016PhRvL.116f1102A ,\n}"), Some("2016PhRvL.116f1102A"));
        assert_eq!(entry_key("no entry here"), None);
    }

    #[test]
    fn test_replace_key_only_first() {
        let text = "@article{old,\n  title={x}\n}\n@article{other,\n}";
        let replaced = replace_key(text, "new:2020ab");
        assert!(replaced.starts_with("@article{new:2020ab,"));
        assert!(replaced.contains("@article{other,"));
    }

    #[test]
    fn test_replace_key_literal() {
        let replaced = replace_key(ENTRY, "2508.18080");
        assert!(replaced.starts_with("@article{2508.18080,"));

        let replaced = replace_key(ENTRY, "cost$1");
        assert!(replaced.starts_with("@article{cost$1,"));
    }

    #[test]
    fn test_field_values() {
        assert_eq!(field_value(ENTRY, "eprint").as_deref(), Some("1602.03837"));
        assert_eq!(
            field_value(ENTRY, "DOI").as_deref(),
            Some("10.1103/PhysRevLett.116.061102")
        );
        assert_eq!(field_value(ENTRY, "volume").as_deref(), Some("116"));
        assert_eq!(
            field_value(ENTRY, "title").as_deref(),
            Some("{Observation of Gravitational Waves from a Binary Black Hole Merger}")
        );
        assert_eq!(field_value(ENTRY, "pages"), None);
    }

    #[test]
    fn test_truncate_authors() {
        let truncated = truncate_authors(ENTRY, 2);
        assert!(truncated.contains(r#"author = "Abbott, B. P. and Abbott, R. and others","#));
        assert!(truncated.contains("eprint = \"1602.03837\""));

        assert_eq!(truncate_authors(ENTRY, 0), ENTRY);
        assert_eq!(truncate_authors(ENTRY, 4), ENTRY);
        assert_eq!(truncate_authors(ENTRY, 10), ENTRY);
    }

    #[test]
    fn test_truncate_authors_respects_braces() {
        let entry = "@article{k:2020ab,\n  author = {{Smith and Jones Collaboration} and Doe, J. and Roe, R.},\n}";
        let truncated = truncate_authors(entry, 1);
        assert!(truncated.contains("author = {{Smith and Jones Collaboration} and others},"));

        let no_author = "@misc{k:2020ab,\n  title = {x}\n}";
        assert_eq!(truncate_authors(no_author, 1), no_author);
    }

    #[test]
    fn test_truncate_multiline_author_list() {
        let entry = "@article{k:2020ab,\n  author = {A, One and\n B, Two and\n C, Three}\n}";
        let truncated = truncate_authors(entry, 2);
        assert!(truncated.contains("author = {A, One and B, Two and others}"));
    }

    #[test]
    fn test_crossref_stub() {
        assert_eq!(
            crossref_stub("2508.18080", "LIGOScientific:2025hdt"),
            "@misc{2508.18080,\n    crossref = {LIGOScientific:2025hdt}\n}"
        );
        assert_eq!(entry_key(&crossref_stub("2508.18080", "X:2025ab")), Some("2508.18080"));
    }
}
