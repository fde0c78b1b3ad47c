//! An ordered, keyed BibTeX document.

use std::collections::HashMap;
use std::path::Path;

use super::BibtexError;

/// Entry types that carry no citation key
const NON_ENTRY_TYPES: [&str; 3] = ["string", "comment", "preamble"];

/// One top-level block of a BibTeX file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// A keyed entry such as `@article{key, ...}`
    Entry { key: String, text: String },
    /// Anything else: `@string`, `@comment`, `@preamble`, free text
    Raw(String),
}

impl Block {
    pub fn text(&self) -> &str {
        match self {
            Block::Entry { text, .. } => text,
            Block::Raw(text) => text,
        }
    }
}

/// A bibliography kept as ordered blocks with a key index.
///
/// No two entries share a key: [`BibliographyDocument::insert`] rejects a key
/// that is already present, and parsing demotes later duplicates to raw
/// blocks so their text still survives a rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BibliographyDocument {
    blocks: Vec<Block>,
    index: HashMap<String, usize>,
}

impl BibliographyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse BibTeX text. Never fails; unrecognized text is kept verbatim.
    pub fn parse(text: &str) -> Self {
        let mut doc = Self::new();
        let mut pos = 0usize;

        while pos < text.len() {
            let Some(offset) = text[pos..].find('@') else {
                doc.push_raw(&text[pos..]);
                break;
            };
            let at = pos + offset;
            doc.push_raw(&text[pos..at]);

            match scan_block(text, at) {
                Some((end, entry_type)) => {
                    let block_text = &text[at..end];
                    if NON_ENTRY_TYPES.contains(&entry_type.to_lowercase().as_str()) {
                        doc.push_raw(block_text);
                    } else {
                        doc.push_entry(block_text);
                    }
                    pos = end;
                }
                None => {
                    // Not a block header, or unbalanced to the end of file
                    let next = text[at + 1..]
                        .find("\n@")
                        .map(|i| at + 1 + i + 1)
                        .unwrap_or(text.len());
                    tracing::warn!(
                        "Keeping malformed BibTeX text verbatim: {}",
                        text[at..next].lines().next().unwrap_or_default()
                    );
                    doc.push_raw(&text[at..next]);
                    pos = next;
                }
            }
        }

        doc
    }

    /// Read and parse a bibliography file
    pub fn read(path: &Path) -> Result<Self, BibtexError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    fn push_raw(&mut self, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.blocks.push(Block::Raw(trimmed.to_string()));
        }
    }

    fn push_entry(&mut self, text: &str) {
        match self.insert(text) {
            Ok(()) => {}
            Err(BibtexError::DuplicateKey(key)) => {
                tracing::warn!("Duplicate key '{}' in bibliography; keeping later copy as raw text", key);
                self.push_raw(text);
            }
            Err(_) => self.push_raw(text),
        }
    }

    /// Key and trimmed text of an entry not yet in the document
    fn new_entry<'e>(&self, entry: &'e str) -> Result<(String, &'e str), BibtexError> {
        let text = entry.trim();
        let key = super::entry_key(text)
            .ok_or_else(|| BibtexError::MissingKey(text.lines().next().unwrap_or_default().to_string()))?
            .to_string();
        if self.index.contains_key(&key) {
            return Err(BibtexError::DuplicateKey(key));
        }
        Ok((key, text))
    }

    /// Append an entry, keyed by its own header.
    ///
    /// Fails if the text has no key or the key is already present.
    pub fn insert(&mut self, entry: &str) -> Result<(), BibtexError> {
        let (key, text) = self.new_entry(entry)?;
        self.index.insert(key.clone(), self.blocks.len());
        self.blocks.push(Block::Entry {
            key,
            text: text.to_string(),
        });
        Ok(())
    }

    /// Insert an entry directly in front of the entry keyed `before`.
    ///
    /// BibTeX resolves a `crossref` only when the referenced entry comes
    /// later in the file, so stubs go ahead of their target. Appends when
    /// `before` is absent.
    pub fn insert_before(&mut self, entry: &str, before: &str) -> Result<(), BibtexError> {
        let Some(&position) = self.index.get(before) else {
            return self.insert(entry);
        };
        let (key, text) = self.new_entry(entry)?;
        for slot in self.index.values_mut() {
            if *slot >= position {
                *slot += 1;
            }
        }
        self.index.insert(key.clone(), position);
        self.blocks.insert(
            position,
            Block::Entry {
                key,
                text: text.to_string(),
            },
        );
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Entry text for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&i| self.blocks[i].text())
    }

    /// Keyed entries in document order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Entry { key, text } => Some((key.as_str(), text.as_str())),
            Block::Raw(_) => None,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries().map(|(key, _)| key)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of keyed entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Serialize: blocks separated by a blank line, with a trailing newline
    pub fn to_bibtex(&self) -> String {
        if self.blocks.is_empty() {
            return String::new();
        }
        let mut out = self
            .blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n\n");
        out.push('\n');
        out
    }
}

/// Find the end of the block starting at `at` (which points at `@`).
///
/// Returns the byte offset just past the closing delimiter and the entry
/// type, or `None` if there is no `type{` header or it never closes.
fn scan_block(text: &str, at: usize) -> Option<(usize, &str)> {
    let bytes = text.as_bytes();
    let mut i = at + 1;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    if i == at + 1 {
        return None;
    }
    let entry_type = &text[at + 1..i];
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }

    let paren = match bytes.get(i)? {
        b'{' => false,
        b'(' => true,
        _ => return None,
    };

    // A parenthesized entry closes on a `)` outside every brace group
    let mut braces = 0usize;
    for (j, &b) in bytes.iter().enumerate().skip(i + 1) {
        match b {
            b'{' => braces += 1,
            b'}' if braces == 0 => {
                if paren {
                    return None;
                }
                return Some((j + 1, entry_type));
            }
            b'}' => braces -= 1,
            b')' if paren && braces == 0 => return Some((j + 1, entry_type)),
            _ => {}
        }
    }
    None
}
