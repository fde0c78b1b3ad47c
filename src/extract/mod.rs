//! Citation key extraction from LaTeX sources.
//!
//! Recognizes `\cite` and `\Cite` together with every lettered variant
//! (`\citep`, `\citet`, `\citealt`, `\citeauthor`, `\Citep`, ...), an
//! optional `*`, and any number of `[...]` optional arguments before the
//! braced key list.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

use crate::models::{is_arxiv_id, is_bibcode};

/// Keys and warnings found in one or more documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Distinct fetchable keys, sorted
    pub keys: BTreeSet<String>,
    pub warnings: Vec<String>,
}

impl Extraction {
    fn merge(&mut self, other: Extraction) {
        self.keys.extend(other.keys);
        self.warnings.extend(other.warnings);
    }
}

fn cite_command_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\[Cc]ite[a-zA-Z]*\*?").expect("valid cite regex"))
}

/// Whether a cited key should be looked up in a database.
///
/// Free-text keys without a colon are assumed to point at manually
/// maintained entries.
pub fn is_fetchable_key(key: &str) -> bool {
    key.contains(':') || is_bibcode(key) || is_arxiv_id(key)
}

/// Blank out `%` comments so commented-out citations are not collected.
/// Line breaks are kept so line numbers stay correct.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let bytes = line.as_bytes();
        let cut = (0..bytes.len()).find(|&i| {
            // `\%` is a literal percent, `\\%` is a line break then a comment
            bytes[i] == b'%' && bytes[..i].iter().rev().take_while(|&&b| b == b'\\').count() % 2 == 0
        });
        match cut {
            Some(i) => {
                out.push_str(&line[..i]);
                out.extend(line[i..].chars().map(|c| if c == '\n' { '\n' } else { ' ' }));
            }
            None => out.push_str(line),
        }
    }
    out
}

fn line_of(text: &str, pos: usize) -> usize {
    text[..pos].matches('\n').count() + 1
}

fn skip_whitespace(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Scan `text` for citation keys.
///
/// Never fails: malformed commands and empty keys become warnings and the
/// scan continues with the next command.
pub fn extract(text: &str) -> Extraction {
    let text = strip_comments(text);
    let mut result = Extraction::default();

    for command in cite_command_regex().find_iter(&text) {
        let line = line_of(&text, command.start());
        let name = command.as_str();
        let mut pos = skip_whitespace(&text, command.end());

        // Optional arguments
        let mut unterminated = false;
        while text[pos..].starts_with('[') {
            match text[pos..].find(']') {
                Some(close) => pos = skip_whitespace(&text, pos + close + 1),
                None => {
                    unterminated = true;
                    break;
                }
            }
        }
        if unterminated {
            result
                .warnings
                .push(format!("line {}: unterminated optional argument in {}", line, name));
            continue;
        }

        if !text[pos..].starts_with('{') {
            result
                .warnings
                .push(format!("line {}: {} without a key argument", line, name));
            continue;
        }
        let Some(close) = text[pos..].find('}') else {
            result
                .warnings
                .push(format!("line {}: unterminated key list in {}", line, name));
            continue;
        };

        let argument = &text[pos + 1..pos + close];
        if argument.trim().is_empty() {
            result
                .warnings
                .push(format!("line {}: empty key list in {}", line, name));
            continue;
        }

        for key in argument.split(',').map(str::trim) {
            if key.is_empty() {
                result
                    .warnings
                    .push(format!("line {}: empty citation key in {}", line, name));
            } else if is_fetchable_key(key) {
                result.keys.insert(key.to_string());
            } else {
                tracing::debug!("Ignoring non-fetchable key '{}' on line {}", key, line);
            }
        }
    }

    result
}

/// Extract keys from several files. Warnings are prefixed with the file path;
/// unreadable files become warnings too.
pub fn extract_from_files(paths: &[PathBuf]) -> Extraction {
    let mut result = Extraction::default();

    for path in paths {
        match std::fs::read(path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let mut found = extract(&text);
                tracing::debug!("{}: {} keys", path.display(), found.keys.len());
                found.warnings = found
                    .warnings
                    .into_iter()
                    .map(|w| format!("{}: {}", path.display(), w))
                    .collect();
                result.merge(found);
            }
            Err(e) => result
                .warnings
                .push(format!("{}: could not read file: {}", path.display(), e)),
        }
    }

    result
}

/// `.tex` files under `path`, sorted. A file path is returned as-is.
pub fn find_tex_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "tex"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(text: &str) -> Vec<String> {
        extract(text).keys.into_iter().collect()
    }

    #[test]
    fn test_cite_variants() {
        let text = r"
            \cite{Smith:2020abc}
            \citep{Jones:2019xy}
            \citet[see][p.~3]{Doe:2018ab}
            \Citep{Roe:2017cd}
            \citeauthor*{Poe:2016ef}
            \citealp[e.g.]{2016PhRvL.116f1102A}
        ";
        assert_eq!(
            keys(text),
            vec![
                "2016PhRvL.116f1102A",
                "Doe:2018ab",
                "Jones:2019xy",
                "Poe:2016ef",
                "Roe:2017cd",
                "Smith:2020abc"
            ]
        );
    }

    #[test]
    fn test_multiple_keys_and_dedup() {
        let text = r"\cite{A:2020aa, B:2021bb} and \cite{ A:2020aa }";
        assert_eq!(keys(text), vec!["A:2020aa", "B:2021bb"]);
    }

    #[test]
    fn test_free_text_keys_are_ignored_silently() {
        let result = extract(r"\cite{knuth84, Smith:2020abc, 2508.18080}");
        assert_eq!(
            result.keys.into_iter().collect::<Vec<_>>(),
            vec!["2508.18080", "Smith:2020abc"]
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_and_malformed_commands_warn() {
        let text = "\\cite{}\n\\cite{A:2020aa,,B:2020bb}\n\\cite[oops{C:2020cc}\n\\citep\n\\cite{D:2020dd";
        let result = extract(text);
        assert_eq!(result.keys.len(), 2);
        assert!(result.keys.contains("A:2020aa"));
        assert!(result.keys.contains("B:2020bb"));
        assert_eq!(result.warnings.len(), 5);
        assert!(result.warnings[0].starts_with("line 1: empty key list"));
        assert!(result.warnings[1].starts_with("line 2: empty citation key"));
        assert!(result.warnings[2].starts_with("line 3: unterminated optional argument"));
        assert!(result.warnings[3].starts_with("line 4: \\citep without a key argument"));
        assert!(result.warnings[4].starts_with("line 5: unterminated key list"));
    }

    #[test]
    fn test_commented_citations_are_skipped() {
        let text = "% \\cite{Old:2000aa}\nCost is 5\\% \\cite{New:2020bb}\n";
        assert_eq!(keys(text), vec!["New:2020bb"]);
    }

    #[test]
    fn test_comment_after_line_break() {
        let text = concat!(
            r"First line\\% \cite{Old:2000aa}", "\n",
            r"50\\\% off \cite{New:2020bb}", "\n",
        );
        assert_eq!(keys(text), vec!["New:2020bb"]);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let text = r"\citep[e.g.][]{X:2001ab,Y:2002cd} \cite{} \cite{Z:2003ef}";
        assert_eq!(extract(text), extract(text));
    }

    #[test]
    fn test_extract_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("chapters");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(dir.path().join("main.tex"), r"\cite{A:2020aa} \cite{}").unwrap();
        std::fs::write(sub.join("intro.tex"), r"\citep{B:2021bb}").unwrap();
        std::fs::write(sub.join("notes.txt"), r"\cite{C:2022cc}").unwrap();

        let files = find_tex_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("chapters/intro.tex"));

        let mut paths = files.clone();
        paths.push(dir.path().join("missing.tex"));
        let result = extract_from_files(&paths);
        assert_eq!(result.keys.len(), 2);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].contains("main.tex: line 1: empty key list"));
        assert!(result.warnings[1].contains("could not read file"));

        assert_eq!(find_tex_files(&dir.path().join("main.tex")).len(), 1);
    }
}
