//! Format parsers and generators
//!
//! Every format implements [`FormatParser`] and [`FormatGenerator`]; the
//! converter holds them as trait objects so any of them can be swapped.

pub mod bibtex;
pub mod csl_json;
pub mod endnote;
pub mod ris;

use std::collections::HashSet;

use citebridge_domain::{derive_entry_id, make_cite_key_unique, ConversionResult, Entry, Warning};

use crate::config::GenerateOptions;

pub use bibtex::{BibTeXGenerator, BibTeXParser};
pub use csl_json::{CslJsonGenerator, CslJsonParser};
pub use endnote::{EndNoteGenerator, EndNoteParser};
pub use ris::{RisGenerator, RisParser};

/// Raw text to entries
pub trait FormatParser: Send + Sync {
    fn parse(&self, content: &str) -> ConversionResult;

    /// Check a document without building entries
    fn validate(&self, _content: &str) -> Vec<Warning> {
        Vec::new()
    }
}

/// Entries to raw text
pub trait FormatGenerator: Send + Sync {
    fn generate(&self, entries: &[Entry], options: &GenerateOptions) -> String;

    /// Like `generate`, also reporting values the format could not encode
    fn generate_with_warnings(
        &self,
        entries: &[Entry],
        options: &GenerateOptions,
    ) -> (String, Vec<Warning>) {
        (self.generate(entries, options), Vec::new())
    }
}

/// Dash characters accepted between the pages of a range
pub const PAGE_RANGE_DASHES: [char; 3] = ['-', '\u{2013}', '\u{2014}'];

/// Split a page value into start and optional end page.
///
/// Runs of dashes (`--`, `-–`) count as one separator.
pub fn split_page_range(page: &str) -> (String, Option<String>) {
    let page = page.trim();
    match page.find(PAGE_RANGE_DASHES) {
        Some(idx) => {
            let start = page[..idx].trim();
            let end = page[idx..].trim_start_matches(PAGE_RANGE_DASHES).trim();
            if start.is_empty() || end.is_empty() {
                (page.to_string(), None)
            } else {
                (start.to_string(), Some(end.to_string()))
            }
        }
        None => (page.to_string(), None),
    }
}

/// Join start and end page with `sep`
pub fn join_page_range(start: &str, end: Option<&str>, sep: &str) -> String {
    match end.map(str::trim).filter(|e| !e.is_empty()) {
        Some(end) => format!("{}{}{}", start.trim(), sep, end),
        None => start.trim().to_string(),
    }
}

/// Split a keyword field into its keywords
pub fn split_keywords(keywords: &str) -> Vec<String> {
    keywords
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join keywords into the canonical comma-separated form
pub fn join_keywords<S: AsRef<str>>(keywords: &[S]) -> String {
    keywords
        .iter()
        .map(|k| k.as_ref().trim())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Serial numbers with 8 significant characters are ISSNs; anything else
/// under a shared ISBN/ISSN tag is read as an ISBN.
pub(crate) fn is_issn(value: &str) -> bool {
    let digits = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .count();
    digits == 8
}

/// Entry ids already handed out during one parse
#[derive(Debug, Default)]
pub(crate) struct IdRegistry {
    seen: HashSet<String>,
}

impl IdRegistry {
    /// Give `entry` an id when it has none, and record it.
    ///
    /// Returns a warning when the id had to be derived.
    pub(crate) fn assign(&mut self, entry: &mut Entry, field: &str) -> Option<Warning> {
        let warning = if entry.id.trim().is_empty() {
            let base = derive_entry_id(entry);
            entry.id = make_cite_key_unique(&base, &self.seen);
            Some(Warning::validation(
                entry.id.clone(),
                field,
                format!("Record has no {}; derived '{}'", field, entry.id),
            ))
        } else {
            None
        };
        self.seen.insert(entry.id.clone());
        warning
    }
}

/// Attach the record's warnings to its metadata and add it to the result
pub(crate) fn emit_entry(result: &mut ConversionResult, mut entry: Entry, warnings: Vec<Warning>) {
    if !warnings.is_empty() {
        entry.metadata_mut().warnings = warnings.clone();
    }
    result.push_entry(entry, warnings);
}

#[cfg(test)]
mod tests {
    use super::*;
    use citebridge_domain::ItemType;

    #[test]
    fn test_split_page_range() {
        assert_eq!(
            split_page_range("100-110"),
            ("100".to_string(), Some("110".to_string()))
        );
        assert_eq!(
            split_page_range("100--110"),
            ("100".to_string(), Some("110".to_string()))
        );
        assert_eq!(
            split_page_range("100\u{2013}110"),
            ("100".to_string(), Some("110".to_string()))
        );
        assert_eq!(
            split_page_range("100 \u{2014} 110"),
            ("100".to_string(), Some("110".to_string()))
        );
        assert_eq!(split_page_range("e1234"), ("e1234".to_string(), None));
        assert_eq!(split_page_range("100-"), ("100-".to_string(), None));
    }

    #[test]
    fn test_join_page_range() {
        assert_eq!(join_page_range("100", Some("110"), "--"), "100--110");
        assert_eq!(join_page_range("100", Some(" "), "-"), "100");
        assert_eq!(join_page_range("100", None, "-"), "100");
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            split_keywords("physics, relativity,,  light "),
            vec!["physics", "relativity", "light"]
        );
        assert_eq!(join_keywords(&["a", " b ", ""]), "a, b");
    }

    #[test]
    fn test_is_issn() {
        assert!(is_issn("1234-5678"));
        assert!(is_issn("0028-083X"));
        assert!(!is_issn("978-0-201-89683-1"));
        assert!(!is_issn("0-201-89683-4"));
    }

    #[test]
    fn test_id_registry_derives_unique_ids() {
        let mut registry = IdRegistry::default();
        let mut first = Entry::new("", ItemType::Book).with_text("title", "Relativity");
        first.issued = Some(citebridge_domain::DateSpec::from_parts(vec![1916]));
        let mut second = first.clone();

        assert!(registry.assign(&mut first, "id").is_some());
        assert!(registry.assign(&mut second, "id").is_some());
        assert!(!first.id.is_empty());
        assert_ne!(first.id, second.id);

        let mut named = Entry::new("Named", ItemType::Book);
        assert!(registry.assign(&mut named, "id").is_none());
        assert_eq!(named.id, "Named");
    }
}
