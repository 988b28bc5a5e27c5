//! Entry id derivation
//!
//! Records that arrive without an identifier (RIS without `ID`, EndNote
//! without `<label>`, CSL-JSON without `id`) get a BibTeX-style cite key built
//! from the first author, the year and the first significant title word.

use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;

use crate::entry::Entry;

const STOPWORDS: [&str; 36] = [
    "a", "an", "the", "on", "in", "of", "for", "to", "and", "with", "by", "from", "as", "at",
    "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did",
    "will", "would", "could", "should", "may", "might", "must", "shall", "can",
];

/// Build a cite key such as `Smith2024Machine`. Falls back to `"Unknown"`.
pub fn generate_cite_key(family: Option<&str>, year: Option<i32>, title: Option<&str>) -> String {
    let mut key = String::new();

    if let Some(family) = family {
        key.push_str(&normalize_for_key(family));
    }

    if let Some(year) = year.filter(|y| (0..=9999).contains(y)) {
        key.push_str(&format!("{:04}", year));
    }

    if let Some(word) = title.and_then(first_significant_word) {
        key.push_str(&normalize_for_key(&word));
    }

    if key.is_empty() {
        key.push_str("Unknown");
    }
    key
}

/// Cite key for an entry, from its first author, issued year and title
pub fn derive_entry_id(entry: &Entry) -> String {
    let family = Some(entry.first_author_key()).filter(|f| !f.is_empty());
    generate_cite_key(family, entry.year(), entry.title.as_deref())
}

/// Append `a`..`z`, then `2`, `3`, ... until `base` no longer collides
pub fn make_cite_key_unique(base: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(base) {
        return base.to_string();
    }

    for suffix in 'a'..='z' {
        let candidate = format!("{}{}", base, suffix);
        if !existing.contains(&candidate) {
            return candidate;
        }
    }

    (2..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !existing.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// First word of the title that is not a stopword
fn first_significant_word(title: &str) -> Option<String> {
    let words: Vec<String> = title
        .split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect();

    words
        .iter()
        .find(|w| !STOPWORDS.contains(&w.to_lowercase().as_str()))
        .or_else(|| words.first())
        .cloned()
}

/// ASCII-fold, drop punctuation, capitalize: "García-López" -> "Garcialopez"
fn normalize_for_key(s: &str) -> String {
    let folded: String = s
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let mut chars = folded.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
