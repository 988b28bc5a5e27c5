//! Raw BibTeX records
//!
//! A [`BibRecord`] is one `@type{key, field = value, ...}` block exactly as the
//! grammar saw it: field names lowercased, values with `@string` macros and
//! `#` concatenation resolved but LaTeX still encoded.

/// How a value was written in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueStyle {
    /// `{value}` or `"value"`
    #[default]
    Delimited,
    /// A bare number or macro name, e.g. `month = mar`
    Bare,
}

/// A single field (name-value pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibField {
    pub name: String,
    pub value: String,
    pub style: ValueStyle,
}

/// One entry block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibRecord {
    /// Entry type as written, lowercased (`article`, `phdthesis`, ...)
    pub kind: String,
    /// Cite key; empty when the source omitted it
    pub key: String,
    pub fields: Vec<BibField>,
    /// Source text of the whole block
    pub raw: String,
    /// 1-based line the block starts on
    pub line: u32,
}

impl BibRecord {
    pub fn new(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: kind.into().to_lowercase(),
            key: key.into(),
            fields: Vec::new(),
            raw: String::new(),
            line: 0,
        }
    }

    /// Append a delimited field
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.push_styled(name, value, ValueStyle::Delimited);
    }

    pub fn push_styled(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        style: ValueStyle,
    ) {
        self.fields.push(BibField {
            name: name.into().to_lowercase(),
            value: value.into(),
            style,
        });
    }

    /// First value of a field (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Field names that appear more than once, in first-seen order
    pub fn duplicate_fields(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        let mut duplicates: Vec<&str> = Vec::new();
        for field in &self.fields {
            let name = field.name.as_str();
            if seen.contains(&name) {
                if !duplicates.contains(&name) {
                    duplicates.push(name);
                }
            } else {
                seen.push(name);
            }
        }
        duplicates
    }
}
