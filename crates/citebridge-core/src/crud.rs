//! Operations over canonical entries
//!
//! None of these mutate their input; each returns new entries.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use citebridge_domain::{Entry, ItemType, Person};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Conditions an entry must all meet to pass [`filter_entries`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Exact id
    pub id: Option<String>,
    /// Case-insensitive substring of any author's family, given or literal name
    pub author: Option<String>,
    /// First component of the issued date
    pub year: Option<i32>,
    #[serde(rename = "type")]
    pub item_type: Option<ItemType>,
    /// Case-insensitive substring of the keyword field
    pub keyword: Option<String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_type(mut self, item_type: ItemType) -> Self {
        self.item_type = Some(item_type);
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Whether `entry` meets every set condition
    pub fn matches(&self, entry: &Entry) -> bool {
        if let Some(id) = &self.id {
            if &entry.id != id {
                return false;
            }
        }
        if let Some(author) = &self.author {
            let needle = author.to_lowercase();
            if !entry.author.iter().any(|p| person_contains(p, &needle)) {
                return false;
            }
        }
        if let Some(year) = self.year {
            if entry.year() != Some(year) {
                return false;
            }
        }
        if let Some(item_type) = self.item_type {
            if entry.item_type != item_type {
                return false;
            }
        }
        if let Some(keyword) = &self.keyword {
            let needle = keyword.to_lowercase();
            let found = entry
                .keyword
                .as_deref()
                .is_some_and(|k| k.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        true
    }
}

fn person_contains(person: &Person, needle: &str) -> bool {
    [&person.family, &person.given, &person.literal]
        .into_iter()
        .flatten()
        .any(|name| name.to_lowercase().contains(needle))
}

/// Entries meeting all conditions of `criteria`
pub fn filter_entries(entries: &[Entry], criteria: &FilterCriteria) -> Vec<Entry> {
    entries
        .iter()
        .filter(|entry| criteria.matches(entry))
        .cloned()
        .collect()
}

/// Move keys the model does not store into the entry's custom fields
fn take_unknown_keys(map: &mut Map<String, Value>) -> BTreeMap<String, String> {
    let unknown: Vec<String> = map
        .keys()
        .filter(|key| !Entry::is_known_key(key))
        .cloned()
        .collect();
    unknown
        .into_iter()
        .filter_map(|key| {
            map.remove(&key).map(|value| {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, text)
            })
        })
        .collect()
}

fn check_type(value: &Value) -> Result<()> {
    match value {
        Value::String(name) => {
            name.parse::<ItemType>()?;
            Ok(())
        }
        other => Err(Error::InvalidEntry(format!(
            "type must be a string, got {}",
            other
        ))),
    }
}

fn build_entry(mut map: Map<String, Value>) -> Result<Entry> {
    let custom = take_unknown_keys(&mut map);
    let mut entry = Entry::from_json_map(map)?;
    if !custom.is_empty() {
        entry.metadata_mut().custom_fields.extend(custom);
    }
    Ok(entry)
}

/// Build an entry from CSL-JSON fields.
///
/// `id` and `type` are required. Keys the model does not know are kept as
/// custom fields.
pub fn create_entry(partial: Map<String, Value>) -> Result<Entry> {
    match partial.get("id") {
        None | Some(Value::Null) => return Err(Error::MissingField("id")),
        Some(Value::String(s)) if s.trim().is_empty() => return Err(Error::MissingField("id")),
        Some(Value::String(_)) | Some(Value::Number(_)) => {}
        Some(other) => {
            return Err(Error::InvalidEntry(format!(
                "id must be a string, got {}",
                other
            )))
        }
    }
    match partial.get("type") {
        None | Some(Value::Null) => return Err(Error::MissingField("type")),
        Some(value) => check_type(value)?,
    }
    build_entry(partial)
}

/// Overlay `patch` onto a copy of `entry`.
///
/// The id never changes. A `null` value clears the field.
pub fn update_entry(entry: &Entry, patch: Map<String, Value>) -> Result<Entry> {
    let mut map = entry.to_json_map()?;
    for (key, value) in patch {
        match key.as_str() {
            "id" | "_metadata" => continue,
            "type" if value.is_null() => {
                return Err(Error::InvalidEntry("type cannot be cleared".to_string()))
            }
            "type" => check_type(&value)?,
            _ => {}
        }
        if value.is_null() {
            map.remove(&key);
            if let Some(metadata) = map.get_mut("_metadata").and_then(Value::as_object_mut) {
                if let Some(Value::Object(custom)) = metadata.get_mut("custom-fields") {
                    custom.remove(&key);
                }
            }
        } else {
            map.insert(key, value);
        }
    }
    let mut updated = build_entry(map)?;
    updated.id = entry.id.clone();
    Ok(updated)
}

/// Entries whose id is not in `ids`; unknown ids are ignored
pub fn delete_entries<S: AsRef<str>>(entries: &[Entry], ids: &[S]) -> Vec<Entry> {
    let ids: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
    entries
        .iter()
        .filter(|entry| !ids.contains(entry.id.as_str()))
        .cloned()
        .collect()
}

/// What makes two entries duplicates in [`merge_entries`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupeKey {
    #[default]
    Id,
    /// DOI (case-insensitive), falling back to the id when there is none
    Doi,
}

impl DedupeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Doi => "doi",
        }
    }

    fn key_for(&self, entry: &Entry) -> String {
        match self {
            Self::Doi => match entry.doi.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
                Some(doi) => format!("doi:{}", doi.to_lowercase()),
                None => format!("id:{}", entry.id),
            },
            Self::Id => format!("id:{}", entry.id),
        }
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DedupeKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "id" => Ok(Self::Id),
            "doi" => Ok(Self::Doi),
            other => Err(Error::InvalidEntry(format!("unknown dedupe key '{}'", other))),
        }
    }
}

/// Concatenate entry sets in order, keeping the first entry for each key
pub fn merge_entries(sets: &[Vec<Entry>], dedupe_by: DedupeKey) -> Vec<Entry> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for entry in sets.iter().flatten() {
        if seen.insert(dedupe_by.key_for(entry)) {
            merged.push(entry.clone());
        } else {
            tracing::trace!("Dropping duplicate entry {} ({})", entry.id, dedupe_by);
        }
    }
    merged
}

/// Sort order for [`sort_entries`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Id, ascending
    #[default]
    Id,
    /// First author's family name or literal, ascending
    Author,
    /// First issued date component, descending; no year sorts as 0
    Year,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Author => "author",
            Self::Year => "year",
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "id" => Ok(Self::Id),
            "author" => Ok(Self::Author),
            "year" => Ok(Self::Year),
            other => Err(Error::InvalidEntry(format!("unknown sort key '{}'", other))),
        }
    }
}

/// A sorted copy of `entries`. The sort is stable.
pub fn sort_entries(entries: &[Entry], by: SortKey) -> Vec<Entry> {
    let mut sorted = entries.to_vec();
    match by {
        SortKey::Id => sorted.sort_by(|a, b| a.id.cmp(&b.id)),
        SortKey::Author => sorted.sort_by(|a, b| a.first_author_key().cmp(b.first_author_key())),
        SortKey::Year => {
            sorted.sort_by(|a, b| b.year().unwrap_or(0).cmp(&a.year().unwrap_or(0)))
        }
    }
    sorted
}
