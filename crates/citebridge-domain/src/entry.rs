//! Entry domain model
//!
//! An [`Entry`] is the canonical intermediate record every format is parsed
//! into and generated from. Its shape follows CSL-JSON: field names are the
//! CSL variable names, creators are lists of [`Person`], dates are
//! [`DateSpec`]s. Anything a source format carries that has no canonical home
//! lives in the [`FormatMetadata`] extension slot.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::date::DateSpec;
use crate::error::DomainError;
use crate::format::Format;
use crate::person::Person;
use crate::warning::Warning;

/// Canonical item type (the CSL 1.0.2 type vocabulary)
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ItemType {
    Article,
    ArticleJournal,
    ArticleMagazine,
    ArticleNewspaper,
    Bill,
    Book,
    Broadcast,
    Chapter,
    Classic,
    Collection,
    Dataset,
    #[default]
    Document,
    Entry,
    EntryDictionary,
    EntryEncyclopedia,
    Event,
    Figure,
    Graphic,
    Hearing,
    Interview,
    #[serde(rename = "legal_case")]
    LegalCase,
    Legislation,
    Manuscript,
    Map,
    #[serde(rename = "motion_picture")]
    MotionPicture,
    #[serde(rename = "musical_score")]
    MusicalScore,
    Pamphlet,
    PaperConference,
    Patent,
    Performance,
    Periodical,
    #[serde(rename = "personal_communication")]
    PersonalCommunication,
    Post,
    PostWeblog,
    Regulation,
    Report,
    Review,
    ReviewBook,
    Software,
    Song,
    Speech,
    Standard,
    Thesis,
    Treaty,
    Webpage,
}

impl ItemType {
    pub const ALL: [ItemType; 45] = [
        Self::Article,
        Self::ArticleJournal,
        Self::ArticleMagazine,
        Self::ArticleNewspaper,
        Self::Bill,
        Self::Book,
        Self::Broadcast,
        Self::Chapter,
        Self::Classic,
        Self::Collection,
        Self::Dataset,
        Self::Document,
        Self::Entry,
        Self::EntryDictionary,
        Self::EntryEncyclopedia,
        Self::Event,
        Self::Figure,
        Self::Graphic,
        Self::Hearing,
        Self::Interview,
        Self::LegalCase,
        Self::Legislation,
        Self::Manuscript,
        Self::Map,
        Self::MotionPicture,
        Self::MusicalScore,
        Self::Pamphlet,
        Self::PaperConference,
        Self::Patent,
        Self::Performance,
        Self::Periodical,
        Self::PersonalCommunication,
        Self::Post,
        Self::PostWeblog,
        Self::Regulation,
        Self::Report,
        Self::Review,
        Self::ReviewBook,
        Self::Software,
        Self::Song,
        Self::Speech,
        Self::Standard,
        Self::Thesis,
        Self::Treaty,
        Self::Webpage,
    ];

    /// CSL name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::ArticleJournal => "article-journal",
            Self::ArticleMagazine => "article-magazine",
            Self::ArticleNewspaper => "article-newspaper",
            Self::Bill => "bill",
            Self::Book => "book",
            Self::Broadcast => "broadcast",
            Self::Chapter => "chapter",
            Self::Classic => "classic",
            Self::Collection => "collection",
            Self::Dataset => "dataset",
            Self::Document => "document",
            Self::Entry => "entry",
            Self::EntryDictionary => "entry-dictionary",
            Self::EntryEncyclopedia => "entry-encyclopedia",
            Self::Event => "event",
            Self::Figure => "figure",
            Self::Graphic => "graphic",
            Self::Hearing => "hearing",
            Self::Interview => "interview",
            Self::LegalCase => "legal_case",
            Self::Legislation => "legislation",
            Self::Manuscript => "manuscript",
            Self::Map => "map",
            Self::MotionPicture => "motion_picture",
            Self::MusicalScore => "musical_score",
            Self::Pamphlet => "pamphlet",
            Self::PaperConference => "paper-conference",
            Self::Patent => "patent",
            Self::Performance => "performance",
            Self::Periodical => "periodical",
            Self::PersonalCommunication => "personal_communication",
            Self::Post => "post",
            Self::PostWeblog => "post-weblog",
            Self::Regulation => "regulation",
            Self::Report => "report",
            Self::Review => "review",
            Self::ReviewBook => "review-book",
            Self::Software => "software",
            Self::Song => "song",
            Self::Speech => "speech",
            Self::Standard => "standard",
            Self::Thesis => "thesis",
            Self::Treaty => "treaty",
            Self::Webpage => "webpage",
        }
    }

    /// Look up a type by its exact CSL name
    pub fn from_csl(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    /// Periodical article types, whose container is a journal-like serial
    pub fn is_serial_article(&self) -> bool {
        matches!(
            self,
            Self::Article
                | Self::ArticleJournal
                | Self::ArticleMagazine
                | Self::ArticleNewspaper
                | Self::Review
                | Self::ReviewBook
        )
    }

    /// Types whose container is a book or proceedings volume
    pub fn is_book_part(&self) -> bool {
        matches!(
            self,
            Self::Chapter
                | Self::PaperConference
                | Self::Entry
                | Self::EntryDictionary
                | Self::EntryEncyclopedia
        )
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_csl(s).ok_or_else(|| DomainError::UnknownItemType(s.to_string()))
    }
}

/// Format-specific data kept only to improve round-trip fidelity
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FormatMetadata {
    /// Format the entry was parsed from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_format: Option<Format>,
    /// The format-specific type before normalization (e.g. `mastersthesis`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_type: Option<String>,
    /// Fields or tags with no canonical counterpart, keyed by their source name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, String>,
    /// Canonical field names in the order the source listed them
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_order: Vec<String>,
    /// Warnings the parser raised for this entry
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    /// The raw source text of the record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl FormatMetadata {
    pub fn from_source(format: Format) -> Self {
        Self {
            source_format: Some(format),
            ..Default::default()
        }
    }
}

/// A bibliographic entry in the canonical representation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Entry {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,

    // Creators
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub editor: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub translator: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub container_author: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collection_editor: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub composer: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub director: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub editorial_director: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub illustrator: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interviewer: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recipient: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reviewed_author: Vec<Person>,

    // Titles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_title_short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,

    // Dates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued: Option<DateSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessed: Option<DateSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted: Option<DateSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_date: Option<DateSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_date: Option<DateSpec>,

    // Identifiers
    #[serde(rename = "DOI", skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(rename = "ISBN", skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(rename = "ISSN", skip_serializing_if = "Option::is_none")]
    pub issn: Option<String>,
    #[serde(rename = "PMID", skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(rename = "PMCID", skip_serializing_if = "Option::is_none")]
    pub pmcid: Option<String>,
    #[serde(rename = "URL", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_number: Option<String>,

    // Publication details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_pages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_volumes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
    #[serde(rename = "archive_location", skip_serializing_if = "Option::is_none")]
    pub archive_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,

    // Free text
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annote: Option<String>,

    /// Round-trip extension slot; never emitted as CSL-JSON
    #[serde(rename = "_metadata", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FormatMetadata>,
}

/// Generates name-based accessors for a family of fields
macro_rules! field_family {
    (
        $names:ident, $get:ident, $get_mut:ident, $ty:ty;
        $($field:ident => $name:literal),* $(,)?
    ) => {
        impl Entry {
            pub const $names: &'static [&'static str] = &[$($name),*];

            pub fn $get(&self, field: &str) -> Option<&$ty> {
                match field {
                    $($name => Some(&self.$field),)*
                    _ => None,
                }
            }

            pub fn $get_mut(&mut self, field: &str) -> Option<&mut $ty> {
                match field {
                    $($name => Some(&mut self.$field),)*
                    _ => None,
                }
            }
        }
    };
}

field_family! {
    CREATOR_FIELDS, creators_slot, creators_slot_mut, Vec<Person>;
    author => "author",
    editor => "editor",
    translator => "translator",
    container_author => "container-author",
    collection_editor => "collection-editor",
    composer => "composer",
    director => "director",
    editorial_director => "editorial-director",
    illustrator => "illustrator",
    interviewer => "interviewer",
    recipient => "recipient",
    reviewed_author => "reviewed-author",
}

field_family! {
    DATE_FIELDS, date_slot, date_slot_mut, Option<DateSpec>;
    issued => "issued",
    accessed => "accessed",
    submitted => "submitted",
    original_date => "original-date",
    event_date => "event-date",
}

field_family! {
    TEXT_FIELDS, text_slot, text_slot_mut, Option<String>;
    title => "title",
    title_short => "title-short",
    container_title => "container-title",
    container_title_short => "container-title-short",
    collection_title => "collection-title",
    original_title => "original-title",
    doi => "DOI",
    isbn => "ISBN",
    issn => "ISSN",
    pmid => "PMID",
    pmcid => "PMCID",
    url => "URL",
    call_number => "call-number",
    publisher => "publisher",
    publisher_place => "publisher-place",
    event => "event",
    event_place => "event-place",
    volume => "volume",
    issue => "issue",
    page => "page",
    number_of_pages => "number-of-pages",
    number_of_volumes => "number-of-volumes",
    edition => "edition",
    number => "number",
    chapter_number => "chapter-number",
    collection_number => "collection-number",
    section => "section",
    genre => "genre",
    medium => "medium",
    archive => "archive",
    archive_location => "archive_location",
    language => "language",
    source => "source",
    version => "version",
    status => "status",
    authority => "authority",
    abstract_text => "abstract",
    note => "note",
    keyword => "keyword",
    annote => "annote",
}

impl Entry {
    /// Create an entry with only its required fields
    pub fn new(id: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            id: id.into(),
            item_type,
            ..Default::default()
        }
    }

    /// Builder method to set a text field by canonical name
    pub fn with_text(mut self, field: &str, value: impl Into<String>) -> Self {
        self.set_text(field, value);
        self
    }

    /// Read a text field by canonical name
    pub fn text(&self, field: &str) -> Option<&str> {
        self.text_slot(field).and_then(|v| v.as_deref())
    }

    /// Set a text field by canonical name; empty values clear the field.
    /// Returns false if `field` is not a canonical text field.
    pub fn set_text(&mut self, field: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        match self.text_slot_mut(field) {
            Some(slot) => {
                *slot = if value.trim().is_empty() {
                    None
                } else {
                    Some(value)
                };
                true
            }
            None => false,
        }
    }

    /// People listed for a creator field (empty for unknown fields)
    pub fn creators(&self, field: &str) -> &[Person] {
        self.creators_slot(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Read a date field by canonical name
    pub fn date(&self, field: &str) -> Option<&DateSpec> {
        self.date_slot(field).and_then(Option::as_ref)
    }

    /// Whether `key` is a CSL-JSON key this model stores
    pub fn is_known_key(key: &str) -> bool {
        matches!(key, "id" | "type" | "_metadata")
            || Self::TEXT_FIELDS.contains(&key)
            || Self::CREATOR_FIELDS.contains(&key)
            || Self::DATE_FIELDS.contains(&key)
    }

    /// Whether a canonical field of any family holds a value
    pub fn has_field(&self, field: &str) -> bool {
        self.text(field).is_some()
            || !self.creators(field).is_empty()
            || self.date(field).is_some()
    }

    /// First component of the issued date (the year)
    pub fn year(&self) -> Option<i32> {
        self.issued.as_ref().and_then(DateSpec::year)
    }

    /// Family name, or literal, of the first author
    pub fn first_author_key(&self) -> &str {
        self.author
            .first()
            .and_then(|p| p.family.as_deref().or(p.literal.as_deref()))
            .unwrap_or("")
    }

    /// The extension slot, created on first use
    pub fn metadata_mut(&mut self) -> &mut FormatMetadata {
        self.metadata.get_or_insert_with(FormatMetadata::default)
    }

    /// Format the entry was parsed from, if recorded
    pub fn source_format(&self) -> Option<Format> {
        self.metadata.as_ref().and_then(|m| m.source_format)
    }

    /// A copy without the extension slot
    pub fn without_metadata(&self) -> Self {
        let mut entry = self.clone();
        entry.metadata = None;
        entry
    }

    /// Build an entry from a CSL-JSON object.
    ///
    /// Numeric values of text fields (`"volume": 12`) are accepted and stored
    /// as strings.
    pub fn from_json_map(mut map: Map<String, Value>) -> Result<Self, serde_json::Error> {
        for field in Self::TEXT_FIELDS.iter().chain(std::iter::once(&"id")) {
            if let Some(value) = map.get_mut(*field) {
                if let Value::Number(n) = value {
                    *value = Value::String(n.to_string());
                }
            }
        }
        serde_json::from_value(Value::Object(map))
    }

    /// Serialize to a CSL-JSON object, extension slot included
    pub fn to_json_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}
