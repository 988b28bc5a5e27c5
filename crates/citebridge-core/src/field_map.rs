//! Field mapping table
//!
//! Each row maps a canonical (CSL) field to its name in every format plus the
//! codec a parser or generator must run on the value. EndNote names are
//! element paths relative to `<record>`.

use std::borrow::Cow;

use citebridge_domain::{Entry, Format, ItemType};

/// Which codec handles a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Plain text (LaTeX-escaped in BibTeX)
    Text,
    /// A list of people, through the name engine
    Name,
    /// A date, through the date engine
    Date,
    /// A number-like value kept as text
    Number,
    /// A page range (`SP`/`EP` in RIS, `--` in BibTeX)
    PageRange,
    /// Written without any escaping (URLs, DOIs)
    Verbatim,
    /// Format-specific handling (keyword lists)
    Custom,
}

/// One row of the field table
#[derive(Debug, Clone, Copy)]
pub struct FieldRow {
    pub canonical: &'static str,
    pub bibtex: Option<&'static str>,
    pub biblatex: Option<&'static str>,
    pub ris: Option<&'static str>,
    pub endnote: Option<&'static str>,
    pub transform: Transform,
}

impl FieldRow {
    /// Name of the field in `format`, if the format has one
    pub fn tag(&self, format: Format) -> Option<&'static str> {
        match format {
            Format::BibTeX => self.bibtex,
            Format::BibLaTeX => self.biblatex,
            Format::Ris => self.ris,
            Format::EndNote => self.endnote,
            Format::CslJson => Some(self.canonical),
        }
    }
}

const fn field(
    canonical: &'static str,
    bibtex: Option<&'static str>,
    biblatex: Option<&'static str>,
    ris: Option<&'static str>,
    endnote: Option<&'static str>,
    transform: Transform,
) -> FieldRow {
    FieldRow {
        canonical,
        bibtex,
        biblatex,
        ris,
        endnote,
        transform,
    }
}

use Transform::*;

#[rustfmt::skip]
pub const FIELD_TABLE: &[FieldRow] = &[
    // Creators
    field("author", Some("author"), Some("author"), Some("AU"), Some("contributors/authors/author"), Name),
    field("editor", Some("editor"), Some("editor"), Some("ED"), Some("contributors/secondary-authors/author"), Name),
    field("collection-editor", None, None, Some("A3"), Some("contributors/tertiary-authors/author"), Name),
    field("translator", Some("translator"), Some("translator"), Some("A4"), Some("contributors/subsidiary-authors/author"), Name),
    field("container-author", Some("bookauthor"), Some("bookauthor"), None, None, Name),
    // Titles
    field("title", Some("title"), Some("title"), Some("TI"), Some("titles/title"), Text),
    field("container-title", Some("journal"), Some("journaltitle"), Some("T2"), Some("titles/secondary-title"), Text),
    field("collection-title", Some("series"), Some("series"), Some("T3"), Some("titles/tertiary-title"), Text),
    field("title-short", Some("shorttitle"), Some("shorttitle"), Some("ST"), Some("titles/short-title"), Text),
    field("container-title-short", None, Some("shortjournal"), Some("J2"), Some("titles/alt-title"), Text),
    field("original-title", None, Some("origtitle"), Some("OP"), None, Text),
    // Dates
    field("issued", Some("year"), Some("date"), Some("PY"), Some("dates/year"), Date),
    field("accessed", Some("urldate"), Some("urldate"), Some("Y2"), Some("access-date"), Date),
    field("original-date", None, Some("origdate"), None, None, Date),
    field("event-date", None, Some("eventdate"), None, None, Date),
    // Publication details
    field("volume", Some("volume"), Some("volume"), Some("VL"), Some("volume"), Number),
    field("issue", Some("number"), Some("number"), Some("IS"), Some("number"), Number),
    field("number", Some("number"), Some("number"), Some("M1"), Some("report-id"), Number),
    field("page", Some("pages"), Some("pages"), Some("SP"), Some("pages"), PageRange),
    field("number-of-pages", None, Some("pagetotal"), None, None, Number),
    field("number-of-volumes", None, Some("volumes"), Some("NV"), Some("num-vols"), Number),
    field("chapter-number", Some("chapter"), Some("chapter"), None, None, Number),
    field("edition", Some("edition"), Some("edition"), Some("ET"), Some("edition"), Text),
    field("section", None, None, Some("SE"), Some("section"), Text),
    field("publisher", Some("publisher"), Some("publisher"), Some("PB"), Some("publisher"), Text),
    field("publisher-place", Some("address"), Some("location"), Some("CY"), Some("pub-location"), Text),
    field("event", None, Some("eventtitle"), None, None, Text),
    field("event-place", None, Some("venue"), None, None, Text),
    field("genre", Some("type"), Some("type"), Some("M3"), Some("work-type"), Text),
    field("medium", Some("howpublished"), Some("howpublished"), None, None, Text),
    field("version", None, Some("version"), None, None, Text),
    field("status", None, Some("pubstate"), None, None, Text),
    field("language", Some("language"), Some("language"), Some("LA"), Some("language"), Text),
    field("source", None, None, Some("DB"), Some("remote-database-name"), Text),
    // Identifiers
    field("DOI", Some("doi"), Some("doi"), Some("DO"), Some("electronic-resource-num"), Verbatim),
    field("ISBN", Some("isbn"), Some("isbn"), Some("SN"), Some("isbn"), Text),
    field("ISSN", Some("issn"), Some("issn"), Some("SN"), Some("isbn"), Text),
    field("PMID", Some("pmid"), Some("pmid"), None, None, Text),
    field("PMCID", Some("pmcid"), Some("pmcid"), None, None, Text),
    field("URL", Some("url"), Some("url"), Some("UR"), Some("urls/related-urls/url"), Verbatim),
    field("call-number", None, None, Some("CN"), Some("call-num"), Text),
    // Free text
    field("abstract", Some("abstract"), Some("abstract"), Some("AB"), Some("abstract"), Text),
    field("note", Some("note"), Some("note"), Some("N1"), Some("notes"), Text),
    field("keyword", Some("keywords"), Some("keywords"), Some("KW"), Some("keywords/keyword"), Custom),
    field("annote", Some("annote"), Some("annotation"), None, Some("research-notes"), Text),
];

/// Tags that read into a canonical field without being its preferred name
#[rustfmt::skip]
const FIELD_ALIASES: &[(Format, &str, &str)] = &[
    // BibTeX and BibLaTeX share one alias list
    (Format::BibTeX, "journal", "container-title"),
    (Format::BibTeX, "journaltitle", "container-title"),
    (Format::BibTeX, "booktitle", "container-title"),
    (Format::BibTeX, "school", "publisher"),
    (Format::BibTeX, "institution", "publisher"),
    (Format::BibTeX, "organization", "publisher"),
    (Format::BibTeX, "address", "publisher-place"),
    (Format::BibTeX, "location", "publisher-place"),
    (Format::BibTeX, "keyword", "keyword"),
    (Format::BibTeX, "keywords", "keyword"),
    (Format::BibTeX, "annotation", "annote"),
    (Format::BibTeX, "annote", "annote"),
    (Format::BibTeX, "date", "issued"),
    (Format::BibTeX, "shortjournal", "container-title-short"),
    (Format::BibTeX, "langid", "language"),
    // RIS
    (Format::Ris, "T1", "title"),
    (Format::Ris, "CT", "title"),
    (Format::Ris, "A1", "author"),
    (Format::Ris, "A2", "editor"),
    (Format::Ris, "Y1", "issued"),
    (Format::Ris, "DA", "issued"),
    (Format::Ris, "JO", "container-title"),
    (Format::Ris, "JF", "container-title"),
    (Format::Ris, "BT", "container-title"),
    (Format::Ris, "JA", "container-title-short"),
    (Format::Ris, "J1", "container-title-short"),
    (Format::Ris, "N2", "abstract"),
    (Format::Ris, "PP", "publisher-place"),
    (Format::Ris, "EP", "page"),
    // EndNote
    (Format::EndNote, "periodical/full-title", "container-title"),
    (Format::EndNote, "periodical/abbr-1", "container-title-short"),
    (Format::EndNote, "dates/pub-dates/date", "issued"),
    (Format::EndNote, "titles/alt-periodical", "container-title-short"),
];

/// Types whose BibTeX `number` field is a report or document number rather
/// than a journal issue
fn number_is_identifier(item_type: ItemType) -> bool {
    matches!(
        item_type,
        ItemType::Report
            | ItemType::Standard
            | ItemType::Patent
            | ItemType::Bill
            | ItemType::Legislation
            | ItemType::Regulation
            | ItemType::Thesis
    )
}

/// Table row for a canonical field
pub fn field_row(canonical: &str) -> Option<&'static FieldRow> {
    FIELD_TABLE.iter().find(|row| row.canonical == canonical)
}

/// Codec kind for a canonical field; unlisted fields are plain text
pub fn transform_for(canonical: &str) -> Transform {
    field_row(canonical).map_or(Text, |row| row.transform)
}

/// Name of a canonical field in `format`.
///
/// Never fails: unmapped fields are uppercased for RIS and passed through
/// unchanged for every other format.
pub fn get_tag(canonical: &str, format: Format) -> Cow<'static, str> {
    match field_row(canonical).and_then(|row| row.tag(format)) {
        Some(tag) => Cow::Borrowed(tag),
        None if format == Format::Ris => Cow::Owned(canonical.to_uppercase()),
        None => Cow::Owned(canonical.to_string()),
    }
}

/// Whether `format` has a native name for the field
pub fn has_tag(canonical: &str, format: Format) -> bool {
    field_row(canonical)
        .and_then(|row| row.tag(format))
        .is_some()
}

/// Name of a canonical field in `format` for an entry of `item_type`.
///
/// BibTeX-family containers and publishers are named after the kind of
/// item: a chapter lives in a `booktitle`, a thesis is published by a
/// `school`.
pub fn tag_for_type(canonical: &str, format: Format, item_type: ItemType) -> Cow<'static, str> {
    if format.is_bibtex_family() {
        match canonical {
            "container-title" if item_type.is_book_part() => return Cow::Borrowed("booktitle"),
            "container-title" if format == Format::BibLaTeX && item_type.is_serial_article() => {
                return Cow::Borrowed("journaltitle")
            }
            "publisher" if item_type == ItemType::Thesis => return Cow::Borrowed("school"),
            "publisher" if matches!(item_type, ItemType::Report | ItemType::Standard) => {
                return Cow::Borrowed("institution")
            }
            _ => {}
        }
    }
    get_tag(canonical, format)
}

/// Canonical field a format tag reads into.
///
/// Aliases are consulted first, then the table. BibTeX tags match
/// case-insensitively and also accept canonical names written as-is.
pub fn field_for_tag(tag: &str, format: Format, item_type: ItemType) -> Option<&'static str> {
    match format {
        Format::CslJson => return field_row(tag).map(|row| row.canonical),
        Format::BibTeX | Format::BibLaTeX => {
            let lower = tag.to_lowercase();
            if lower == "number" {
                return Some(if number_is_identifier(item_type) {
                    "number"
                } else {
                    "issue"
                });
            }
            if let Some(canonical) = lookup_alias(Format::BibTeX, &lower) {
                return Some(canonical);
            }
            let found = FIELD_TABLE
                .iter()
                .find(|row| row.tag(format) == Some(lower.as_str()))
                .or_else(|| {
                    let sibling = if format == Format::BibTeX {
                        Format::BibLaTeX
                    } else {
                        Format::BibTeX
                    };
                    FIELD_TABLE
                        .iter()
                        .find(|row| row.tag(sibling) == Some(lower.as_str()))
                });
            if let Some(row) = found {
                return Some(row.canonical);
            }
            Entry::TEXT_FIELDS
                .iter()
                .chain(Entry::CREATOR_FIELDS)
                .chain(Entry::DATE_FIELDS)
                .find(|name| name.eq_ignore_ascii_case(tag))
                .copied()
        }
        Format::Ris => {
            let upper = tag.to_uppercase();
            lookup_alias(Format::Ris, &upper).or_else(|| {
                FIELD_TABLE
                    .iter()
                    .find(|row| row.ris == Some(upper.as_str()))
                    .map(|row| row.canonical)
            })
        }
        Format::EndNote => lookup_alias(Format::EndNote, tag).or_else(|| {
            FIELD_TABLE
                .iter()
                .find(|row| row.endnote == Some(tag))
                .map(|row| row.canonical)
        }),
    }
}

fn lookup_alias(format: Format, tag: &str) -> Option<&'static str> {
    FIELD_ALIASES
        .iter()
        .find(|(f, alias, _)| *f == format && *alias == tag)
        .map(|(_, _, canonical)| *canonical)
}
