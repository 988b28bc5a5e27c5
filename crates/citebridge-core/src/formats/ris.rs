//! RIS
//!
//! RIS is line-oriented: `XX  - value`, one record from `TY` to `ER`.
//! Repeatable tags (`AU`, `KW`) carry one value per line.

use citebridge_domain::{
    parse_date, parse_name, serialize_name, to_ris_slash, ConversionResult, DateSpec, Entry,
    Format, FormatMetadata, ItemType, NameStyle, Person, Severity, Warning, WarningCategory,
};
use lazy_static::lazy_static;
use regex::Regex;

use super::{
    emit_entry, is_issn, join_keywords, join_page_range, split_keywords, split_page_range,
    FormatGenerator, FormatParser, IdRegistry,
};
use crate::config::GenerateOptions;
use crate::field_map::{field_for_tag, get_tag};
use crate::type_map::{map_type_from_format, resolve_entry_type};

lazy_static! {
    static ref TAG_LINE: Regex = Regex::new(r"^([A-Z][A-Z0-9]) {1,2}-(?: (.*))?$").unwrap();
}

/// Canonical fields in the order they are written after `TY` and `ID`
const FIELD_ORDER: &[&str] = &[
    "author",
    "editor",
    "translator",
    "title",
    "container-title",
    "issued",
    "volume",
    "issue",
    "page",
    "publisher",
    "publisher-place",
    "DOI",
    "ISBN",
    "ISSN",
    "URL",
    "accessed",
    "abstract",
    "keyword",
    "note",
    "collection-title",
    "edition",
    "language",
    "title-short",
    "container-title-short",
    "collection-editor",
    "genre",
    "number",
    "number-of-volumes",
    "section",
    "call-number",
    "original-title",
    "source",
];

/// Split a line into tag and value
fn parse_ris_line(line: &str) -> Option<(&str, &str)> {
    let caps = TAG_LINE.captures(line.trim_end())?;
    let tag = caps.get(1)?.as_str();
    let value = caps.get(2).map_or("", |m| m.as_str().trim());
    Some((tag, value))
}

/// One `TY` ... `ER` block
#[derive(Debug, Default)]
struct RisRecord {
    tags: Vec<(String, String)>,
    lines: Vec<String>,
    /// 1-based line of the `TY` tag
    line: usize,
    terminated: bool,
}

impl RisRecord {
    fn type_tag(&self) -> &str {
        self.tags
            .iter()
            .find(|(tag, _)| tag == "TY")
            .map_or("", |(_, value)| value.as_str())
    }
}

/// Records plus the problems found between them
#[derive(Debug, Default)]
struct Scan {
    records: Vec<RisRecord>,
    /// Tags outside any record, as (line, tag)
    stray_tags: Vec<(usize, String)>,
    /// Lines outside any record that are not tag lines
    stray_lines: Vec<usize>,
}

fn scan(content: &str) -> Scan {
    let mut out = Scan::default();
    let mut current: Option<RisRecord> = None;

    for (idx, line) in content.trim_start_matches('\u{feff}').lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        match parse_ris_line(line) {
            Some(("TY", value)) => {
                if let Some(record) = current.take() {
                    out.records.push(record);
                }
                current = Some(RisRecord {
                    tags: vec![("TY".to_string(), value.to_string())],
                    lines: vec![line.to_string()],
                    line: line_no,
                    terminated: false,
                });
            }
            Some(("ER", _)) => match current.take() {
                Some(mut record) => {
                    record.lines.push(line.to_string());
                    record.terminated = true;
                    out.records.push(record);
                }
                None => out.stray_tags.push((line_no, "ER".to_string())),
            },
            Some((tag, value)) => match current.as_mut() {
                Some(record) => {
                    record.lines.push(line.to_string());
                    record.tags.push((tag.to_string(), value.to_string()));
                }
                None => out.stray_tags.push((line_no, tag.to_string())),
            },
            None => match current.as_mut() {
                // Continuation of the previous tag's value
                Some(record) => {
                    record.lines.push(line.to_string());
                    if let Some((_, value)) = record.tags.last_mut() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(line.trim());
                    }
                }
                None => out.stray_lines.push(line_no),
            },
        }
    }

    if let Some(record) = current.take() {
        out.records.push(record);
    }
    out
}

/// `2024/03/15/` and `2024///` carry empty trailing parts and an optional
/// free-text fourth part; keep year/month/day only.
fn normalize_ris_date(value: &str) -> String {
    let value = value.trim();
    let parts: Vec<&str> = value.split('/').collect();
    if parts.len() == 4 || value.ends_with('/') {
        let kept: Vec<&str> = parts.into_iter().take(3).collect();
        let len = kept.iter().rposition(|p| !p.trim().is_empty()).map_or(0, |i| i + 1);
        kept[..len].join("/")
    } else {
        value.to_string()
    }
}

/// RIS writes `Last, First, Suffix`
fn parse_ris_name(value: &str) -> Option<Person> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [family, given, suffix] if !suffix.is_empty() => {
            parse_name(&format!("{}, {}, {}", family, suffix, given))
        }
        _ => parse_name(value),
    }
}

/// Inverse of [`parse_ris_name`]
fn serialize_ris_name(person: &Person) -> String {
    match person.suffix.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(suffix) if person.family.is_some() && person.given.is_some() => {
            let mut bare = person.clone();
            bare.suffix = None;
            format!("{}, {}", serialize_name(&bare, NameStyle::FamilyFirst), suffix)
        }
        _ => serialize_name(person, NameStyle::FamilyFirst),
    }
}

/// Keep the more precise of two dates
fn merge_date(slot: &mut Option<DateSpec>, candidate: DateSpec) {
    if candidate.is_empty() {
        return;
    }
    let precision = |d: &DateSpec| d.start().map_or(0, <[i32]>::len);
    match slot {
        Some(existing) if precision(existing) >= precision(&candidate) => {}
        _ => *slot = Some(candidate),
    }
}

/// Parser for RIS documents
#[derive(Debug, Clone, Copy, Default)]
pub struct RisParser;

impl RisParser {
    pub fn new() -> Self {
        Self
    }

    fn record_to_entry(&self, record: &RisRecord) -> (Entry, Vec<Warning>) {
        let mut warnings = Vec::new();
        let type_tag = record.type_tag();
        let id = record
            .tags
            .iter()
            .find(|(tag, _)| tag == "ID")
            .map(|(_, value)| value.clone())
            .unwrap_or_default();

        let (item_type, recognized) = map_type_from_format(type_tag, Format::Ris);
        if !recognized {
            warnings.push(Warning::type_downgrade(
                id.clone(),
                format!("Unknown RIS type '{}' read as document", type_tag),
            ));
        }

        let mut entry = Entry::new(id.clone(), item_type);
        let mut metadata = FormatMetadata::from_source(Format::Ris);
        metadata.original_type = Some(type_tag.to_uppercase());
        metadata.raw = Some(record.lines.join("\n"));

        let mut start_page: Option<&str> = None;
        let mut end_page: Option<&str> = None;
        let mut keywords: Vec<&str> = Vec::new();
        let mut serials: Vec<&str> = Vec::new();

        for (tag, value) in &record.tags {
            let tag = tag.as_str();
            let value = value.as_str();
            if value.is_empty() {
                continue;
            }

            match tag {
                "TY" | "ID" => continue,
                "SP" => {
                    start_page.get_or_insert(value);
                    push_order(&mut metadata, "page");
                    continue;
                }
                "EP" => {
                    end_page.get_or_insert(value);
                    continue;
                }
                "KW" => {
                    keywords.push(value);
                    push_order(&mut metadata, "keyword");
                    continue;
                }
                "SN" => {
                    serials.push(value);
                    continue;
                }
                _ => {}
            }

            let Some(canonical) = field_for_tag(tag, Format::Ris, item_type) else {
                metadata
                    .custom_fields
                    .entry(tag.to_string())
                    .and_modify(|existing| {
                        existing.push_str("; ");
                        existing.push_str(value);
                    })
                    .or_insert_with(|| value.to_string());
                warnings.push(
                    Warning::new(
                        id.clone(),
                        Severity::Info,
                        WarningCategory::FieldLoss,
                        format!("Tag '{}' has no canonical counterpart; kept as custom", tag),
                    )
                    .with_field(tag),
                );
                continue;
            };
            push_order(&mut metadata, canonical);

            if let Some(people) = entry.creators_slot_mut(canonical) {
                match parse_ris_name(value) {
                    Some(person) => people.push(person),
                    None => warnings.push(Warning::field_loss(
                        id.clone(),
                        tag,
                        format!("Could not read name '{}'", value),
                    )),
                }
            } else if let Some(slot) = entry.date_slot_mut(canonical) {
                merge_date(slot, parse_date(&normalize_ris_date(value)));
            } else if entry.text(canonical).is_some() {
                warnings.push(Warning::field_loss(
                    id.clone(),
                    tag,
                    format!("Repeated tag '{}'; later value dropped", tag),
                ));
            } else {
                entry.set_text(canonical, value);
            }
        }

        if let Some(start) = start_page {
            entry.page = Some(join_page_range(start, end_page, "-"));
        } else if let Some(end) = end_page {
            entry.page = Some(end.to_string());
        }
        if !keywords.is_empty() {
            entry.keyword = Some(join_keywords(&keywords));
        }
        for serial in serials {
            let canonical = if is_issn(serial) { "ISSN" } else { "ISBN" };
            if entry.text(canonical).is_none() {
                entry.set_text(canonical, serial);
                push_order(&mut metadata, canonical);
            }
        }

        if !record.terminated {
            warnings.push(Warning::validation(
                id,
                "ER",
                format!("Record starting at line {} has no ER tag", record.line),
            ));
        }

        entry.metadata = Some(metadata);
        (entry, warnings)
    }
}

fn push_order(metadata: &mut FormatMetadata, canonical: &str) {
    if !metadata.field_order.iter().any(|f| f == canonical) {
        metadata.field_order.push(canonical.to_string());
    }
}

impl FormatParser for RisParser {
    fn parse(&self, content: &str) -> ConversionResult {
        let scanned = scan(content);
        let mut result = ConversionResult::new();
        let mut ids = IdRegistry::default();

        for record in &scanned.records {
            let (mut entry, mut warnings) = self.record_to_entry(record);
            if let Some(warning) = ids.assign(&mut entry, "ID") {
                warnings.insert(0, warning);
            }
            // Warnings raised before the id was derived
            for warning in warnings.iter_mut() {
                if warning.entry_id.is_empty() {
                    warning.entry_id = entry.id.clone();
                }
            }
            emit_entry(&mut result, entry, warnings);
        }

        for (line, tag) in &scanned.stray_tags {
            tracing::warn!("RIS tag {} at line {} is outside a record", tag, line);
            result.push_warning(Warning::validation(
                "",
                tag.as_str(),
                format!("Tag '{}' at line {} is outside a record", tag, line),
            ));
        }

        tracing::debug!(
            "Parsed ris document: {} entries, {} stray tags",
            result.stats.successful,
            scanned.stray_tags.len()
        );
        result
    }

    fn validate(&self, content: &str) -> Vec<Warning> {
        let scanned = scan(content);
        let mut warnings = Vec::new();

        for (line, tag) in &scanned.stray_tags {
            let message = if tag == "ER" {
                format!("ER at line {} without a preceding TY", line)
            } else {
                format!("Tag '{}' at line {} is outside a record (missing TY)", tag, line)
            };
            warnings.push(Warning::validation("", tag.as_str(), message));
        }
        for line in &scanned.stray_lines {
            warnings.push(Warning::new(
                "",
                Severity::Warning,
                WarningCategory::ValidationError,
                format!("Line {} is not a RIS tag line", line),
            ));
        }

        for record in &scanned.records {
            let id = record
                .tags
                .iter()
                .find(|(tag, _)| tag == "ID")
                .map_or("", |(_, value)| value.as_str());
            if record.type_tag().is_empty() {
                warnings.push(Warning::validation(
                    id,
                    "TY",
                    format!("Record at line {} has an empty TY", record.line),
                ));
            }
            if !record.terminated {
                warnings.push(Warning::validation(
                    id,
                    "ER",
                    format!("Record starting at line {} has no ER tag", record.line),
                ));
            }
            let has_title = record
                .tags
                .iter()
                .any(|(tag, value)| matches!(tag.as_str(), "TI" | "T1" | "CT") && !value.is_empty());
            if !has_title {
                warnings.push(Warning::validation(
                    id,
                    "TI",
                    format!("Record at line {} has no title", record.line),
                ));
            }
        }

        warnings
    }
}

/// Generator for RIS documents
#[derive(Debug, Clone, Copy, Default)]
pub struct RisGenerator;

impl RisGenerator {
    pub fn new() -> Self {
        Self
    }

    fn entry_lines(&self, entry: &Entry, options: &GenerateOptions) -> Vec<String> {
        let mut lines = Vec::new();
        let mut push = |tag: &str, value: &str| {
            let value = value.replace(['\r', '\n'], " ");
            let value = value.trim();
            if !value.is_empty() {
                lines.push(format!("{}  - {}", tag, value));
            }
        };

        push("TY", &resolve_entry_type(entry, Format::Ris).name);

        for canonical in field_order(entry, options) {
            let tag = get_tag(canonical, Format::Ris);

            let people = entry.creators(canonical);
            if !people.is_empty() {
                for person in people {
                    push(&tag, &serialize_ris_name(person));
                }
                continue;
            }

            if let Some(date) = entry.date(canonical) {
                push(&tag, &to_ris_slash(Some(date)));
                continue;
            }

            let Some(value) = entry.text(canonical) else {
                continue;
            };
            match canonical {
                "page" => {
                    let (start, end) = split_page_range(value);
                    push("SP", &start);
                    if let Some(end) = end {
                        push("EP", &end);
                    }
                }
                "keyword" => {
                    for keyword in split_keywords(value) {
                        push("KW", &keyword);
                    }
                }
                _ => push(&tag, value),
            }
        }

        // Extensions follow the canonical fields so the standard order is untouched
        if options.include_metadata {
            push("ID", &entry.id);
            if let Some(metadata) = entry
                .metadata
                .as_ref()
                .filter(|m| m.source_format == Some(Format::Ris))
            {
                for (tag, value) in &metadata.custom_fields {
                    for part in value.split("; ") {
                        push(tag, part);
                    }
                }
            }
        }

        lines.push("ER  - ".to_string());
        lines
    }
}

/// Canonical fields to write, honoring a recorded source order when asked
fn field_order<'a>(entry: &'a Entry, options: &GenerateOptions) -> Vec<&'a str> {
    let mut order: Vec<&str> = Vec::new();
    if options.preserve_field_order {
        if let Some(metadata) = &entry.metadata {
            order.extend(
                metadata
                    .field_order
                    .iter()
                    .map(String::as_str)
                    .filter(|f| FIELD_ORDER.contains(f)),
            );
        }
    }
    for field in FIELD_ORDER {
        if !order.contains(field) {
            order.push(field);
        }
    }
    order
}

impl FormatGenerator for RisGenerator {
    fn generate(&self, entries: &[Entry], options: &GenerateOptions) -> String {
        let nl = options.newline();
        let records: Vec<String> = options
            .ordered(entries)
            .into_iter()
            .map(|entry| self.entry_lines(entry, options).join(nl))
            .collect();

        tracing::debug!("Generated ris document: {} entries", records.len());
        let mut output = records.join(nl);
        output.push_str(nl);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineEnding;

    const SAMPLE: &str = "TY  - JOUR
ID  - Smith2024
AU  - Smith, John
AU  - Doe, Jane, Jr.
TI  - A Great Paper
T2  - Journal of Examples
PY  - 2024/03/15/
VL  - 12
IS  - 3
SP  - 100
EP  - 110
SN  - 1234-5678
DO  - 10.1234/test.2024
AB  - First line of the abstract
  continues here.
KW  - machine learning
KW  - physics
L1  - file:///paper.pdf
ER  -
";

    #[test]
    fn test_parse_ris_line() {
        assert_eq!(parse_ris_line("TY  - JOUR"), Some(("TY", "JOUR")));
        assert_eq!(parse_ris_line("TI - A Title"), Some(("TI", "A Title")));
        assert_eq!(parse_ris_line("ER  -"), Some(("ER", "")));
        assert_eq!(parse_ris_line("ER  - "), Some(("ER", "")));
        assert_eq!(parse_ris_line("invalid"), None);
        assert_eq!(parse_ris_line("ti  - lowercase"), None);
    }

    #[test]
    fn test_parse_sample() {
        let result = RisParser::new().parse(SAMPLE);
        assert_eq!(result.entries.len(), 1);
        let entry = &result.entries[0];

        assert_eq!(entry.id, "Smith2024");
        assert_eq!(entry.item_type, ItemType::ArticleJournal);
        assert_eq!(entry.author.len(), 2);
        assert_eq!(entry.author[0], Person::family_given("Smith", "John"));
        assert_eq!(
            entry.author[1],
            Person::family_given("Doe", "Jane").with_suffix("Jr.")
        );
        assert_eq!(entry.container_title.as_deref(), Some("Journal of Examples"));
        assert_eq!(entry.issued, Some(DateSpec::from_parts(vec![2024, 3, 15])));
        assert_eq!(entry.page.as_deref(), Some("100-110"));
        assert_eq!(entry.issn.as_deref(), Some("1234-5678"));
        assert_eq!(entry.isbn, None);
        assert_eq!(
            entry.abstract_text.as_deref(),
            Some("First line of the abstract continues here.")
        );
        assert_eq!(entry.keyword.as_deref(), Some("machine learning, physics"));
        assert_eq!(
            entry.metadata.as_ref().unwrap().custom_fields.get("L1").map(String::as_str),
            Some("file:///paper.pdf")
        );
    }

    #[test]
    fn test_missing_er_keeps_record() {
        let result = RisParser::new().parse("TY  - BOOK\nTI  - Unfinished\n");
        assert_eq!(result.entries.len(), 1);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field.as_deref() == Some("ER")));
    }

    #[test]
    fn test_tags_outside_record_are_reported() {
        let result = RisParser::new().parse("TI  - Orphan\nTY  - GEN\nTI  - Kept\nER  - \n");
        assert_eq!(result.entries.len(), 1);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("outside a record")));
    }

    #[test]
    fn test_missing_id_is_derived() {
        let result = RisParser::new()
            .parse("TY  - BOOK\nAU  - Knuth, Donald\nTI  - Literate Programming\nPY  - 1992\nER  - \n");
        assert_eq!(result.entries[0].id, "Knuth1992Literate");
        assert_eq!(result.warnings[0].entry_id, "Knuth1992Literate");
    }

    #[test]
    fn test_isbn_routing() {
        let result = RisParser::new().parse("TY  - BOOK\nSN  - 978-0-201-89683-1\nER  - \n");
        assert_eq!(result.entries[0].isbn.as_deref(), Some("978-0-201-89683-1"));
    }

    #[test]
    fn test_more_precise_date_wins() {
        let result = RisParser::new().parse("TY  - JOUR\nPY  - 2020\nDA  - 2020/06/01\nER  - \n");
        assert_eq!(
            result.entries[0].issued,
            Some(DateSpec::from_parts(vec![2020, 6, 1]))
        );
    }

    #[test]
    fn test_ris_name_order() {
        let person = Person::family_given("Doe", "Jane").with_suffix("Jr.");
        assert_eq!(serialize_ris_name(&person), "Doe, Jane, Jr.");
        assert_eq!(parse_ris_name("Doe, Jane, Jr."), Some(person));
        assert_eq!(
            serialize_ris_name(&Person::literal("CERN Collaboration")),
            "CERN Collaboration"
        );
    }

    #[test]
    fn test_normalize_ris_date() {
        assert_eq!(normalize_ris_date("2024/03/15/"), "2024/03/15");
        assert_eq!(normalize_ris_date("2024///"), "2024");
        assert_eq!(normalize_ris_date("2024/03/15/Spring"), "2024/03/15");
        assert_eq!(normalize_ris_date("2020/2021"), "2020/2021");
        assert_eq!(normalize_ris_date("2024"), "2024");
    }

    #[test]
    fn test_generate_entry() {
        let mut entry = Entry::new("Doe2024", ItemType::ArticleJournal)
            .with_text("title", "Test Title")
            .with_text("page", "100\u{2013}110")
            .with_text("keyword", "alpha, beta");
        entry.author.push(Person::family_given("Doe", "Jane"));
        entry.issued = Some(DateSpec::from_parts(vec![2024, 3]));

        let output = RisGenerator::new().generate(&[entry], &GenerateOptions::default());
        assert_eq!(
            output,
            "TY  - JOUR\nAU  - Doe, Jane\nTI  - Test Title\nPY  - 2024/03\nSP  - 100\nEP  - 110\nKW  - alpha\nKW  - beta\nER  - \n"
        );
    }

    #[test]
    fn test_generate_id_only_with_metadata() {
        let mut entry = Entry::new("Doe2024", ItemType::Book).with_text("title", "Tome");
        entry.author.push(Person::family_given("Doe", "Jane"));

        let plain = RisGenerator::new().generate(&[entry.clone()], &GenerateOptions::default());
        assert!(!plain.contains("ID  -"));

        let options = GenerateOptions::default().with_include_metadata(true);
        let output = RisGenerator::new().generate(&[entry], &options);
        assert_eq!(
            output,
            "TY  - BOOK\nAU  - Doe, Jane\nTI  - Tome\nID  - Doe2024\nER  - \n"
        );
        assert_eq!(RisParser::new().parse(&output).entries[0].id, "Doe2024");
    }

    #[test]
    fn test_generate_non_range_page() {
        let entry = Entry::new("x", ItemType::ArticleJournal).with_text("page", "e1234");
        let output = RisGenerator::new().generate(&[entry], &GenerateOptions::default());
        assert!(output.contains("SP  - e1234\n"));
        assert!(!output.contains("EP  -"));
    }

    #[test]
    fn test_generate_empty_and_crlf() {
        assert_eq!(RisGenerator::new().generate(&[], &GenerateOptions::default()), "\n");

        let options = GenerateOptions::default().with_line_ending(LineEnding::CrLf);
        assert_eq!(RisGenerator::new().generate(&[], &options), "\r\n");

        let entries = vec![
            Entry::new("a", ItemType::Book),
            Entry::new("b", ItemType::Book),
        ];
        let output = RisGenerator::new().generate(&entries, &options);
        assert_eq!(
            output,
            "TY  - BOOK\r\nER  - \r\nTY  - BOOK\r\nER  - \r\n"
        );
    }

    #[test]
    fn test_round_trip() {
        let parsed = RisParser::new().parse(SAMPLE);
        let options = GenerateOptions::default().with_include_metadata(true);
        let output = RisGenerator::new().generate(&parsed.entries, &options);
        let reparsed = RisParser::new().parse(&output);

        let before = parsed.entries[0].without_metadata();
        let after = reparsed.entries[0].without_metadata();
        assert_eq!(before, after);
        assert!(output.contains("L1  - file:///paper.pdf"));
    }

    #[test]
    fn test_validate() {
        let warnings = RisParser::new().validate("ER  - \nnot a tag\nTY  - JOUR\nAU  - X, Y\n");
        let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("without a preceding TY")));
        assert!(messages.iter().any(|m| m.contains("not a RIS tag line")));
        assert!(messages.iter().any(|m| m.contains("no ER tag")));
        assert!(messages.iter().any(|m| m.contains("no title")));

        assert!(RisParser::new().validate(SAMPLE).is_empty());
    }
}
