//! EndNote XML
//!
//! Records live under `<xml><records>`. Field names are element paths below
//! `<record>`, e.g. `contributors/authors/author`. EndNote wraps text in
//! `<style>` elements, which the reader looks through.

use citebridge_domain::{
    parse_date, parse_name, serialize_name, to_iso, ConversionResult, DateSpec, Entry, Format,
    FormatMetadata, NameStyle, Severity, Warning, WarningCategory,
};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{
    emit_entry, is_issn, join_keywords, split_keywords, FormatGenerator, FormatParser, IdRegistry,
};
use crate::config::GenerateOptions;
use crate::field_map::{field_for_tag, get_tag};
use crate::type_map::{map_type_from_format, resolve_entry_type};

/// Paths that carry bookkeeping rather than bibliographic data
const IGNORED_PATHS: &[&str] = &[
    "ref-type",
    "rec-number",
    "label",
    "database",
    "source-app",
    "foreign-keys/key",
];

/// Contributor groups in output order, as (canonical, group element)
const CONTRIBUTOR_GROUPS: &[(&str, &str)] = &[
    ("author", "authors"),
    ("editor", "secondary-authors"),
    ("collection-editor", "tertiary-authors"),
    ("translator", "subsidiary-authors"),
];

/// Title fields in output order, as (canonical, element under `<titles>`)
const TITLE_FIELDS: &[(&str, &str)] = &[
    ("title", "title"),
    ("container-title", "secondary-title"),
    ("collection-title", "tertiary-title"),
    ("title-short", "short-title"),
    ("container-title-short", "alt-title"),
];

/// Fields written as single elements directly under `<record>`
const LEAF_FIELDS: &[&str] = &[
    "page",
    "volume",
    "issue",
    "number",
    "number-of-volumes",
    "edition",
    "section",
    "publisher",
    "publisher-place",
    "genre",
    "language",
    "source",
    "DOI",
    "ISBN",
    "ISSN",
    "call-number",
    "abstract",
    "note",
    "annote",
];

/// One `<record>`: its ref-type name attribute and its leaf values by path
#[derive(Debug, Default)]
struct XmlRecord {
    ref_type_name: Option<String>,
    fields: Vec<(String, String)>,
}

impl XmlRecord {
    fn get(&self, path: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, value)| value.as_str())
    }

    fn ref_type(&self) -> Option<&str> {
        self.ref_type_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.get("ref-type"))
    }

    fn has_title(&self) -> bool {
        self.get("titles/title").is_some()
    }
}

/// Records read before the document ended, plus the XML error that ended it
#[derive(Debug, Default)]
struct Scan {
    records: Vec<XmlRecord>,
    error: Option<String>,
    unclosed: usize,
}

fn attribute(element: &BytesStart, key: &str) -> Option<String> {
    element
        .try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}

fn scan(content: &str) -> Scan {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut out = Scan::default();
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut record_depth: Option<usize> = None;
    let mut current = XmlRecord::default();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "record" && record_depth.is_none() {
                    record_depth = Some(stack.len());
                    current = XmlRecord::default();
                } else if name != "style" {
                    text.clear();
                }
                if name == "ref-type" && record_depth.is_some() {
                    current.ref_type_name = attribute(e, "name");
                }
                stack.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"ref-type" && record_depth.is_some() {
                    current.ref_type_name = attribute(e, "name");
                }
            }
            Ok(Event::Text(e)) => {
                if record_depth.is_some() {
                    text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::CData(e)) => {
                if record_depth.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name != "style" {
                    if let Some(depth) = record_depth {
                        if name == "record" && stack.len() == depth + 1 {
                            out.records.push(std::mem::take(&mut current));
                            record_depth = None;
                        } else {
                            let path = stack
                                .iter()
                                .skip(depth + 1)
                                .filter(|n| n.as_str() != "style")
                                .map(String::as_str)
                                .collect::<Vec<_>>()
                                .join("/");
                            let value = text.trim();
                            if !value.is_empty() {
                                current.fields.push((path, value.to_string()));
                            }
                        }
                    }
                    text.clear();
                }
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                out.error = Some(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    if out.error.is_none() {
        out.unclosed = stack.len();
    }
    out
}

/// Year from `<dates><year>` refined by `<pub-dates><date>`.
///
/// The pub-date often lacks the year ("March 15"), so it is read again with
/// the year appended before the two are compared.
fn combine_dates(year: Option<&str>, date: Option<&str>) -> Option<DateSpec> {
    let mut issued = year.map(parse_date).filter(|d| !d.is_empty());
    let refined = date.map(|date| {
        let spec = parse_date(date);
        match year {
            Some(year) if spec.year().is_none() => {
                let joined = parse_date(&format!("{} {}", date, year));
                if joined.year().is_some() {
                    joined
                } else {
                    spec
                }
            }
            _ => spec,
        }
    });

    if let Some(refined) = refined.filter(|d| !d.is_empty()) {
        let precision = |d: &DateSpec| d.start().map_or(0, <[i32]>::len);
        match &issued {
            Some(existing) if precision(existing) >= precision(&refined) => {}
            _ => issued = Some(refined),
        }
    }
    issued
}

/// Parser for EndNote XML exports
#[derive(Debug, Clone, Copy, Default)]
pub struct EndNoteParser;

impl EndNoteParser {
    pub fn new() -> Self {
        Self
    }

    fn record_to_entry(&self, record: &XmlRecord) -> (Entry, Vec<Warning>) {
        let mut warnings = Vec::new();
        let id = record
            .get("label")
            .or_else(|| record.get("rec-number"))
            .unwrap_or_default()
            .to_string();

        let item_type = match record.ref_type() {
            Some(ref_type) => {
                let (item_type, recognized) = map_type_from_format(ref_type, Format::EndNote);
                if !recognized {
                    warnings.push(Warning::type_downgrade(
                        id.clone(),
                        format!("Unknown EndNote ref-type '{}' read as document", ref_type),
                    ));
                }
                item_type
            }
            None => {
                warnings.push(Warning::validation(
                    id.clone(),
                    "ref-type",
                    "Record has no ref-type; read as document",
                ));
                Default::default()
            }
        };

        let mut entry = Entry::new(id.clone(), item_type);
        let mut metadata = FormatMetadata::from_source(Format::EndNote);
        metadata.original_type = record.ref_type().map(str::to_string);

        let mut year: Option<&str> = None;
        let mut pub_date: Option<&str> = None;
        let mut keywords: Vec<&str> = Vec::new();

        for (path, value) in &record.fields {
            let path = path.as_str();
            let value = value.as_str();
            if IGNORED_PATHS.contains(&path) {
                continue;
            }

            match path {
                "dates/year" => {
                    year.get_or_insert(value);
                    push_order(&mut metadata, "issued");
                    continue;
                }
                "dates/pub-dates/date" => {
                    pub_date.get_or_insert(value);
                    push_order(&mut metadata, "issued");
                    continue;
                }
                "keywords/keyword" => {
                    keywords.push(value);
                    push_order(&mut metadata, "keyword");
                    continue;
                }
                "isbn" => {
                    let canonical = if is_issn(value) { "ISSN" } else { "ISBN" };
                    if entry.text(canonical).is_none() {
                        entry.set_text(canonical, value);
                        push_order(&mut metadata, canonical);
                    }
                    continue;
                }
                _ => {}
            }

            let Some(canonical) = field_for_tag(path, Format::EndNote, item_type) else {
                metadata
                    .custom_fields
                    .entry(path.to_string())
                    .or_insert_with(|| value.to_string());
                warnings.push(
                    Warning::new(
                        id.clone(),
                        Severity::Info,
                        WarningCategory::FieldLoss,
                        format!("Element '{}' has no canonical counterpart; kept as custom", path),
                    )
                    .with_field(path),
                );
                continue;
            };
            push_order(&mut metadata, canonical);

            if let Some(people) = entry.creators_slot_mut(canonical) {
                if let Some(person) = parse_name(value) {
                    people.push(person);
                }
            } else if let Some(slot) = entry.date_slot_mut(canonical) {
                if slot.is_none() {
                    *slot = Some(parse_date(value));
                }
            } else {
                match entry.text(canonical) {
                    None => {
                        entry.set_text(canonical, value);
                    }
                    // Journal names appear under both <titles> and <periodical>
                    Some(existing) if existing == value => {}
                    Some(_) => warnings.push(Warning::field_loss(
                        id.clone(),
                        path,
                        format!("Repeated element '{}'; later value dropped", path),
                    )),
                }
            }
        }

        entry.issued = combine_dates(year, pub_date);
        if !keywords.is_empty() {
            entry.keyword = Some(join_keywords(&keywords));
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

impl FormatParser for EndNoteParser {
    fn parse(&self, content: &str) -> ConversionResult {
        let scanned = scan(content);
        let mut result = ConversionResult::new();
        let mut ids = IdRegistry::default();

        for record in &scanned.records {
            let (mut entry, mut warnings) = self.record_to_entry(record);
            if let Some(warning) = ids.assign(&mut entry, "label") {
                warnings.insert(0, warning);
            }
            for warning in warnings.iter_mut() {
                if warning.entry_id.is_empty() {
                    warning.entry_id = entry.id.clone();
                }
            }
            emit_entry(&mut result, entry, warnings);
        }

        if let Some(error) = scanned.error {
            tracing::warn!("EndNote document is not well-formed: {}", error);
            result.push_failure(Warning::parse_error("", error));
        }

        tracing::debug!(
            "Parsed endnote document: {} entries, {} failed",
            result.stats.successful,
            result.stats.failed
        );
        result
    }

    fn validate(&self, content: &str) -> Vec<Warning> {
        let scanned = scan(content);
        let mut warnings = Vec::new();

        if let Some(error) = scanned.error {
            warnings.push(Warning::new(
                "",
                Severity::Error,
                WarningCategory::ValidationError,
                error,
            ));
        } else if scanned.unclosed > 0 {
            warnings.push(Warning::new(
                "",
                Severity::Error,
                WarningCategory::ValidationError,
                format!("Document ends with {} unclosed element(s)", scanned.unclosed),
            ));
        }

        for (index, record) in scanned.records.iter().enumerate() {
            let id = record
                .get("label")
                .or_else(|| record.get("rec-number"))
                .map_or_else(|| format!("#{}", index + 1), str::to_string);
            if record.ref_type().is_none() {
                warnings.push(Warning::validation(
                    id.clone(),
                    "ref-type",
                    "Record has no ref-type",
                ));
            }
            if !record.has_title() {
                warnings.push(Warning::validation(
                    id,
                    "titles/title",
                    "Record has no title",
                ));
            }
        }

        warnings
    }
}

/// Write `<a><b>value</b></a>` for the path `a/b`
fn write_element(out: &mut String, path: &str, value: &str) {
    let parts: Vec<&str> = path.split('/').collect();
    for part in &parts {
        out.push('<');
        out.push_str(part);
        out.push('>');
    }
    out.push_str(&escape(value));
    for part in parts.iter().rev() {
        out.push_str("</");
        out.push_str(part);
        out.push('>');
    }
}

/// Write `<group>` around the non-empty `(element, value)` pairs, if any
fn write_group(out: &mut String, group: &str, children: &[(&str, String)]) {
    let children: Vec<&(&str, String)> =
        children.iter().filter(|(_, v)| !v.trim().is_empty()).collect();
    if children.is_empty() {
        return;
    }
    out.push_str(&format!("<{}>", group));
    for (element, value) in children {
        write_element(out, element, value);
    }
    out.push_str(&format!("</{}>", group));
}

/// Generator for EndNote XML
#[derive(Debug, Clone, Copy, Default)]
pub struct EndNoteGenerator;

impl EndNoteGenerator {
    pub fn new() -> Self {
        Self
    }

    fn write_record(
        &self,
        out: &mut String,
        number: usize,
        entry: &Entry,
        options: &GenerateOptions,
    ) {
        out.push_str("<record>");
        write_element(out, "rec-number", &number.to_string());

        let ref_type = resolve_entry_type(entry, Format::EndNote);
        out.push_str(&format!(
            "<ref-type name=\"{}\">{}</ref-type>",
            escape(&ref_type.name),
            ref_type.code.unwrap_or(0)
        ));

        let has_contributors = CONTRIBUTOR_GROUPS
            .iter()
            .any(|(field, _)| !entry.creators(field).is_empty());
        if has_contributors {
            out.push_str("<contributors>");
            for (field, group) in CONTRIBUTOR_GROUPS {
                let people: Vec<(&str, String)> = entry
                    .creators(field)
                    .iter()
                    .map(|p| ("author", serialize_name(p, NameStyle::FamilyFirst)))
                    .collect();
                write_group(out, group, &people);
            }
            out.push_str("</contributors>");
        }

        let titles: Vec<(&str, String)> = TITLE_FIELDS
            .iter()
            .filter_map(|(field, element)| entry.text(field).map(|v| (*element, v.to_string())))
            .collect();
        write_group(out, "titles", &titles);

        if entry.item_type.is_serial_article() {
            if let Some(journal) = entry.container_title.as_deref() {
                write_group(out, "periodical", &[("full-title", journal.to_string())]);
            }
        }

        for field in LEAF_FIELDS {
            if let Some(value) = entry.text(field) {
                write_element(out, &get_tag(field, Format::EndNote), value);
            }
        }

        if let Some(keywords) = entry.keyword.as_deref() {
            let keywords: Vec<(&str, String)> = split_keywords(keywords)
                .into_iter()
                .map(|k| ("keyword", k))
                .collect();
            write_group(out, "keywords", &keywords);
        }

        if let Some(issued) = entry.issued.as_ref() {
            let mut dates = String::new();
            let year = issued
                .year()
                .map(|y| format!("{:04}", y))
                .unwrap_or_else(|| to_iso(Some(issued)));
            if !year.is_empty() {
                write_element(&mut dates, "year", &year);
            }
            if issued.month().is_some() {
                write_element(&mut dates, "pub-dates/date", &to_iso(Some(issued)));
            }
            if !dates.is_empty() {
                out.push_str("<dates>");
                out.push_str(&dates);
                out.push_str("</dates>");
            }
        }

        if let Some(accessed) = entry.accessed.as_ref() {
            write_element(out, "access-date", &to_iso(Some(accessed)));
        }

        if let Some(url) = entry.url.as_deref() {
            write_element(out, "urls/related-urls/url", url);
        }

        if options.include_metadata {
            if let Some(metadata) = entry
                .metadata
                .as_ref()
                .filter(|m| m.source_format == Some(Format::EndNote))
            {
                for (path, value) in &metadata.custom_fields {
                    write_element(out, path, value);
                }
            }
        }

        write_element(out, "label", &entry.id);
        out.push_str("</record>");
    }
}

impl FormatGenerator for EndNoteGenerator {
    fn generate(&self, entries: &[Entry], options: &GenerateOptions) -> String {
        let nl = options.newline();
        let entries = options.ordered(entries);

        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        out.push_str(nl);
        out.push_str("<xml>");
        out.push_str(nl);
        if entries.is_empty() {
            out.push_str("<records></records>");
        } else {
            out.push_str("<records>");
            for (index, entry) in entries.iter().enumerate() {
                out.push_str(nl);
                self.write_record(&mut out, index + 1, entry, options);
            }
            out.push_str(nl);
            out.push_str("</records>");
        }
        out.push_str(nl);
        out.push_str("</xml>");
        out.push_str(nl);

        tracing::debug!("Generated endnote document: {} entries", entries.len());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citebridge_domain::{ItemType, Person};

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xml><records>
<record>
  <database name="My Library.enl" path="My Library.enl">My Library.enl</database>
  <source-app name="EndNote" version="20.0">EndNote</source-app>
  <rec-number>7</rec-number>
  <ref-type name="Journal Article">17</ref-type>
  <contributors>
    <authors>
      <author><style face="normal" font="default" size="100%">Smith, John</style></author>
      <author>Doe, Jane</author>
    </authors>
  </contributors>
  <titles>
    <title><style face="normal" font="default" size="100%">Cats &amp; Dogs</style></title>
    <secondary-title>Journal of Pets</secondary-title>
  </titles>
  <periodical><full-title>Journal of Pets</full-title></periodical>
  <pages>100-110</pages>
  <volume>12</volume>
  <number>3</number>
  <keywords><keyword>pets</keyword><keyword>behavior</keyword></keywords>
  <dates><year>2024</year><pub-dates><date>March 15</date></pub-dates></dates>
  <isbn>1234-5678</isbn>
  <electronic-resource-num>10.1234/pets.2024</electronic-resource-num>
  <urls><related-urls><url>https://example.org/pets</url></related-urls></urls>
  <custom1>shelf 4</custom1>
</record>
</records></xml>
"#;

    #[test]
    fn test_parse_sample() {
        let result = EndNoteParser::new().parse(SAMPLE);
        assert_eq!(result.stats.failed, 0);
        assert_eq!(result.entries.len(), 1);
        let entry = &result.entries[0];

        assert_eq!(entry.id, "7");
        assert_eq!(entry.item_type, ItemType::ArticleJournal);
        assert_eq!(
            entry.author,
            vec![
                Person::family_given("Smith", "John"),
                Person::family_given("Doe", "Jane")
            ]
        );
        assert_eq!(entry.title.as_deref(), Some("Cats & Dogs"));
        assert_eq!(entry.container_title.as_deref(), Some("Journal of Pets"));
        assert_eq!(entry.page.as_deref(), Some("100-110"));
        assert_eq!(entry.issue.as_deref(), Some("3"));
        assert_eq!(entry.issn.as_deref(), Some("1234-5678"));
        assert_eq!(entry.doi.as_deref(), Some("10.1234/pets.2024"));
        assert_eq!(entry.url.as_deref(), Some("https://example.org/pets"));
        assert_eq!(entry.keyword.as_deref(), Some("pets, behavior"));
        assert_eq!(entry.issued, Some(DateSpec::from_parts(vec![2024, 3, 15])));

        let metadata = entry.metadata.as_ref().unwrap();
        assert_eq!(metadata.original_type.as_deref(), Some("Journal Article"));
        assert_eq!(
            metadata.custom_fields.get("custom1").map(String::as_str),
            Some("shelf 4")
        );
    }

    #[test]
    fn test_ref_type_code_only() {
        let xml = "<xml><records><record><ref-type>5</ref-type>\
                   <titles><title>Part</title></titles></record></records></xml>";
        let result = EndNoteParser::new().parse(xml);
        assert_eq!(result.entries[0].item_type, ItemType::Chapter);
    }

    #[test]
    fn test_missing_ref_type_and_label() {
        let xml = "<xml><records><record><titles><title>Untyped</title></titles>\
                   <dates><year>2001</year></dates></record></records></xml>";
        let result = EndNoteParser::new().parse(xml);
        let entry = &result.entries[0];
        assert_eq!(entry.item_type, ItemType::Document);
        assert!(!entry.id.is_empty());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field.as_deref() == Some("ref-type")));
    }

    #[test]
    fn test_malformed_document_is_a_failure() {
        let xml = "<xml><records><record><ref-type name=\"Book\">6</ref-type></record>\
                   <record><titles></record></records></xml>";
        let result = EndNoteParser::new().parse(xml);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.stats.failed, 1);
        assert!(result.has_errors());
    }

    #[test]
    fn test_combine_dates() {
        assert_eq!(
            combine_dates(Some("2024"), Some("March 15")),
            Some(DateSpec::from_parts(vec![2024, 3, 15]))
        );
        assert_eq!(
            combine_dates(Some("2024"), Some("2024-06")),
            Some(DateSpec::from_parts(vec![2024, 6]))
        );
        assert_eq!(
            combine_dates(Some("2024"), None),
            Some(DateSpec::from_parts(vec![2024]))
        );
        assert_eq!(combine_dates(None, None), None);
    }

    #[test]
    fn test_generate_entry() {
        let mut entry = Entry::new("Smith2024", ItemType::ArticleJournal)
            .with_text("title", "Cats & <Dogs>")
            .with_text("container-title", "Journal of Pets")
            .with_text("DOI", "10.1/x");
        entry.author.push(Person::family_given("Smith", "John"));
        entry.issued = Some(DateSpec::from_parts(vec![2024, 3]));

        let output = EndNoteGenerator::new().generate(&[entry], &GenerateOptions::default());
        assert!(output.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<xml>\n<records>"));
        assert!(output.contains("<ref-type name=\"Journal Article\">17</ref-type>"));
        assert!(output.contains(
            "<contributors><authors><author>Smith, John</author></authors></contributors>"
        ));
        assert!(output.contains("<title>Cats &amp; &lt;Dogs&gt;</title>"));
        assert!(output.contains("<periodical><full-title>Journal of Pets</full-title></periodical>"));
        assert!(output.contains("<electronic-resource-num>10.1/x</electronic-resource-num>"));
        assert!(output.contains(
            "<dates><year>2024</year><pub-dates><date>2024-03</date></pub-dates></dates>"
        ));
        assert!(output.contains("<label>Smith2024</label>"));
        assert!(output.ends_with("</records>\n</xml>\n"));
    }

    #[test]
    fn test_generate_empty() {
        let output = EndNoteGenerator::new().generate(&[], &GenerateOptions::default());
        assert!(output.contains("<records></records>"));
        assert!(EndNoteParser::new().validate(&output).is_empty());
    }

    #[test]
    fn test_round_trip() {
        let parsed = EndNoteParser::new().parse(SAMPLE);
        let options = GenerateOptions::default().with_include_metadata(true);
        let output = EndNoteGenerator::new().generate(&parsed.entries, &options);
        let reparsed = EndNoteParser::new().parse(&output);

        assert_eq!(reparsed.stats.failed, 0);
        let before = parsed.entries[0].without_metadata();
        let after = reparsed.entries[0].without_metadata();
        assert_eq!(before, after);
        assert!(output.contains("<custom1>shelf 4</custom1>"));
    }

    #[test]
    fn test_validate() {
        let warnings = EndNoteParser::new().validate(
            "<xml><records><record><rec-number>1</rec-number></record></records></xml>",
        );
        assert!(warnings.iter().any(|w| w.field.as_deref() == Some("ref-type")));
        assert!(warnings.iter().any(|w| w.field.as_deref() == Some("titles/title")));

        let warnings = EndNoteParser::new().validate("<xml><records>");
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("unclosed") || w.message.contains("XML error")));

        assert!(EndNoteParser::new().validate(SAMPLE).is_empty());
    }
}
