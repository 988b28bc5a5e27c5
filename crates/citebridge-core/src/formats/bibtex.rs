//! BibTeX and BibLaTeX
//!
//! Both dialects share the grammar in `citebridge-bibtex`; they differ only
//! in which column of the type and field tables they consult.

use std::collections::HashSet;

use citebridge_bibtex::{
    brace_balance, decode_latex, escape_latex, write_records, BibRecord, ValueStyle, WriteStyle,
};
use citebridge_domain::{
    parse_date, parse_names, parse_split_date, serialize_names, to_iso, to_split_fields,
    ConversionResult, Entry, Format, FormatMetadata, NameStyle, Person, Severity, Warning,
    WarningCategory,
};

use super::{
    emit_entry, join_keywords, join_page_range, split_page_range, FormatGenerator, FormatParser,
    IdRegistry,
};
use crate::config::GenerateOptions;
use crate::field_map::{field_for_tag, tag_for_type, transform_for, Transform};
use crate::type_map::{map_type_from_format, resolve_entry_type};

/// Canonical fields in the order they are written
const FIELD_ORDER: &[&str] = &[
    "author",
    "editor",
    "translator",
    "container-author",
    "title",
    "title-short",
    "container-title",
    "container-title-short",
    "collection-title",
    "original-title",
    "edition",
    "volume",
    "number-of-volumes",
    "issue",
    "number",
    "chapter-number",
    "page",
    "number-of-pages",
    "issued",
    "original-date",
    "event",
    "event-date",
    "event-place",
    "publisher",
    "publisher-place",
    "genre",
    "medium",
    "version",
    "status",
    "DOI",
    "ISBN",
    "ISSN",
    "PMID",
    "PMCID",
    "URL",
    "accessed",
    "language",
    "abstract",
    "keyword",
    "note",
    "annote",
];

/// Required fields per entry type; each inner list is a set of alternatives
const REQUIRED_FIELDS: &[(&str, &[&[&str]])] = &[
    ("article", &[&["author"], &["title"], &["journal", "journaltitle"], &["year", "date"]]),
    ("book", &[&["author", "editor"], &["title"], &["publisher"], &["year", "date"]]),
    ("inbook", &[&["author", "editor"], &["title"], &["chapter", "pages"], &["publisher"], &["year", "date"]]),
    ("incollection", &[&["author"], &["title"], &["booktitle"], &["publisher"], &["year", "date"]]),
    ("inproceedings", &[&["author"], &["title"], &["booktitle"], &["year", "date"]]),
    ("conference", &[&["author"], &["title"], &["booktitle"], &["year", "date"]]),
    ("phdthesis", &[&["author"], &["title"], &["school", "institution"], &["year", "date"]]),
    ("mastersthesis", &[&["author"], &["title"], &["school", "institution"], &["year", "date"]]),
    ("thesis", &[&["author"], &["title"], &["type"], &["institution", "school"], &["year", "date"]]),
    ("techreport", &[&["author"], &["title"], &["institution"], &["year", "date"]]),
    ("report", &[&["author"], &["title"], &["type"], &["institution"], &["year", "date"]]),
    ("proceedings", &[&["title"], &["year", "date"]]),
    ("booklet", &[&["title"]]),
    ("manual", &[&["title"]]),
    ("unpublished", &[&["author"], &["title"], &["note"]]),
    ("online", &[&["author", "editor"], &["title"], &["year", "date"], &["url", "doi", "eprint"]]),
    ("dataset", &[&["author", "editor"], &["title"], &["year", "date"]]),
    ("software", &[&["author", "editor"], &["title"], &["year", "date"]]),
    ("patent", &[&["author"], &["title"], &["number"], &["year", "date"]]),
];

fn decode_person(person: Person) -> Person {
    let decode = |part: Option<String>| part.map(|p| decode_latex(&p));
    Person {
        family: decode(person.family),
        given: decode(person.given),
        literal: decode(person.literal),
        suffix: decode(person.suffix),
        dropping_particle: decode(person.dropping_particle),
        non_dropping_particle: decode(person.non_dropping_particle),
    }
}

/// Fields of one entry holding characters with no LaTeX spelling
#[derive(Debug, Default)]
struct EncodingLosses {
    fields: Vec<String>,
}

impl EncodingLosses {
    /// LaTeX-escape `value`, noting `field` when something could not be encoded
    fn escape(&mut self, field: &str, value: &str) -> String {
        let (escaped, unencodable) = escape_latex(value);
        if unencodable && !self.fields.iter().any(|f| f == field) {
            self.fields.push(field.to_string());
        }
        escaped
    }

    fn into_warnings(self, entry_id: &str, format: Format) -> Vec<Warning> {
        self.fields
            .into_iter()
            .map(|field| {
                let message = format!(
                    "Field '{}' has characters with no {} encoding; written as-is",
                    field, format
                );
                Warning::encoding_loss(entry_id, field, message)
            })
            .collect()
    }
}

fn escape_person(person: &Person, field: &str, losses: &mut EncodingLosses) -> Person {
    let mut escape = |part: &Option<String>| part.as_deref().map(|p| losses.escape(field, p));
    Person {
        family: escape(&person.family),
        given: escape(&person.given),
        literal: escape(&person.literal),
        suffix: escape(&person.suffix),
        dropping_particle: escape(&person.dropping_particle),
        non_dropping_particle: escape(&person.non_dropping_particle),
    }
}

/// Undo the escapes people habitually put into URLs and DOIs
fn unescape_verbatim(value: &str) -> String {
    value
        .trim()
        .replace("\\_", "_")
        .replace("\\%", "%")
        .replace("\\&", "&")
        .replace("\\#", "#")
}

/// Parser for BibTeX or BibLaTeX documents
#[derive(Debug, Clone, Copy)]
pub struct BibTeXParser {
    format: Format,
}

impl BibTeXParser {
    pub fn bibtex() -> Self {
        Self {
            format: Format::BibTeX,
        }
    }

    pub fn biblatex() -> Self {
        Self {
            format: Format::BibLaTeX,
        }
    }

    /// Build an entry from one raw record
    fn record_to_entry(&self, record: &BibRecord) -> (Entry, Vec<Warning>) {
        let key = record.key.clone();
        let mut warnings = Vec::new();

        let (item_type, recognized) = map_type_from_format(&record.kind, self.format);
        if !recognized {
            warnings.push(Warning::type_downgrade(
                key.clone(),
                format!("Unknown entry type '@{}' read as document", record.kind),
            ));
        }

        let mut entry = Entry::new(key.clone(), item_type);
        let mut metadata = FormatMetadata::from_source(self.format);
        metadata.original_type = Some(record.kind.clone());
        metadata.raw = Some(record.raw.clone());

        let mut year = None;
        let mut month = None;
        let mut day = None;

        for field in &record.fields {
            let name = field.name.as_str();
            match name {
                "year" => {
                    year.get_or_insert(field.value.as_str());
                    push_order(&mut metadata, "issued");
                    continue;
                }
                "month" => {
                    month.get_or_insert(field.value.as_str());
                    continue;
                }
                "day" => {
                    day.get_or_insert(field.value.as_str());
                    continue;
                }
                _ => {}
            }

            let Some(canonical) = field_for_tag(name, self.format, item_type) else {
                metadata
                    .custom_fields
                    .insert(name.to_string(), decode_latex(&field.value));
                warnings.push(
                    Warning::new(
                        key.clone(),
                        Severity::Info,
                        WarningCategory::FieldLoss,
                        format!("Field '{}' has no canonical counterpart; kept as custom", name),
                    )
                    .with_field(name),
                );
                continue;
            };

            if entry.has_field(canonical) {
                warnings.push(Warning::field_loss(
                    key.clone(),
                    name,
                    format!("Field '{}' repeats '{}'; later value dropped", name, canonical),
                ));
                continue;
            }

            if let Some(slot) = entry.creators_slot_mut(canonical) {
                *slot = parse_names(&field.value)
                    .into_iter()
                    .map(decode_person)
                    .collect();
            } else if let Some(slot) = entry.date_slot_mut(canonical) {
                let date = parse_date(&decode_latex(&field.value));
                *slot = (!date.is_empty()).then_some(date);
            } else {
                let value = match transform_for(canonical) {
                    Transform::Verbatim => unescape_verbatim(&field.value),
                    Transform::PageRange => decode_latex(&field.value.replace("--", "-")),
                    Transform::Custom => {
                        let decoded = decode_latex(&field.value);
                        join_keywords(&decoded.split([',', ';']).collect::<Vec<_>>())
                    }
                    _ => decode_latex(&field.value),
                };
                entry.set_text(canonical, value);
            }
            push_order(&mut metadata, canonical);
        }

        if let Some(year) = year {
            if entry.issued.is_none() {
                let date = parse_split_date(&decode_latex(year), month, day);
                if let Some(month) = month {
                    if date.month().is_none() {
                        metadata
                            .custom_fields
                            .insert("month".to_string(), decode_latex(month));
                        warnings.push(Warning::field_loss(
                            key.clone(),
                            "month",
                            format!("Unrecognized month '{}'", month),
                        ));
                    }
                }
                entry.issued = (!date.is_empty()).then_some(date);
            }
        } else if let Some(month) = month {
            metadata
                .custom_fields
                .insert("month".to_string(), decode_latex(month));
            warnings.push(Warning::field_loss(
                key.clone(),
                "month",
                "Month given without a year",
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

impl FormatParser for BibTeXParser {
    fn parse(&self, content: &str) -> ConversionResult {
        let output = citebridge_bibtex::parse(content);
        let mut result = ConversionResult::new();
        let mut ids = IdRegistry::default();

        for record in &output.records {
            let (mut entry, mut warnings) = self.record_to_entry(record);
            if let Some(warning) = ids.assign(&mut entry, "key") {
                warnings.insert(0, warning);
            }
            emit_entry(&mut result, entry, warnings);
        }

        for error in &output.errors {
            tracing::warn!(
                "Skipping unparsable {} record at line {}: {}",
                self.format,
                error.line,
                error.error
            );
            result.push_failure(Warning::parse_error(
                error.key.clone().unwrap_or_default(),
                format!("Line {}: {}", error.line, error.error),
            ));
        }

        tracing::debug!(
            "Parsed {} document: {} entries, {} failed",
            self.format,
            result.stats.successful,
            result.stats.failed
        );
        result
    }

    fn validate(&self, content: &str) -> Vec<Warning> {
        let output = citebridge_bibtex::parse(content);
        let mut warnings = Vec::new();

        for error in &output.errors {
            warnings.push(Warning::parse_error(
                error.key.clone().unwrap_or_default(),
                format!("Line {}: {}", error.line, error.error),
            ));
        }

        let balance = brace_balance(content);
        if balance != 0 {
            warnings.push(Warning::new(
                "",
                Severity::Error,
                WarningCategory::ValidationError,
                format!("Document has unbalanced braces ({:+})", balance),
            ));
        }

        let mut keys = HashSet::new();
        for record in &output.records {
            let key = record.key.as_str();
            if key.is_empty() {
                warnings.push(Warning::validation(
                    "",
                    "key",
                    format!("@{} at line {} has no cite key", record.kind, record.line),
                ));
            } else if !keys.insert(key) {
                warnings.push(Warning::validation(
                    key,
                    "key",
                    format!("Duplicate cite key '{}'", key),
                ));
            }

            for name in record.duplicate_fields() {
                warnings.push(Warning::validation(
                    key,
                    name,
                    format!("Field '{}' appears more than once", name),
                ));
            }

            let required = REQUIRED_FIELDS
                .iter()
                .find(|(kind, _)| *kind == record.kind)
                .map(|(_, fields)| *fields)
                .unwrap_or(&[]);
            for alternatives in required {
                if !alternatives.iter().any(|name| record.has(name)) {
                    warnings.push(Warning::validation(
                        key,
                        alternatives[0],
                        format!(
                            "@{} is missing required field '{}'",
                            record.kind,
                            alternatives.join("' or '")
                        ),
                    ));
                }
            }
        }

        warnings
    }
}

/// Generator for BibTeX or BibLaTeX documents
#[derive(Debug, Clone, Copy)]
pub struct BibTeXGenerator {
    format: Format,
}

impl BibTeXGenerator {
    pub fn bibtex() -> Self {
        Self {
            format: Format::BibTeX,
        }
    }

    pub fn biblatex() -> Self {
        Self {
            format: Format::BibLaTeX,
        }
    }

    fn entry_type(&self, entry: &Entry) -> String {
        let mapping = resolve_entry_type(entry, self.format);
        let is_masters = entry
            .genre
            .as_deref()
            .is_some_and(|g| g.to_lowercase().contains("master"));
        if mapping.name == "phdthesis" && is_masters {
            "mastersthesis".to_string()
        } else {
            mapping.name
        }
    }

    /// Build the record for `entry`, with a warning per field that lost characters
    fn entry_to_record(
        &self,
        entry: &Entry,
        options: &GenerateOptions,
    ) -> (BibRecord, Vec<Warning>) {
        let mut record = BibRecord::new(self.entry_type(entry), entry.id.clone());
        let mut losses = EncodingLosses::default();

        let recorded_order = entry
            .metadata
            .as_ref()
            .filter(|_| options.preserve_field_order)
            .map(|m| m.field_order.as_slice())
            .unwrap_or(&[]);
        let mut order: Vec<&str> = recorded_order
            .iter()
            .map(String::as_str)
            .filter(|f| FIELD_ORDER.contains(f))
            .collect();
        for field in FIELD_ORDER {
            if !order.contains(field) {
                order.push(field);
            }
        }

        for canonical in order {
            self.write_field(&mut record, entry, canonical, &mut losses);
        }

        if options.include_metadata {
            if let Some(metadata) = &entry.metadata {
                let same_family = metadata
                    .source_format
                    .is_some_and(|source| self.format.shares_family_with(source));
                if same_family {
                    for (name, value) in &metadata.custom_fields {
                        if !record.has(name) {
                            let value = losses.escape(name, value);
                            record.push(name.as_str(), value);
                        }
                    }
                }
            }
        }

        let warnings = losses.into_warnings(&entry.id, self.format);
        (record, warnings)
    }

    /// Append one canonical field; the first field to claim a tag wins
    fn write_field(
        &self,
        record: &mut BibRecord,
        entry: &Entry,
        canonical: &str,
        losses: &mut EncodingLosses,
    ) {
        let tag = tag_for_type(canonical, self.format, entry.item_type);

        if canonical == "issued" {
            self.write_issued(record, entry, losses);
            return;
        }
        if record.has(&tag) {
            return;
        }

        let people = entry.creators(canonical);
        if !people.is_empty() {
            let escaped: Vec<Person> = people
                .iter()
                .map(|person| escape_person(person, &tag, losses))
                .collect();
            record.push(tag.as_ref(), serialize_names(&escaped, NameStyle::FamilyFirst));
            return;
        }

        if let Some(date) = entry.date(canonical) {
            let value = to_iso(Some(date));
            if !value.is_empty() {
                record.push(tag.as_ref(), value);
            }
            return;
        }

        let Some(value) = entry.text(canonical) else {
            return;
        };
        let value = match transform_for(canonical) {
            Transform::Verbatim => value.trim().to_string(),
            Transform::PageRange => {
                let (start, end) = split_page_range(value);
                losses.escape(&tag, &join_page_range(&start, end.as_deref(), "--"))
            }
            _ => losses.escape(&tag, value),
        };
        record.push(tag.as_ref(), value);
    }

    fn write_issued(&self, record: &mut BibRecord, entry: &Entry, losses: &mut EncodingLosses) {
        let Some(date) = entry.issued.as_ref() else {
            return;
        };

        if self.format == Format::BibLaTeX {
            let value = to_iso(Some(date));
            if !value.is_empty() && !record.has("date") {
                let value = losses.escape("date", &value);
                record.push("date", value);
            }
            return;
        }

        let split = to_split_fields(Some(date));
        if split.year.is_empty() || record.has("year") {
            return;
        }
        let year = losses.escape("year", &split.year);
        record.push("year", year);
        if !split.month.is_empty() {
            record.push_styled("month", split.month, ValueStyle::Bare);
        }
        if !split.day.is_empty() {
            record.push("day", split.day);
        }
    }
}

impl FormatGenerator for BibTeXGenerator {
    fn generate(&self, entries: &[Entry], options: &GenerateOptions) -> String {
        self.generate_with_warnings(entries, options).0
    }

    fn generate_with_warnings(
        &self,
        entries: &[Entry],
        options: &GenerateOptions,
    ) -> (String, Vec<Warning>) {
        let mut records = Vec::new();
        let mut warnings = Vec::new();
        for entry in options.ordered(entries) {
            let (record, lost) = self.entry_to_record(entry, options);
            records.push(record);
            warnings.extend(lost);
        }

        let style = WriteStyle {
            indent: options.indent.clone(),
            line_ending: options.newline().to_string(),
        };
        let mut output = write_records(&records, &style);
        if !output.is_empty() {
            output.push_str(options.newline());
        }

        tracing::debug!(
            "Generated {} document: {} entries, {} encoding losses",
            self.format,
            records.len(),
            warnings.len()
        );
        (output, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citebridge_domain::{DateSpec, ItemType};

    const ARTICLE: &str = r#"@article{Einstein1905,
  author = {Einstein, Albert and {Royal Society}},
  title = {Zur Elektrodynamik bewegter K{\"o}rper},
  journal = {Annalen der Physik},
  year = {1905},
  month = jun,
  volume = {322},
  number = {10},
  pages = {891--921},
  doi = {10.1002/andp.19053221004},
  keywords = {relativity; electrodynamics},
  timestamp = {2020-01-01}
}"#;

    #[test]
    fn test_parse_article() {
        let result = BibTeXParser::bibtex().parse(ARTICLE);
        assert_eq!(result.stats.successful, 1);
        let entry = &result.entries[0];

        assert_eq!(entry.id, "Einstein1905");
        assert_eq!(entry.item_type, ItemType::ArticleJournal);
        assert_eq!(entry.title.as_deref(), Some("Zur Elektrodynamik bewegter Körper"));
        assert_eq!(entry.container_title.as_deref(), Some("Annalen der Physik"));
        assert_eq!(entry.author[0], Person::family_given("Einstein", "Albert"));
        assert_eq!(entry.author[1], Person::literal("Royal Society"));
        assert_eq!(entry.issue.as_deref(), Some("10"));
        assert_eq!(entry.page.as_deref(), Some("891-921"));
        assert_eq!(entry.doi.as_deref(), Some("10.1002/andp.19053221004"));
        assert_eq!(entry.keyword.as_deref(), Some("relativity, electrodynamics"));
        assert_eq!(entry.issued, Some(DateSpec::from_parts(vec![1905, 6])));
    }

    #[test]
    fn test_unknown_field_is_kept_as_custom() {
        let result = BibTeXParser::bibtex().parse(ARTICLE);
        let entry = &result.entries[0];
        let metadata = entry.metadata.as_ref().unwrap();

        assert_eq!(metadata.source_format, Some(Format::BibTeX));
        assert_eq!(metadata.original_type.as_deref(), Some("article"));
        assert_eq!(
            metadata.custom_fields.get("timestamp").map(String::as_str),
            Some("2020-01-01")
        );
        let warning = result
            .warnings
            .iter()
            .find(|w| w.field.as_deref() == Some("timestamp"))
            .unwrap();
        assert_eq!(warning.severity, Severity::Info);
        assert_eq!(warning.category, WarningCategory::FieldLoss);
    }

    #[test]
    fn test_unknown_type_downgrades() {
        let result = BibTeXParser::bibtex().parse("@gadget{g1, title = {Widget}}");
        assert_eq!(result.entries[0].item_type, ItemType::Document);
        assert_eq!(result.warnings[0].category, WarningCategory::TypeDowngrade);
        assert_eq!(result.stats.with_warnings, 1);
    }

    #[test]
    fn test_broken_record_is_counted_as_failed() {
        let input = "@misc{bad, title = {Open\n\n@misc{good, title = {Fine}}";
        let result = BibTeXParser::bibtex().parse(input);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].id, "good");
        assert_eq!(result.stats.failed, 1);
        assert_eq!(result.stats.total, 2);
        assert!(result.has_errors());
    }

    #[test]
    fn test_missing_key_is_derived() {
        let result = BibTeXParser::bibtex()
            .parse("@book{, author = {Knuth, Donald}, title = {The Art of Computer Programming}, year = 1968}");
        let entry = &result.entries[0];
        assert_eq!(entry.id, "Knuth1968Art");
        assert_eq!(result.warnings[0].field.as_deref(), Some("key"));
    }

    #[test]
    fn test_biblatex_date_fields() {
        let input = "@online{web, title = {Docs}, date = {2024-03-15}, urldate = {2024-05-01}, url = {https://example.com/a\\_b}}";
        let result = BibTeXParser::biblatex().parse(input);
        let entry = &result.entries[0];
        assert_eq!(entry.item_type, ItemType::Webpage);
        assert_eq!(entry.issued, Some(DateSpec::from_parts(vec![2024, 3, 15])));
        assert_eq!(entry.accessed, Some(DateSpec::from_parts(vec![2024, 5, 1])));
        assert_eq!(entry.url.as_deref(), Some("https://example.com/a_b"));
    }

    #[test]
    fn test_unrecognized_month_is_reported() {
        let result = BibTeXParser::bibtex().parse("@misc{m, year = 2001, month = {Midsummer}}");
        let entry = &result.entries[0];
        assert_eq!(entry.year(), Some(2001));
        assert_eq!(
            entry.metadata.as_ref().unwrap().custom_fields.get("month").map(String::as_str),
            Some("Midsummer")
        );
        assert!(result.warnings.iter().any(|w| w.field.as_deref() == Some("month")));
    }

    #[test]
    fn test_generate_article() {
        let mut entry = Entry::new("Doe2024", ItemType::ArticleJournal)
            .with_text("title", "Café & Co: 100% _new_")
            .with_text("container-title", "Journal of Tests")
            .with_text("page", "100-110")
            .with_text("DOI", "10.1000/x_y");
        entry.author.push(Person::family_given("Doe", "Jane"));
        entry.author.push(Person::literal("ACME Corp"));
        entry.issued = Some(DateSpec::from_parts(vec![2024, 3]));

        let output = BibTeXGenerator::bibtex().generate(&[entry], &GenerateOptions::default());
        assert_eq!(
            output,
            "@article{Doe2024,\n  author = {Doe, Jane and {ACME Corp}},\n  title = {Caf{\\'e} \\& Co: 100\\% \\_new\\_},\n  journal = {Journal of Tests},\n  pages = {100--110},\n  year = {2024},\n  month = mar,\n  doi = {10.1000/x_y},\n}\n"
        );
    }

    #[test]
    fn test_generate_uses_type_overrides() {
        let entry = Entry::new("ch", ItemType::Chapter)
            .with_text("container-title", "Collected Works")
            .with_text("publisher", "Springer");
        let output = BibTeXGenerator::bibtex().generate(&[entry], &GenerateOptions::default());
        assert!(output.starts_with("@incollection{ch,"));
        assert!(output.contains("booktitle = {Collected Works}"));

        let thesis = Entry::new("t", ItemType::Thesis)
            .with_text("publisher", "MIT")
            .with_text("genre", "Master's thesis");
        let output = BibTeXGenerator::bibtex().generate(&[thesis], &GenerateOptions::default());
        assert!(output.starts_with("@mastersthesis{t,"));
        assert!(output.contains("school = {MIT}"));
    }

    #[test]
    fn test_biblatex_generation() {
        let mut entry = Entry::new("d", ItemType::Dataset).with_text("container-title", "Zenodo");
        entry.issued = Some(DateSpec::from_parts(vec![2023, 1, 9]));

        let output = BibTeXGenerator::biblatex().generate(&[entry.clone()], &GenerateOptions::default());
        assert!(output.starts_with("@dataset{d,"));
        assert!(output.contains("date = {2023-01-09}"));
        assert!(!output.contains("year ="));

        let output = BibTeXGenerator::bibtex().generate(&[entry], &GenerateOptions::default());
        assert!(output.starts_with("@misc{d,"));
        assert!(output.contains("day = {09}"));
    }

    #[test]
    fn test_round_trip_keeps_original_type_and_custom_fields() {
        let input = "@mastersthesis{m1,\n  author = {Lovelace, Ada},\n  title = {Notes},\n  school = {London},\n  year = 1843,\n  timestamp = {x}\n}";
        let parsed = BibTeXParser::bibtex().parse(input);
        let options = GenerateOptions::default().with_include_metadata(true);
        let output = BibTeXGenerator::bibtex().generate(&parsed.entries, &options);

        assert!(output.starts_with("@mastersthesis{m1,"));
        assert!(output.contains("school = {London}"));
        assert!(output.contains("timestamp = {x}"));

        let plain = BibTeXGenerator::bibtex().generate(&parsed.entries, &GenerateOptions::default());
        assert!(!plain.contains("timestamp"));
    }

    #[test]
    fn test_unencodable_characters_are_reported() {
        let mut entry = Entry::new("k", ItemType::Book)
            .with_text("title", "日本語の本")
            .with_text("publisher", "Köln Verlag");
        entry.author.push(Person::family_given("山田", "太郎"));

        let (output, warnings) = BibTeXGenerator::bibtex()
            .generate_with_warnings(&[entry], &GenerateOptions::default());
        assert!(output.contains("title = {日本語の本}"));

        let fields: Vec<&str> = warnings
            .iter()
            .filter(|w| w.category == WarningCategory::EncodingLoss && w.entry_id == "k")
            .filter_map(|w| w.field.as_deref())
            .collect();
        assert_eq!(fields, vec!["author", "title"]);
    }

    #[test]
    fn test_preserve_field_order() {
        let input = "@misc{o, year = 2000, title = {T}, author = {Roe, Rick}}";
        let parsed = BibTeXParser::bibtex().parse(input);
        let options = GenerateOptions::default().with_preserve_field_order(true);
        let output = BibTeXGenerator::bibtex().generate(&parsed.entries, &options);
        let year = output.find("year").unwrap();
        let title = output.find("title").unwrap();
        let author = output.find("author").unwrap();
        assert!(year < title && title < author);
    }

    #[test]
    fn test_generate_empty() {
        assert_eq!(
            BibTeXGenerator::bibtex().generate(&[], &GenerateOptions::default()),
            ""
        );
    }

    #[test]
    fn test_validate() {
        let input = "@article{a, title = {T}, title = {U}}\n@article{a, author = {X}, title = {Y}, journal = {J}, year = 1}\n@misc{b, title = {Open";
        let warnings = BibTeXParser::bibtex().validate(input);

        assert!(warnings
            .iter()
            .any(|w| w.category == WarningCategory::ParseError));
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("Duplicate cite key 'a'")));
        assert!(warnings
            .iter()
            .any(|w| w.field.as_deref() == Some("title") && w.message.contains("more than once")));
        assert!(warnings
            .iter()
            .any(|w| w.field.as_deref() == Some("author") && w.entry_id == "a"));
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("unbalanced braces")));
        assert!(BibTeXParser::bibtex().validate(ARTICLE).is_empty());
    }
}
