//! BibTeX writer
//!
//! Turns [`BibRecord`]s back into `@type{key, ...}` blocks. Values are written
//! as given, so callers escape them first (see [`crate::escape_latex`]).

use crate::record::{BibRecord, ValueStyle};

/// Layout of written blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStyle {
    /// Prefix of each field line
    pub indent: String,
    pub line_ending: String,
}

impl Default for WriteStyle {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            line_ending: "\n".to_string(),
        }
    }
}

/// Write one record
pub fn write_record(record: &BibRecord, style: &WriteStyle) -> String {
    let nl = style.line_ending.as_str();
    let mut out = String::new();

    out.push('@');
    out.push_str(&record.kind);
    out.push('{');
    out.push_str(&record.key);
    out.push(',');
    out.push_str(nl);

    for field in &record.fields {
        out.push_str(&style.indent);
        out.push_str(&field.name);
        out.push_str(" = ");
        match field.style {
            ValueStyle::Bare => out.push_str(&field.value),
            ValueStyle::Delimited => {
                out.push('{');
                out.push_str(&field.value);
                out.push('}');
            }
        }
        out.push(',');
        out.push_str(nl);
    }

    out.push('}');
    out
}

/// Write records separated by a blank line
pub fn write_records(records: &[BibRecord], style: &WriteStyle) -> String {
    let separator = style.line_ending.repeat(2);
    records
        .iter()
        .map(|record| write_record(record, style))
        .collect::<Vec<_>>()
        .join(&separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_simple_record() {
        let mut record = BibRecord::new("article", "Smith2024");
        record.push("author", "Smith, John");
        record.push("title", "A Great Paper");
        record.push_styled("month", "mar", ValueStyle::Bare);

        let written = write_record(&record, &WriteStyle::default());
        assert_eq!(
            written,
            "@article{Smith2024,\n  author = {Smith, John},\n  title = {A Great Paper},\n  month = mar,\n}"
        );
    }

    #[test]
    fn test_write_with_custom_layout() {
        let mut record = BibRecord::new("misc", "x");
        record.push("note", "n");
        let style = WriteStyle {
            indent: "\t".to_string(),
            line_ending: "\r\n".to_string(),
        };
        assert_eq!(write_record(&record, &style), "@misc{x,\r\n\tnote = {n},\r\n}");
    }

    #[test]
    fn test_records_separated_by_blank_line() {
        let records = vec![BibRecord::new("misc", "a"), BibRecord::new("misc", "b")];
        assert_eq!(
            write_records(&records, &WriteStyle::default()),
            "@misc{a,\n}\n\n@misc{b,\n}"
        );
    }

    #[test]
    fn test_written_record_parses_back() {
        let mut record = BibRecord::new("book", "Knuth1984");
        record.push("title", "The {\\TeX}book");
        record.push_styled("year", "1984", ValueStyle::Bare);

        let parsed = crate::parse_record(&write_record(&record, &WriteStyle::default())).unwrap();
        assert_eq!(parsed.fields, record.fields);
    }
}
