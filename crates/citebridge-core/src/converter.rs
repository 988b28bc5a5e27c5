//! Converter hub
//!
//! Every conversion goes source text -> canonical entries -> target text.
//! Parsers and generators are registered per [`Format`] as trait objects.

use std::collections::BTreeMap;

use citebridge_domain::{ConversionResult, Entry, Format, Warning};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::config::{ConverterConfig, GenerateOptions};
use crate::error::{Error, Result};
use crate::formats::{
    BibTeXGenerator, BibTeXParser, CslJsonGenerator, CslJsonParser, EndNoteGenerator,
    EndNoteParser, FormatGenerator, FormatParser, RisGenerator, RisParser,
};
use crate::type_map::resolve_entry_type;

lazy_static! {
    static ref BIBTEX_ENTRY: Regex = Regex::new(r"@(\w+)\s*\{").unwrap();
    static ref RIS_TYPE_LINE: Regex = Regex::new(r"(?m)^TY\s+-\s+").unwrap();
}

/// Entry types that only BibLaTeX defines
const BIBLATEX_ONLY_TYPES: &[&str] = &["dataset", "software", "online", "patent"];

/// Hub dispatching to one parser and one generator per format
pub struct Converter {
    parsers: BTreeMap<Format, Box<dyn FormatParser>>,
    generators: BTreeMap<Format, Box<dyn FormatGenerator>>,
    config: ConverterConfig,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter {
    /// A converter with every built-in format registered
    pub fn new() -> Self {
        Self {
            parsers: BTreeMap::new(),
            generators: BTreeMap::new(),
            config: ConverterConfig::default(),
        }
        .with_parser(Format::BibTeX, BibTeXParser::bibtex())
        .with_parser(Format::BibLaTeX, BibTeXParser::biblatex())
        .with_parser(Format::CslJson, CslJsonParser::new())
        .with_parser(Format::Ris, RisParser::new())
        .with_parser(Format::EndNote, EndNoteParser::new())
        .with_generator(Format::BibTeX, BibTeXGenerator::bibtex())
        .with_generator(Format::BibLaTeX, BibTeXGenerator::biblatex())
        .with_generator(Format::CslJson, CslJsonGenerator::new())
        .with_generator(Format::Ris, RisGenerator::new())
        .with_generator(Format::EndNote, EndNoteGenerator::new())
    }

    /// Builder method to set the configuration used when options are omitted
    pub fn with_config(mut self, config: ConverterConfig) -> Self {
        self.config = config;
        self
    }

    /// Builder method to register (or replace) the parser for a format
    pub fn with_parser(mut self, format: Format, parser: impl FormatParser + 'static) -> Self {
        self.parsers.insert(format, Box::new(parser));
        self
    }

    /// Builder method to register (or replace) the generator for a format
    pub fn with_generator(
        mut self,
        format: Format,
        generator: impl FormatGenerator + 'static,
    ) -> Self {
        self.generators.insert(format, Box::new(generator));
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    fn parser(&self, name: &str) -> Result<&dyn FormatParser> {
        Format::from_name(name)
            .and_then(|format| self.parsers.get(&format))
            .map(|parser| parser.as_ref())
            .ok_or_else(|| Error::UnsupportedSourceFormat(name.to_string()))
    }

    fn generator(&self, name: &str) -> Result<(Format, &dyn FormatGenerator)> {
        Format::from_name(name)
            .and_then(|format| {
                self.generators
                    .get(&format)
                    .map(|generator| (format, generator.as_ref()))
            })
            .ok_or_else(|| Error::UnsupportedTargetFormat(name.to_string()))
    }

    /// Parse `content` written in the format named `format`
    pub fn parse(&self, content: &str, format: &str) -> Result<ConversionResult> {
        let parser = self.parser(format)?;
        Ok(parser.parse(content))
    }

    /// Write `entries` in the format named `format`.
    ///
    /// Without explicit options, the configured options for the format apply.
    pub fn generate(
        &self,
        entries: &[Entry],
        format: &str,
        options: Option<&GenerateOptions>,
    ) -> Result<String> {
        let (target, generator) = self.generator(format)?;
        let output = match options {
            Some(options) => generator.generate(entries, options),
            None => generator.generate(entries, &self.config.options_for(target)),
        };
        Ok(output)
    }

    /// Like [`Converter::generate`], also returning encoding-loss warnings
    pub fn generate_with_warnings(
        &self,
        entries: &[Entry],
        format: &str,
        options: Option<&GenerateOptions>,
    ) -> Result<(String, Vec<Warning>)> {
        let (target, generator) = self.generator(format)?;
        let generated = match options {
            Some(options) => generator.generate_with_warnings(entries, options),
            None => generator.generate_with_warnings(entries, &self.config.options_for(target)),
        };
        Ok(generated)
    }

    /// Parse `content` as `from` and write the entries as `to`
    pub fn convert(
        &self,
        content: &str,
        from: &str,
        to: &str,
        options: Option<&GenerateOptions>,
    ) -> Result<String> {
        self.convert_with_warnings(content, from, to, options)
            .map(|(output, _)| output)
    }

    /// Like [`Converter::convert`], also returning the parse warnings, a
    /// `type-downgrade` warning for every entry whose type the target cannot
    /// express exactly, and the generator's `encoding-loss` warnings.
    pub fn convert_with_warnings(
        &self,
        content: &str,
        from: &str,
        to: &str,
        options: Option<&GenerateOptions>,
    ) -> Result<(String, Vec<Warning>)> {
        let parser = self.parser(from)?;
        let (target, _) = self.generator(to)?;

        let result = parser.parse(content);
        let (output, encoding) = self.generate_with_warnings(&result.entries, to, options)?;

        let mut warnings = result.warnings;
        for entry in &result.entries {
            let mapping = resolve_entry_type(entry, target);
            if mapping.lossy {
                warnings.push(
                    Warning::type_downgrade(
                        entry.id.as_str(),
                        format!(
                            "Type '{}' has no exact {} counterpart; written as '{}'",
                            entry.item_type, target, mapping.name
                        ),
                    )
                    .with_field("type"),
                );
            }
        }
        warnings.extend(encoding);

        tracing::debug!(
            "Converted {} -> {}: {} entries, {} warnings",
            from,
            to,
            result.entries.len(),
            warnings.len()
        );
        Ok((output, warnings))
    }

    /// Check `content` without converting it
    pub fn validate(&self, content: &str, format: &str) -> Result<Vec<Warning>> {
        let parser = self.parser(format)?;
        Ok(parser.validate(content))
    }

    /// Names of the formats that can be both parsed and generated
    pub fn supported_formats(&self) -> Vec<&'static str> {
        Format::ALL
            .iter()
            .filter(|format| self.parsers.contains_key(format) && self.generators.contains_key(format))
            .map(|format| format.name())
            .collect()
    }

    /// Best-effort guess of the format of `content`
    pub fn detect_format(&self, content: &str) -> Option<Format> {
        detect_format(content)
    }
}

/// Guess the format of `content` from its shape.
///
/// Rules are tried in order: CSL-JSON, BibTeX family, RIS, EndNote XML.
pub fn detect_format(content: &str) -> Option<Format> {
    let trimmed = content.trim_start_matches('\u{feff}').trim();

    if trimmed.starts_with('[') || (trimmed.starts_with('{') && trimmed.contains("\"type\"")) {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            let first = match &value {
                Value::Array(items) => items.first(),
                object @ Value::Object(_) => Some(object),
                _ => None,
            };
            let is_item = first
                .and_then(Value::as_object)
                .is_some_and(|item| item.contains_key("id") && item.contains_key("type"));
            if is_item {
                return Some(Format::CslJson);
            }
        }
    }

    if BIBTEX_ENTRY.is_match(trimmed) {
        // The first entry decides; @string, @preamble and @comment are not entries
        let first_kind = BIBTEX_ENTRY
            .captures_iter(trimmed)
            .map(|caps| caps[1].to_lowercase())
            .find(|kind| !matches!(kind.as_str(), "string" | "preamble" | "comment"));
        let biblatex = first_kind.is_some_and(|kind| BIBLATEX_ONLY_TYPES.contains(&kind.as_str()));
        return Some(if biblatex {
            Format::BibLaTeX
        } else {
            Format::BibTeX
        });
    }

    if RIS_TYPE_LINE.is_match(trimmed) {
        return Some(Format::Ris);
    }

    if trimmed.starts_with("<?xml") && trimmed.contains("<record>") {
        return Some(Format::EndNote);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LineEnding, OptionOverrides};
    use citebridge_domain::{ItemType, WarningCategory};
    use rstest::rstest;

    const ARTICLE: &str = "@article{einstein1905,
  author = {Einstein, Albert},
  title = {Zur Elektrodynamik bewegter K{\\\"o}rper},
  journal = {Annalen der Physik},
  year = {1905},
  volume = {17},
  pages = {891--921}
}";

    #[rstest]
    #[case("@article{x, title={T}}", Some(Format::BibTeX))]
    #[case("@Article {x, title={T}}", Some(Format::BibTeX))]
    #[case("@dataset{x, title={T}}", Some(Format::BibLaTeX))]
    #[case("@book{a, title={A}}\n\n@Online{b, url={u}}", Some(Format::BibTeX))]
    #[case("@article{a, title={x}}\n@online{b, url={u}}", Some(Format::BibTeX))]
    #[case("@Online{b, url={u}}\n\n@book{a, title={A}}", Some(Format::BibLaTeX))]
    #[case("@string{pr = \"Phys. Rev.\"}\n@software{s, title={S}}", Some(Format::BibLaTeX))]
    #[case("TY  - JOUR\nER  - \n", Some(Format::Ris))]
    #[case("\nTY - BOOK\nTI - x\nER - ", Some(Format::Ris))]
    #[case("[{\"id\":\"x\",\"type\":\"article\"}]", Some(Format::CslJson))]
    #[case("{\"id\": \"x\", \"type\": \"book\"}", Some(Format::CslJson))]
    #[case("<?xml version=\"1.0\"?><xml><records><record></record></records></xml>", Some(Format::EndNote))]
    #[case("just random text", None)]
    #[case("[1, 2, 3]", None)]
    #[case("", None)]
    fn test_detect_format(#[case] content: &str, #[case] expected: Option<Format>) {
        assert_eq!(detect_format(content), expected);
    }

    #[test]
    fn test_unsupported_formats() {
        let converter = Converter::new();
        assert!(matches!(
            converter.parse("", "marc"),
            Err(Error::UnsupportedSourceFormat(name)) if name == "marc"
        ));
        assert!(matches!(
            converter.generate(&[], "BibTeX", None),
            Err(Error::UnsupportedTargetFormat(_))
        ));
        assert!(matches!(
            converter.convert("", "bibtex", "docx", None),
            Err(Error::UnsupportedTargetFormat(_))
        ));
        assert!(matches!(
            converter.validate("", "nope"),
            Err(Error::UnsupportedSourceFormat(_))
        ));
    }

    #[test]
    fn test_supported_formats() {
        assert_eq!(
            Converter::new().supported_formats(),
            vec!["bibtex", "biblatex", "csl-json", "ris", "endnote"]
        );
    }

    #[test]
    fn test_convert_bibtex_to_ris() {
        let output = Converter::new()
            .convert(ARTICLE, "bibtex", "ris", None)
            .unwrap();
        assert!(output.starts_with("TY  - JOUR\nAU  - Einstein, Albert\n"));
        assert!(output.contains("TI  - Zur Elektrodynamik bewegter Körper\n"));
        assert!(output.contains("SP  - 891\nEP  - 921\n"));
        assert!(output.ends_with("ER  - \n"));
    }

    #[test]
    fn test_convert_with_warnings_reports_lossy_types() {
        let content = r#"[{"id": "d1", "type": "dataset", "title": "Data"}]"#;
        let (output, warnings) = Converter::new()
            .convert_with_warnings(content, "csl-json", "bibtex", None)
            .unwrap();
        assert!(output.starts_with("@misc{d1,"));
        assert!(warnings
            .iter()
            .any(|w| w.entry_id == "d1" && w.category == WarningCategory::TypeDowngrade));

        let (_, warnings) = Converter::new()
            .convert_with_warnings(content, "csl-json", "biblatex", None)
            .unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_convert_with_warnings_reports_encoding_loss() {
        let content = r#"[{"id": "k", "type": "book", "title": "日本語の本"}]"#;
        let (output, warnings) = Converter::new()
            .convert_with_warnings(content, "csl-json", "bibtex", None)
            .unwrap();
        assert!(output.contains("title = {日本語の本}"));
        assert!(warnings.iter().any(|w| w.entry_id == "k"
            && w.category == WarningCategory::EncodingLoss
            && w.field.as_deref() == Some("title")));

        // Unicode targets carry the title unchanged
        let (_, warnings) = Converter::new()
            .convert_with_warnings(content, "csl-json", "ris", None)
            .unwrap();
        assert!(warnings
            .iter()
            .all(|w| w.category != WarningCategory::EncodingLoss));
    }

    #[test]
    fn test_configured_options_apply_when_omitted() {
        let config = ConverterConfig::new().with_format(
            Format::Ris,
            OptionOverrides {
                line_ending: Some(LineEnding::CrLf),
                ..Default::default()
            },
        );
        let converter = Converter::new().with_config(config);
        let entries = vec![Entry::new("a", ItemType::Book)];

        let ris = converter.generate(&entries, "ris", None).unwrap();
        assert_eq!(ris, "TY  - BOOK\r\nER  - \r\n");

        let explicit = converter
            .generate(&entries, "ris", Some(&GenerateOptions::default()))
            .unwrap();
        assert_eq!(explicit, "TY  - BOOK\nER  - \n");
    }

    struct UpperCaseTitles;

    impl FormatGenerator for UpperCaseTitles {
        fn generate(&self, entries: &[Entry], _options: &GenerateOptions) -> String {
            entries
                .iter()
                .filter_map(|e| e.title.as_deref())
                .map(str::to_uppercase)
                .collect::<Vec<_>>()
                .join("\n")
        }
    }

    #[test]
    fn test_injected_generator() {
        let converter = Converter::new().with_generator(Format::Ris, UpperCaseTitles);
        let output = converter.convert(ARTICLE, "bibtex", "ris", None).unwrap();
        assert_eq!(output, "ZUR ELEKTRODYNAMIK BEWEGTER KÖRPER");
    }

    #[test]
    fn test_validate_delegates() {
        let warnings = Converter::new()
            .validate("@article{x, title = {Open}", "bibtex")
            .unwrap();
        assert!(!warnings.is_empty());
        assert!(Converter::new().validate("[]", "csl-json").unwrap().is_empty());
    }
}
