//! Generation options and converter configuration
//!
//! [`GenerateOptions`] controls how generators lay out their output.
//! [`ConverterConfig`] holds default options plus per-format overrides and
//! loads from TOML:
//!
//! ```toml
//! [defaults]
//! indent = "    "
//! sort = true
//!
//! [formats.ris]
//! line-ending = "crlf"
//! ```

use std::collections::BTreeMap;

use citebridge_domain::{Entry, Format};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Line terminator used by generators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEnding {
    #[default]
    #[serde(rename = "lf", alias = "\n")]
    Lf,
    #[serde(rename = "crlf", alias = "\r\n")]
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// Options shared by every generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GenerateOptions {
    /// Indentation unit (BibTeX field lines, JSON nesting, XML nesting)
    pub indent: String,
    pub line_ending: LineEnding,
    /// Sort entries by id before emission
    pub sort: bool,
    /// Emit fields in the order the source listed them when known
    pub preserve_field_order: bool,
    /// Emit preserved custom fields when the source format family matches
    pub include_metadata: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            line_ending: LineEnding::Lf,
            sort: false,
            preserve_field_order: false,
            include_metadata: false,
        }
    }
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the indentation unit
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    /// Builder method to set the line ending
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Builder method to sort entries by id
    pub fn with_sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_preserve_field_order(mut self, preserve: bool) -> Self {
        self.preserve_field_order = preserve;
        self
    }

    pub fn with_include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    /// Load options from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self> {
        Ok(serde_json::from_str(json_str)?)
    }

    /// The line terminator as text
    pub fn newline(&self) -> &'static str {
        self.line_ending.as_str()
    }

    /// Entries in emission order: a sorted copy when `sort` is set
    pub(crate) fn ordered<'a>(&self, entries: &'a [Entry]) -> Vec<&'a Entry> {
        let mut ordered: Vec<&Entry> = entries.iter().collect();
        if self.sort {
            ordered.sort_by(|a, b| a.id.cmp(&b.id));
        }
        ordered
    }
}

/// A partial set of options overriding the defaults for one format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OptionOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_ending: Option<LineEnding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_field_order: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_metadata: Option<bool>,
}

impl OptionOverrides {
    /// Overlay the set values onto `base`
    pub fn apply(&self, base: &GenerateOptions) -> GenerateOptions {
        GenerateOptions {
            indent: self.indent.clone().unwrap_or_else(|| base.indent.clone()),
            line_ending: self.line_ending.unwrap_or(base.line_ending),
            sort: self.sort.unwrap_or(base.sort),
            preserve_field_order: self
                .preserve_field_order
                .unwrap_or(base.preserve_field_order),
            include_metadata: self.include_metadata.unwrap_or(base.include_metadata),
        }
    }
}

/// Converter configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Options used for every format unless overridden
    pub defaults: GenerateOptions,
    /// Per-format overrides keyed by format name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub formats: BTreeMap<String, OptionOverrides>,
}

impl ConverterConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Builder method to override options for one format
    pub fn with_format(mut self, format: Format, overrides: OptionOverrides) -> Self {
        self.formats.insert(format.name().to_string(), overrides);
        self
    }

    /// Check that every override names a supported format
    pub fn validate(&self) -> Result<()> {
        for name in self.formats.keys() {
            if Format::from_name(name).is_none() {
                return Err(Error::Config(format!(
                    "unknown format '{}' in [formats]",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Effective options for a format
    pub fn options_for(&self, format: Format) -> GenerateOptions {
        match self.formats.get(format.name()) {
            Some(overrides) => overrides.apply(&self.defaults),
            None => self.defaults.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = GenerateOptions::default();
        assert_eq!(options.indent, "  ");
        assert_eq!(options.newline(), "\n");
        assert!(!options.sort);
        assert!(!options.preserve_field_order);
        assert!(!options.include_metadata);
    }

    #[test]
    fn test_options_from_json() {
        let options =
            GenerateOptions::from_json(r#"{"indent": "\t", "line-ending": "\r\n", "sort": true}"#)
                .unwrap();
        assert_eq!(options.indent, "\t");
        assert_eq!(options.line_ending, LineEnding::CrLf);
        assert!(options.sort);

        let options = GenerateOptions::from_json(r#"{"line-ending": "lf"}"#).unwrap();
        assert_eq!(options.line_ending, LineEnding::Lf);
    }

    #[test]
    fn test_config_from_toml() {
        let config = ConverterConfig::from_toml(
            r#"
[defaults]
indent = "    "
sort = true

[formats.ris]
line-ending = "crlf"

[formats.bibtex]
sort = false
"#,
        )
        .unwrap();

        let ris = config.options_for(Format::Ris);
        assert_eq!(ris.indent, "    ");
        assert_eq!(ris.line_ending, LineEnding::CrLf);
        assert!(ris.sort);

        let bibtex = config.options_for(Format::BibTeX);
        assert!(!bibtex.sort);
        assert_eq!(bibtex.line_ending, LineEnding::Lf);

        assert_eq!(config.options_for(Format::CslJson), config.defaults);
    }

    #[test]
    fn test_unknown_format_is_config_error() {
        let err = ConverterConfig::from_toml("[formats.marc]\nsort = true\n").unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("marc")));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = ConverterConfig::from_toml("[defaults\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ConverterConfig::new().with_format(
            Format::EndNote,
            OptionOverrides {
                indent: Some("\t".into()),
                ..Default::default()
            },
        );
        let text = config.to_toml().unwrap();
        assert_eq!(ConverterConfig::from_toml(&text).unwrap(), config);
    }
}
