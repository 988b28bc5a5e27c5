//! CSL-JSON
//!
//! The canonical model is CSL-shaped, so this is mostly serde. The parser
//! accepts an array of items or a single item object.

use std::collections::BTreeMap;

use citebridge_domain::{
    ConversionResult, Entry, Format, FormatMetadata, ItemType, Severity, Warning, WarningCategory,
};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Serializer, Value};

use super::{emit_entry, FormatGenerator, FormatParser, IdRegistry};
use crate::config::{GenerateOptions, LineEnding};

/// Items of a CSL-JSON document, or a description of why there are none
fn document_items(content: &str) -> Result<Vec<Value>, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(object @ Value::Object(_)) => Ok(vec![object]),
        Ok(_) => Err("Expected an array of items or a single item object".to_string()),
        Err(e) => Err(format!("Invalid JSON: {}", e)),
    }
}

/// `id` as a string, when it is a non-empty string or a number
fn item_id(map: &Map<String, Value>) -> Option<String> {
    match map.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether a `date-parts` value holds one or two lists of one to three parts
fn valid_date_parts(value: &Value) -> bool {
    match value {
        Value::Array(lists) if (1..=2).contains(&lists.len()) => lists.iter().all(|list| {
            matches!(list, Value::Array(parts) if (1..=3).contains(&parts.len()))
        }),
        _ => false,
    }
}

/// Parser for CSL-JSON documents
#[derive(Debug, Clone, Copy, Default)]
pub struct CslJsonParser;

impl CslJsonParser {
    pub fn new() -> Self {
        Self
    }

    fn object_to_entry(
        &self,
        mut map: Map<String, Value>,
    ) -> Result<(Entry, Vec<Warning>), Warning> {
        let mut warnings = Vec::new();
        let id = item_id(&map).unwrap_or_default();

        if id.is_empty() && map.remove("id").is_some_and(|v| !v.is_null()) {
            warnings.push(Warning::validation(
                "",
                "id",
                "Item id is not a string or number; ignored",
            ));
        }
        map.insert("id".to_string(), Value::String(id.clone()));

        let original_type = map.get("type").and_then(Value::as_str).map(str::to_string);
        match original_type.as_deref() {
            Some(name) if ItemType::from_csl(name).is_some() => {}
            Some(name) => {
                warnings.push(
                    Warning::type_downgrade(
                        id.clone(),
                        format!("Unknown CSL type '{}' read as document", name),
                    )
                    .with_field("type"),
                );
                map.insert("type".to_string(), Value::from(ItemType::Document.as_str()));
            }
            None => {
                warnings.push(Warning::validation(
                    id.clone(),
                    "type",
                    "Item has no valid type; read as document",
                ));
                map.insert("type".to_string(), Value::from(ItemType::Document.as_str()));
            }
        }

        map.remove("_metadata");
        let mut metadata = FormatMetadata::from_source(Format::CslJson);
        metadata.original_type = original_type;

        let unknown: Vec<String> = map
            .keys()
            .filter(|k| !Entry::is_known_key(k))
            .cloned()
            .collect();
        for key in unknown {
            if let Some(value) = map.remove(&key) {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                metadata.custom_fields.insert(key.clone(), text);
                warnings.push(
                    Warning::new(
                        id.clone(),
                        Severity::Info,
                        WarningCategory::FieldLoss,
                        format!("Key '{}' is not a CSL variable; kept as custom", key),
                    )
                    .with_field(key),
                );
            }
        }

        let mut entry = Entry::from_json_map(map)
            .map_err(|e| Warning::parse_error(id.clone(), format!("Invalid item: {}", e)))?;
        entry.metadata = Some(metadata);
        Ok((entry, warnings))
    }
}

impl FormatParser for CslJsonParser {
    fn parse(&self, content: &str) -> ConversionResult {
        let mut result = ConversionResult::new();
        let items = match document_items(content) {
            Ok(items) => items,
            Err(message) => {
                tracing::warn!("CSL-JSON document rejected: {}", message);
                result.push_failure(Warning::parse_error("", message));
                return result;
            }
        };

        let mut ids = IdRegistry::default();
        for (index, item) in items.into_iter().enumerate() {
            let Value::Object(map) = item else {
                tracing::warn!("CSL-JSON item {} is not an object", index + 1);
                result.push_failure(Warning::parse_error(
                    "",
                    format!("Item {} is not an object", index + 1),
                ));
                continue;
            };

            match self.object_to_entry(map) {
                Ok((mut entry, mut warnings)) => {
                    if let Some(warning) = ids.assign(&mut entry, "id") {
                        warnings.insert(0, warning);
                    }
                    for warning in warnings.iter_mut() {
                        if warning.entry_id.is_empty() {
                            warning.entry_id = entry.id.clone();
                        }
                    }
                    emit_entry(&mut result, entry, warnings);
                }
                Err(warning) => {
                    tracing::warn!("CSL-JSON item {} failed: {}", index + 1, warning.message);
                    result.push_failure(warning);
                }
            }
        }

        tracing::debug!(
            "Parsed csl-json document: {} entries, {} failed",
            result.stats.successful,
            result.stats.failed
        );
        result
    }

    fn validate(&self, content: &str) -> Vec<Warning> {
        let items = match document_items(content) {
            Ok(items) => items,
            Err(message) => {
                return vec![Warning::new(
                    "",
                    Severity::Error,
                    WarningCategory::ValidationError,
                    message,
                )]
            }
        };

        let mut warnings = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let Some(map) = item.as_object() else {
                warnings.push(Warning::new(
                    "",
                    Severity::Error,
                    WarningCategory::ValidationError,
                    format!("Item {} is not an object", index + 1),
                ));
                continue;
            };

            let id = item_id(map).unwrap_or_else(|| format!("#{}", index + 1));
            if item_id(map).is_none() {
                warnings.push(Warning::validation(id.clone(), "id", "Item has no id"));
            }
            match map.get("type").and_then(Value::as_str) {
                None => warnings.push(Warning::validation(id.clone(), "type", "Item has no type")),
                Some(name) if ItemType::from_csl(name).is_none() => {
                    warnings.push(Warning::validation(
                        id.clone(),
                        "type",
                        format!("Unknown type '{}'", name),
                    ))
                }
                Some(_) => {}
            }

            for field in Entry::DATE_FIELDS {
                let parts = map
                    .get(*field)
                    .and_then(Value::as_object)
                    .and_then(|date| date.get("date-parts"));
                if let Some(parts) = parts {
                    if !valid_date_parts(parts) {
                        warnings.push(Warning::validation(
                            id.clone(),
                            *field,
                            "date-parts must hold one or two lists of one to three parts",
                        ));
                    }
                }
            }
        }
        warnings
    }
}

/// One output item: the entry's CSL variables, then any preserved custom keys
#[derive(Serialize)]
struct Item<'a> {
    #[serde(flatten)]
    entry: Entry,
    #[serde(flatten)]
    custom: BTreeMap<&'a str, &'a str>,
}

/// Generator for CSL-JSON documents
#[derive(Debug, Clone, Copy, Default)]
pub struct CslJsonGenerator;

impl CslJsonGenerator {
    pub fn new() -> Self {
        Self
    }

    fn item<'a>(&self, entry: &'a Entry, options: &GenerateOptions) -> Item<'a> {
        let mut custom = BTreeMap::new();
        if options.include_metadata {
            if let Some(metadata) = entry
                .metadata
                .as_ref()
                .filter(|m| m.source_format == Some(Format::CslJson))
            {
                for (key, value) in &metadata.custom_fields {
                    if !Entry::is_known_key(key) {
                        custom.insert(key.as_str(), value.as_str());
                    }
                }
            }
        }
        Item {
            entry: entry.without_metadata(),
            custom,
        }
    }
}

impl FormatGenerator for CslJsonGenerator {
    fn generate(&self, entries: &[Entry], options: &GenerateOptions) -> String {
        let items: Vec<Item> = options
            .ordered(entries)
            .into_iter()
            .map(|entry| self.item(entry, options))
            .collect();
        if items.is_empty() {
            return "[]".to_string();
        }

        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(options.indent.as_bytes());
        let mut serializer = Serializer::with_formatter(&mut buf, formatter);
        if let Err(e) = items.serialize(&mut serializer) {
            tracing::warn!("CSL-JSON serialization failed: {}", e);
            return "[]".to_string();
        }

        let output = String::from_utf8_lossy(&buf).into_owned();
        tracing::debug!("Generated csl-json document: {} entries", items.len());
        match options.line_ending {
            LineEnding::Lf => output,
            LineEnding::CrLf => output.replace('\n', "\r\n"),
        }
    }
}
