//! Per-record diagnostics and parse results

use serde::{Deserialize, Serialize};

use crate::entry::Entry;

/// Severity of a warning
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What kind of degradation a warning describes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningCategory {
    TypeDowngrade,
    FieldLoss,
    EncodingLoss,
    ParseError,
    ValidationError,
}

/// A recoverable problem attached to one record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub entry_id: String,
    pub severity: Severity,
    pub category: WarningCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Warning {
    pub fn new(
        entry_id: impl Into<String>,
        severity: Severity,
        category: WarningCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            severity,
            category,
            message: message.into(),
            field: None,
        }
    }

    /// Builder method to name the field the warning is about
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// A record that could not be parsed at all
    pub fn parse_error(entry_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(entry_id, Severity::Error, WarningCategory::ParseError, message)
    }

    /// Data that is missing or malformed but does not prevent the entry
    pub fn validation(
        entry_id: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            entry_id,
            Severity::Warning,
            WarningCategory::ValidationError,
            message,
        )
        .with_field(field)
    }

    /// A format type that had no exact canonical counterpart
    pub fn type_downgrade(entry_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            entry_id,
            Severity::Warning,
            WarningCategory::TypeDowngrade,
            message,
        )
    }

    /// Characters a target format has no encoding for
    pub fn encoding_loss(
        entry_id: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(entry_id, Severity::Warning, WarningCategory::EncodingLoss, message)
            .with_field(field)
    }

    /// A value that could not be carried over verbatim
    pub fn field_loss(
        entry_id: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(entry_id, Severity::Warning, WarningCategory::FieldLoss, message)
            .with_field(field)
    }
}

/// Counters describing a parse
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStats {
    /// Records seen in the input
    pub total: usize,
    /// Records that produced an entry
    pub successful: usize,
    /// Produced entries carrying at least one warning
    pub with_warnings: usize,
    /// Records that produced no entry
    pub failed: usize,
}

/// Outcome of parsing one document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub entries: Vec<Entry>,
    pub warnings: Vec<Warning>,
    pub stats: ConversionStats,
}

impl ConversionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an emitted entry together with the warnings raised for it
    pub fn push_entry(&mut self, entry: Entry, warnings: Vec<Warning>) {
        self.stats.total += 1;
        self.stats.successful += 1;
        if !warnings.is_empty() {
            self.stats.with_warnings += 1;
        }
        self.warnings.extend(warnings);
        self.entries.push(entry);
    }

    /// Record a record that produced no entry
    pub fn push_failure(&mut self, warning: Warning) {
        self.stats.total += 1;
        self.stats.failed += 1;
        self.warnings.push(warning);
    }

    /// Record a document-level warning that belongs to no record
    pub fn push_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Whether any warning reached error severity
    pub fn has_errors(&self) -> bool {
        self.warnings.iter().any(|w| w.severity == Severity::Error)
    }
}
