//! Canonical bibliographic model shared by every citebridge format
//!
//! This crate provides the intermediate representation all conversions pass
//! through:
//! - Entry: one bibliographic item, shaped after CSL-JSON
//! - Person: a structured contributor name, plus the name engine
//! - DateSpec: structured dates, plus the date engine
//! - Warning / ConversionResult: per-record diagnostics of a parse
//! - Format: the closed set of supported textual formats

pub mod cite_key;
pub mod date;
pub mod entry;
pub mod error;
pub mod format;
pub mod person;
pub mod warning;

pub use cite_key::{derive_entry_id, generate_cite_key, make_cite_key_unique};
pub use date::{
    month_from_name, month_macro, parse_date, parse_split_date, to_iso, to_ris_slash,
    to_split_fields, DateParts, DateSpec, SplitDate,
};
pub use entry::{Entry, FormatMetadata, ItemType};
pub use error::DomainError;
pub use format::Format;
pub use person::{parse_name, parse_names, serialize_name, serialize_names, NameStyle, Person};
pub use warning::{ConversionResult, ConversionStats, Severity, Warning, WarningCategory};
