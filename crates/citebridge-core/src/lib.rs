//! citebridge-core: hub-and-spoke bibliography conversion
//!
//! This crate provides:
//! - Type and field mapping tables between the canonical model and each format
//! - Parsers and generators for BibTeX, BibLaTeX, RIS, EndNote XML and CSL-JSON
//! - The [`Converter`] hub with format detection
//! - CRUD operations over canonical entries
//! - Generator options and TOML converter configuration
//!
//! ```ignore
//! use citebridge_core::Converter;
//!
//! let converter = Converter::new();
//! let ris = converter.convert(bibtex_text, "bibtex", "ris", None)?;
//! ```

pub mod config;
pub mod converter;
pub mod crud;
pub mod error;
pub mod field_map;
pub mod formats;
pub mod type_map;

pub use config::{ConverterConfig, GenerateOptions, LineEnding, OptionOverrides};
pub use converter::{detect_format, Converter};
pub use crud::{
    create_entry, delete_entries, filter_entries, merge_entries, sort_entries, update_entry,
    DedupeKey, FilterCriteria, SortKey,
};
pub use error::{Error, Result};
pub use field_map::{field_for_tag, get_tag, Transform};
pub use formats::{FormatGenerator, FormatParser};
pub use type_map::{map_type_from_format, map_type_to_format, TypeMapping};

// The canonical model, so callers need only this crate
pub use citebridge_domain::{
    ConversionResult, ConversionStats, DateSpec, Entry, Format, FormatMetadata, ItemType, Person,
    Severity, Warning, WarningCategory,
};
