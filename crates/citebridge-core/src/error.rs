//! Error types for the converter

use citebridge_domain::DomainError;
use thiserror::Error;

/// Hard failures of converter and CRUD calls.
///
/// Problems confined to one record are not errors; they are reported as
/// warnings in the `ConversionResult`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported source format: {0}")]
    UnsupportedSourceFormat(String),

    #[error("Unsupported target format: {0}")]
    UnsupportedTargetFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
