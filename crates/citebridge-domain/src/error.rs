//! Domain error types

/// Errors raised while interpreting names in the canonical model
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("Unknown format: {0}")]
    UnknownFormat(String),
    #[error("Unknown item type: {0}")]
    UnknownItemType(String),
}
