//! Supported interchange formats

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A textual bibliography format understood by the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "bibtex")]
    BibTeX,
    #[serde(rename = "biblatex")]
    BibLaTeX,
    #[serde(rename = "csl-json")]
    CslJson,
    #[serde(rename = "ris")]
    Ris,
    #[serde(rename = "endnote")]
    EndNote,
}

impl Format {
    /// All formats, in the order they are reported to callers
    pub const ALL: [Format; 5] = [
        Format::BibTeX,
        Format::BibLaTeX,
        Format::CslJson,
        Format::Ris,
        Format::EndNote,
    ];

    /// Look up a format by its exact name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bibtex" => Some(Self::BibTeX),
            "biblatex" => Some(Self::BibLaTeX),
            "csl-json" => Some(Self::CslJson),
            "ris" => Some(Self::Ris),
            "endnote" => Some(Self::EndNote),
            _ => None,
        }
    }

    /// Canonical name of the format
    pub fn name(&self) -> &'static str {
        match self {
            Self::BibTeX => "bibtex",
            Self::BibLaTeX => "biblatex",
            Self::CslJson => "csl-json",
            Self::Ris => "ris",
            Self::EndNote => "endnote",
        }
    }

    /// Whether the format belongs to the BibTeX family
    pub fn is_bibtex_family(&self) -> bool {
        matches!(self, Self::BibTeX | Self::BibLaTeX)
    }

    /// Whether data written by `source` can be read back natively by `self`
    pub fn shares_family_with(&self, source: Format) -> bool {
        *self == source || (self.is_bibtex_family() && source.is_bibtex_family())
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| DomainError::UnknownFormat(s.to_string()))
    }
}
