//! BibTeX/BibLaTeX grammar and LaTeX codec
//!
//! This crate works at the level of raw BibTeX syntax; it knows nothing about
//! the canonical entry model. It provides:
//! - a nom-based parser with `@string`, `@preamble`, `@comment` support and
//!   per-block error recovery
//! - LaTeX decoding to Unicode and escaping back
//! - a writer for `@type{key, field = {value}, ...}` blocks

mod latex;
pub mod parser;
mod record;
mod writer;

pub use latex::{decode_latex, escape_latex};
pub use parser::{brace_balance, parse, parse_record, ParseError, ParseOutput, SyntaxError};
pub use record::{BibField, BibRecord, ValueStyle};
pub use writer::{write_record, write_records, WriteStyle};
