//! BibTeX grammar implemented with nom
//!
//! Handles:
//! - `@string` macro definitions and macro references
//! - `#` concatenation
//! - `@preamble` and `@comment` blocks
//! - `%` line comments and free text between blocks
//! - braced, quoted and bare (number or macro) values
//! - `{...}` and `(...)` block delimiters
//! - per-block error recovery: a malformed block is reported and parsing
//!   resumes at the next line starting with `@`

use std::collections::HashMap;

use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0, one_of},
    IResult,
};

use crate::record::{BibRecord, ValueStyle};

/// Why a block could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unbalanced braces")]
    UnbalancedBraces,
    #[error("Missing '{{' or '(' after entry type")]
    MissingDelimiter,
    #[error("Invalid syntax")]
    InvalidSyntax,
    #[error("No entry found")]
    NoEntry,
}

/// A block that failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub error: ParseError,
    /// 1-based line of the `@` that started the block
    pub line: u32,
    /// Entry type token, when it could be read
    pub kind: Option<String>,
    /// Cite key, when it could be read
    pub key: Option<String>,
    /// Source text of the failed block
    pub snippet: String,
}

/// Everything found in a BibTeX document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutput {
    pub records: Vec<BibRecord>,
    pub preambles: Vec<String>,
    /// `@string` macros, keyed by lowercased name
    pub strings: HashMap<String, String>,
    /// One per block that produced nothing
    pub errors: Vec<SyntaxError>,
}

enum Block {
    Record(BibRecord),
    String(String, String),
    Preamble(String),
    Comment,
}

/// Parse a whole document. Never fails; malformed blocks land in `errors`.
pub fn parse(input: &str) -> ParseOutput {
    let mut output = ParseOutput::default();
    let mut remaining = input;
    let mut line = 1u32;

    loop {
        let skipped = skip_to_block(remaining);
        line += count_lines(&remaining[..skipped]);
        remaining = &remaining[skipped..];
        if remaining.is_empty() {
            break;
        }

        match parse_block(remaining, &output.strings) {
            Ok((rest, block)) => {
                let consumed = &remaining[..remaining.len() - rest.len()];
                match block {
                    Block::Record(mut record) => {
                        record.raw = consumed.trim().to_string();
                        record.line = line;
                        output.records.push(record);
                    }
                    Block::String(name, value) => {
                        output.strings.insert(name.to_lowercase(), value);
                    }
                    Block::Preamble(text) => output.preambles.push(text),
                    Block::Comment => {}
                }
                line += count_lines(consumed);
                remaining = rest;
            }
            Err(_) => {
                let end = next_block_start(remaining).unwrap_or(remaining.len());
                let chunk = &remaining[..end];
                output.errors.push(diagnose(chunk, line));
                line += count_lines(chunk);
                remaining = &remaining[end..];
            }
        }
    }

    output
}

/// Parse a single entry block
pub fn parse_record(input: &str) -> Result<BibRecord, ParseError> {
    let mut output = parse(input);
    if let Some(error) = output.errors.pop() {
        return Err(error.error);
    }
    if output.records.is_empty() {
        return Err(ParseError::NoEntry);
    }
    Ok(output.records.remove(0))
}

fn count_lines(text: &str) -> u32 {
    text.matches('\n').count() as u32
}

/// Length of whitespace, `%` comments and free text before the next `@`
fn skip_to_block(input: &str) -> usize {
    let mut pos = 0;
    let bytes = input.as_bytes();
    while pos < bytes.len() {
        match bytes[pos] {
            b'@' => break,
            b'%' => {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
            }
            _ => pos += 1,
        }
    }
    pos
}

/// Offset of the next line that starts (after indentation) with `@`
fn next_block_start(input: &str) -> Option<usize> {
    let mut offset = 0;
    for (i, line) in input.split_inclusive('\n').enumerate() {
        if i > 0 && line.trim_start().starts_with('@') {
            return Some(offset + (line.len() - line.trim_start().len()));
        }
        offset += line.len();
    }
    None
}

/// Describe a block the grammar rejected
fn diagnose(chunk: &str, line: u32) -> SyntaxError {
    let body = chunk.trim_start_matches('@').trim_start();
    let kind: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    let after_kind = body[kind.len()..].trim_start();

    let (error, key) = match after_kind.chars().next() {
        Some('{') | Some('(') => {
            let key: String = after_kind[1..]
                .trim_start()
                .chars()
                .take_while(|c| is_key_char(*c))
                .collect();
            let error = if brace_balance(chunk) != 0 {
                ParseError::UnbalancedBraces
            } else {
                ParseError::InvalidSyntax
            };
            (error, Some(key).filter(|k| !k.is_empty()))
        }
        _ => (ParseError::MissingDelimiter, None),
    };

    SyntaxError {
        error,
        line,
        kind: Some(kind.to_lowercase()).filter(|k| !k.is_empty()),
        key,
        snippet: chunk.trim_end().to_string(),
    }
}

/// Opening minus closing braces, ignoring backslash-escaped ones
pub fn brace_balance(text: &str) -> i64 {
    let mut balance = 0i64;
    let mut escaped = false;
    for c in text.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '{' => balance += 1,
            '}' => balance -= 1,
            _ => {}
        }
    }
    balance
}

fn is_key_char(c: char) -> bool {
    !c.is_whitespace() && !",{}()=\"#%".contains(c)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-:.+".contains(c)
}

fn closing(open: char) -> char {
    if open == '(' {
        ')'
    } else {
        '}'
    }
}

fn parse_block<'a>(input: &'a str, strings: &HashMap<String, String>) -> IResult<&'a str, Block> {
    let (rest, _) = char('@')(input)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, kind) = take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, open) = one_of("{(")(rest)?;
    let close = closing(open);

    match kind.to_lowercase().as_str() {
        "comment" => {
            let (rest, _) = skip_balanced(rest, open, close)?;
            Ok((rest, Block::Comment))
        }
        "string" => {
            let (rest, (name, value)) = parse_assignment(rest, strings)?;
            let (rest, _) = multispace0(rest)?;
            let (rest, _) = char(close)(rest)?;
            Ok((rest, Block::String(name.to_string(), value.0)))
        }
        "preamble" => {
            let (rest, _) = multispace0(rest)?;
            let (rest, (value, _)) = parse_value(rest, strings)?;
            let (rest, _) = multispace0(rest)?;
            let (rest, _) = char(close)(rest)?;
            Ok((rest, Block::Preamble(value)))
        }
        _ => {
            let (rest, record) = parse_record_body(rest, kind, close, strings)?;
            Ok((rest, Block::Record(record)))
        }
    }
}

/// Skip to the delimiter closing an already-open block
fn skip_balanced(input: &str, open: char, close: char) -> IResult<&str, &str> {
    let mut depth = 1;
    for (i, c) in input.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Ok((&input[i + c.len_utf8()..], &input[..i]));
            }
        }
    }
    Err(nom_error(input))
}

fn parse_record_body<'a>(
    input: &'a str,
    kind: &str,
    close: char,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, BibRecord> {
    let (after_open, _) = multispace0(input)?;
    let (rest, key) = take_while(is_key_char)(after_open)?;
    let (rest, _) = multispace0(rest)?;

    // `@misc{title = ...}`: no key, the first token is a field name
    let (key, mut rest) = if rest.starts_with('=') {
        ("", after_open)
    } else {
        (key, rest.strip_prefix(',').unwrap_or(rest))
    };

    let mut record = BibRecord::new(kind, key);
    loop {
        let (next, _) = multispace0(rest)?;
        if next.starts_with(close) {
            rest = next;
            break;
        }
        let (next, (name, (value, style))) = parse_assignment(next, strings)?;
        record.push_styled(name, value, style);
        let (next, _) = multispace0(next)?;
        rest = next.strip_prefix(',').unwrap_or(next);
        if rest.len() == next.len() && !rest.starts_with(close) {
            // Neither a separator nor the end of the block
            return Err(nom_error(rest));
        }
    }

    let (rest, _) = char(close)(rest)?;
    Ok((rest, record))
}

/// `name = value`
fn parse_assignment<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, (&'a str, (String, ValueStyle))> {
    let (rest, _) = multispace0(input)?;
    let (rest, name) = take_while1(is_name_char)(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('=')(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, value) = parse_value(rest, strings)?;
    Ok((rest, (name, value)))
}

/// One or more `#`-joined parts
fn parse_value<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, (String, ValueStyle)> {
    let mut parts: Vec<(String, ValueStyle)> = Vec::new();
    let mut remaining = input;

    loop {
        let (rest, _) = multispace0(remaining)?;
        let (rest, part) = if rest.starts_with('{') {
            let (rest, inner) = parse_braced(rest)?;
            (rest, (collapse_whitespace(inner), ValueStyle::Delimited))
        } else if rest.starts_with('"') {
            let (rest, inner) = parse_quoted(rest)?;
            (rest, (collapse_whitespace(inner), ValueStyle::Delimited))
        } else {
            let (rest, token) = take_while1(is_name_char)(rest)?;
            let resolved = match strings.get(&token.to_lowercase()) {
                Some(value) => (value.clone(), ValueStyle::Delimited),
                None => (token.to_string(), ValueStyle::Bare),
            };
            (rest, resolved)
        };
        parts.push(part);

        let (rest, _) = multispace0(rest)?;
        match rest.strip_prefix('#') {
            Some(next) => remaining = next,
            None => {
                // Only a lone bare token stays bare
                let style = match parts.as_slice() {
                    [(_, style)] => *style,
                    _ => ValueStyle::Delimited,
                };
                let value: String = parts.into_iter().map(|(text, _)| text).collect();
                return Ok((rest, (value.trim().to_string(), style)));
            }
        }
    }
}

/// `{...}` with nesting; returns the text inside the outer braces
fn parse_braced(input: &str) -> IResult<&str, &str> {
    let bytes = input.as_bytes();
    let mut depth = 0;
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[pos + 1..], &input[1..pos]));
                }
            }
            b'\\' => pos += 1,
            _ => {}
        }
        pos += 1;
    }
    Err(nom_error(input))
}

/// `"..."`; quotes inside braces do not terminate the value
fn parse_quoted(input: &str) -> IResult<&str, &str> {
    let mut depth = 0;
    let mut escaped = false;
    for (i, c) in input.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => depth -= 1,
            '"' if depth == 0 => return Ok((&input[i + 1..], &input[1..i])),
            _ => {}
        }
    }
    Err(nom_error(input))
}

/// Runs of whitespace (line breaks included) become one space
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn nom_error(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_entry() {
        let input = r#"
@article{Smith2024,
    author = {John Smith},
    title = {A Great Paper},
    year = 2024,
    journal = {Nature},
}
"#;
        let output = parse(input);
        assert_eq!(output.records.len(), 1);
        assert!(output.errors.is_empty());

        let record = &output.records[0];
        assert_eq!(record.key, "Smith2024");
        assert_eq!(record.kind, "article");
        assert_eq!(record.get("author"), Some("John Smith"));
        assert_eq!(record.get("year"), Some("2024"));
        assert_eq!(record.fields[2].style, ValueStyle::Bare);
        assert_eq!(record.line, 2);
        assert!(record.raw.starts_with("@article{Smith2024,"));
        assert!(record.raw.ends_with('}'));
    }

    #[test]
    fn test_parse_quoted_values() {
        let input = r#"@article{Test2024, author = "Jane Doe", title = "Testing {"}Quotes{"}"}"#;
        let record = parse_record(input).unwrap();
        assert_eq!(record.get("author"), Some("Jane Doe"));
        assert_eq!(record.get("title"), Some(r#"Testing {"}Quotes{"}"#));
    }

    #[test]
    fn test_parse_nested_braces_and_whitespace() {
        let input = "@book{B, title = {A {B}ook\n      about {LaTeX}}}";
        let record = parse_record(input).unwrap();
        assert_eq!(record.get("title"), Some("A {B}ook about {LaTeX}"));
    }

    #[test]
    fn test_string_macros_and_concatenation() {
        let input = r#"
@string{nat = "Nature"}
@STRING(pub = {Springer})
@article{Test2024,
    journal = nat # " Physics",
    publisher = pub,
    month = mar,
}
"#;
        let output = parse(input);
        assert_eq!(output.strings.get("nat"), Some(&"Nature".to_string()));
        let record = &output.records[0];
        assert_eq!(record.get("journal"), Some("Nature Physics"));
        assert_eq!(record.get("publisher"), Some("Springer"));
        assert_eq!(record.get("month"), Some("mar"));
        assert_eq!(record.fields[2].style, ValueStyle::Bare);
    }

    #[test]
    fn test_preamble_comment_and_line_comments() {
        let input = r#"
% a line comment with @ sign
@preamble{"\newcommand{\noop}[1]{}"}
@comment{ignored @article{fake, title={x}} }
Free text between entries.
@misc(Paren2024, title = {Parenthesized})
"#;
        let output = parse(input);
        assert_eq!(output.preambles.len(), 1);
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].key, "Paren2024");
        assert!(output.errors.is_empty());
    }

    #[test]
    fn test_missing_key() {
        let record = parse_record("@misc{title = {No Key}, year = 2001}").unwrap();
        assert_eq!(record.key, "");
        assert_eq!(record.get("title"), Some("No Key"));
    }

    #[test]
    fn test_recovers_after_malformed_entry() {
        let input = r#"@article{Broken2024,
    title = {Unclosed,
    year = 2024,

@book{Good2024,
    title = {Fine},
}
"#;
        let output = parse(input);
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].key, "Good2024");
        assert_eq!(output.records[0].line, 5);
        assert_eq!(output.errors.len(), 1);

        let error = &output.errors[0];
        assert_eq!(error.error, ParseError::UnbalancedBraces);
        assert_eq!(error.key.as_deref(), Some("Broken2024"));
        assert_eq!(error.kind.as_deref(), Some("article"));
        assert_eq!(error.line, 1);
    }

    #[test]
    fn test_missing_separator_is_an_error() {
        let output = parse("@article{A, title = {x} year = 2020}");
        assert!(output.records.is_empty());
        assert_eq!(output.errors[0].error, ParseError::InvalidSyntax);
    }

    #[test]
    fn test_parse_record_without_entry() {
        assert_eq!(parse_record("no entries here"), Err(ParseError::NoEntry));
    }

    #[test]
    fn test_brace_balance() {
        assert_eq!(brace_balance("{a {b}}"), 0);
        assert_eq!(brace_balance(r"{a \{ b}"), 0);
        assert_eq!(brace_balance("{{"), 2);
    }
}
