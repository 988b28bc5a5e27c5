//! Structured dates and the date engine
//!
//! [`parse_date`] turns the date strings found in the wild (ISO, RIS
//! `YYYY/MM/DD`, "15 March 2024", ranges, "circa 1850", seasons) into a
//! CSL-shaped [`DateSpec`]. The serializers turn a [`DateSpec`] back into
//! ISO, RIS slash or BibTeX split-field text.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Date components: `[year]`, `[year, month]` or `[year, month, day]`
pub type DateParts = Vec<i32>;

/// A date, a date range, or an unparsed date string
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DateSpec {
    /// One component list for a single date, two for a range
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "lenient_date_parts"
    )]
    pub date_parts: Vec<DateParts>,
    /// Original text, kept when it could not be parsed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(
        skip_serializing_if = "std::ops::Not::not",
        deserialize_with = "lenient_bool"
    )]
    pub circa: bool,
    /// Season code, "1" (spring) to "4" (winter)
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string"
    )]
    pub season: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
}

/// BibTeX-style separate date fields
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitDate {
    pub year: String,
    /// Three-letter month macro (`jan` … `dec`)
    pub month: String,
    /// Two-digit day
    pub day: String,
}

impl DateSpec {
    /// A single date from its components
    pub fn from_parts(parts: DateParts) -> Self {
        Self {
            date_parts: vec![parts],
            ..Default::default()
        }
    }

    pub fn from_range(start: DateParts, end: DateParts) -> Self {
        Self {
            date_parts: vec![start, end],
            ..Default::default()
        }
    }

    /// An unparsed date
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
            ..Default::default()
        }
    }

    /// Whether the date carries no information at all
    pub fn is_empty(&self) -> bool {
        self.date_parts.is_empty() && self.raw.is_none() && self.literal.is_none()
    }

    pub fn is_range(&self) -> bool {
        self.date_parts.len() > 1
    }

    /// Components of the (start) date
    pub fn start(&self) -> Option<&[i32]> {
        self.date_parts.first().map(Vec::as_slice)
    }

    pub fn year(&self) -> Option<i32> {
        self.start().and_then(|p| p.first().copied())
    }

    pub fn month(&self) -> Option<u32> {
        self.start()
            .and_then(|p| p.get(1).copied())
            .and_then(|m| u32::try_from(m).ok())
    }

    pub fn day(&self) -> Option<u32> {
        self.start()
            .and_then(|p| p.get(2).copied())
            .and_then(|d| u32::try_from(d).ok())
    }

    /// Text to fall back on when there are no components
    fn fallback_text(&self) -> String {
        self.raw
            .clone()
            .or_else(|| self.literal.clone())
            .unwrap_or_default()
    }
}

lazy_static! {
    static ref RIS_SLASH: Regex = Regex::new(r"^(\d{4})/(\d{1,2})(?:/(\d{1,2}))?$").unwrap();
    static ref ISO: Regex = Regex::new(r"^(\d{4})(?:-(\d{1,2}))?(?:-(\d{1,2}))?$").unwrap();
    static ref DAY_MONTH_YEAR: Regex =
        Regex::new(r"^(?:(\d{1,2})\.?\s+)?([A-Za-z]+)\.?,?\s+(\d{4})$").unwrap();
    static ref MONTH_DAY_YEAR: Regex =
        Regex::new(r"^([A-Za-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})$").unwrap();
    static ref BARE_YEAR: Regex = Regex::new(r"^\d{4}$").unwrap();
    static ref CIRCA: Regex = Regex::new(r"(?i)^(?:c\.|ca\.|circa|~)\s*(.+)$").unwrap();
    static ref SEASON: Regex =
        Regex::new(r"(?i)^(spring|summer|autumn|fall|winter)\s+(\d{4})$").unwrap();
}

const MONTH_MACROS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Month number for a full or three-letter month name (any case)
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim().trim_end_matches('.').to_lowercase();
    if lower == "sept" {
        return Some(9);
    }
    MONTH_MACROS
        .iter()
        .position(|m| *m == lower)
        .or_else(|| MONTH_NAMES.iter().position(|m| *m == lower))
        .map(|i| i as u32 + 1)
}

/// BibTeX month macro for a month number
pub fn month_macro(month: u32) -> Option<&'static str> {
    MONTH_MACROS.get((month as usize).checked_sub(1)?).copied()
}

/// Parse a free-form date string. Never fails: unrecognized text is kept as
/// `raw`, and blank text yields an empty date.
pub fn parse_date(text: &str) -> DateSpec {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DateSpec::default();
    }

    if let Some(spec) = parse_structured(trimmed) {
        return spec;
    }

    if let Some(caps) = CIRCA.captures(trimmed) {
        if let Some(mut spec) = parse_structured(caps[1].trim()) {
            spec.circa = true;
            return spec;
        }
    }

    if let Some(caps) = SEASON.captures(trimmed) {
        let season = match caps[1].to_lowercase().as_str() {
            "spring" => "1",
            "summer" => "2",
            "autumn" | "fall" => "3",
            _ => "4",
        };
        if let Ok(year) = caps[2].parse::<i32>() {
            let mut spec = DateSpec::from_parts(vec![year]);
            spec.season = Some(season.to_string());
            return spec;
        }
    }

    DateSpec::from_raw(trimmed)
}

/// Rules in trial order; the first one that matches wins.
fn parse_structured(text: &str) -> Option<DateSpec> {
    if let Some(parts) = match_numeric(&RIS_SLASH, text) {
        return Some(DateSpec::from_parts(parts));
    }

    if let Some((start, end)) = text.split_once('/') {
        let start = parse_single(start.trim())?;
        let end = parse_single(end.trim())?;
        return Some(DateSpec::from_range(start, end));
    }

    parse_single(text).map(DateSpec::from_parts)
}

/// One calendar date, no ranges
fn parse_single(text: &str) -> Option<DateParts> {
    if let Some(parts) = match_numeric(&RIS_SLASH, text) {
        return Some(parts);
    }
    if let Some(parts) = match_numeric(&ISO, text) {
        return Some(parts);
    }
    if let Some(caps) = DAY_MONTH_YEAR.captures(text) {
        if let Some(month) = month_from_name(&caps[2]) {
            let year = caps[3].parse::<i32>().ok()?;
            let parts = match caps.get(1) {
                Some(day) => vec![year, month as i32, day.as_str().parse().ok()?],
                None => vec![year, month as i32],
            };
            return is_calendar_date(&parts).then_some(parts);
        }
    }
    if let Some(caps) = MONTH_DAY_YEAR.captures(text) {
        if let Some(month) = month_from_name(&caps[1]) {
            let parts = vec![
                caps[3].parse::<i32>().ok()?,
                month as i32,
                caps[2].parse::<i32>().ok()?,
            ];
            return is_calendar_date(&parts).then_some(parts);
        }
    }
    if BARE_YEAR.is_match(text) {
        return text.parse::<i32>().ok().map(|year| vec![year]);
    }
    None
}

/// Components captured by a `year(sep month(sep day)?)?` pattern
fn match_numeric(pattern: &Regex, text: &str) -> Option<DateParts> {
    let caps = pattern.captures(text)?;
    let parts = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str().parse::<i32>().ok())
        .collect::<Option<Vec<_>>>()?;
    is_calendar_date(&parts).then_some(parts)
}

/// Month within 1-12, day valid for its month
fn is_calendar_date(parts: &[i32]) -> bool {
    match *parts {
        [_] => true,
        [_, month] => (1..=12).contains(&month),
        [year, month, day] => match (u32::try_from(month), u32::try_from(day)) {
            (Ok(month), Ok(day)) => NaiveDate::from_ymd_opt(year, month, day).is_some(),
            _ => false,
        },
        _ => false,
    }
}

/// Build a date from BibTeX-style separate fields. The month accepts a
/// number, a three-letter macro or a full month name.
pub fn parse_split_date(year: &str, month: Option<&str>, day: Option<&str>) -> DateSpec {
    let year_text = year.trim();
    let Ok(year) = year_text.parse::<i32>() else {
        return if month.is_none() && day.is_none() {
            parse_date(year_text)
        } else {
            DateSpec::from_raw(year_text)
        };
    };

    let mut parts = vec![year];
    let month = month.and_then(|m| {
        let m = m.trim();
        m.parse::<u32>().ok().or_else(|| month_from_name(m))
    });
    if let Some(month) = month.filter(|m| (1..=12).contains(m)) {
        parts.push(month as i32);
        if let Some(day) = day.and_then(|d| d.trim().parse::<i32>().ok()) {
            parts.push(day);
            if !is_calendar_date(&parts) {
                parts.pop();
            }
        }
    }
    DateSpec::from_parts(parts)
}

fn join_parts(parts: &[i32], sep: &str) -> String {
    parts
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if i == 0 {
                format!("{:04}", p)
            } else {
                format!("{:02}", p)
            }
        })
        .collect::<Vec<_>>()
        .join(sep)
}

/// `YYYY[-MM[-DD]]`, ranges as `start/end`
pub fn to_iso(date: Option<&DateSpec>) -> String {
    let Some(date) = date else {
        return String::new();
    };
    if date.date_parts.is_empty() {
        return date.fallback_text();
    }
    date.date_parts
        .iter()
        .map(|parts| join_parts(parts, "-"))
        .collect::<Vec<_>>()
        .join("/")
}

/// `YYYY[/MM[/DD]]`; a range is reduced to its start
pub fn to_ris_slash(date: Option<&DateSpec>) -> String {
    match date {
        Some(date) => match date.start() {
            Some(parts) => join_parts(parts, "/"),
            None => date.fallback_text(),
        },
        None => String::new(),
    }
}

/// Separate year, month macro and two-digit day
pub fn to_split_fields(date: Option<&DateSpec>) -> SplitDate {
    let Some(date) = date else {
        return SplitDate::default();
    };
    match date.year() {
        Some(year) => SplitDate {
            year: format!("{:04}", year),
            month: date
                .month()
                .and_then(month_macro)
                .unwrap_or_default()
                .to_string(),
            day: date.day().map(|d| format!("{:02}", d)).unwrap_or_default(),
        },
        None => SplitDate {
            year: date.fallback_text(),
            ..Default::default()
        },
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_date_parts<'de, D>(deserializer: D) -> Result<Vec<DateParts>, D::Error>
where
    D: Deserializer<'de>,
{
    let lists: Vec<Vec<Scalar>> = Vec::deserialize(deserializer)?;
    lists
        .into_iter()
        .map(|list| {
            let mut parts = Vec::with_capacity(list.len());
            for value in list {
                let part = match value {
                    Scalar::Int(n) => i32::try_from(n).ok(),
                    Scalar::Float(f) => float_component(f),
                    // Later components are positional; they cannot follow a gap
                    Scalar::Text(s) if s.trim().is_empty() => break,
                    Scalar::Text(s) => s.trim().parse::<i32>().ok(),
                    _ => None,
                };
                parts.push(part.ok_or_else(|| de::Error::custom("invalid date-parts component"))?);
            }
            Ok(parts)
        })
        .collect()
}

/// A whole float inside the `i32` range
fn float_component(f: f64) -> Option<i32> {
    let in_range = (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&f);
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i32)
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Bool(b) => b,
        Scalar::Int(n) => n != 0,
        Scalar::Float(f) => f != 0.0,
        Scalar::Text(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Text(s)) => Some(s),
        Some(Scalar::Int(n)) => Some(n.to_string()),
        Some(Scalar::Float(f)) => Some(f.to_string()),
        Some(Scalar::Bool(b)) => Some(b.to_string()),
        None => None,
    })
}
