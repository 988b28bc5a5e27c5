//! Person names and the name engine
//!
//! Parses BibTeX-style name strings ("Family, Given", "von Family, Jr, Given",
//! "Given von Family", "{Brace Protected Org}") into structured [`Person`]s and
//! serializes them back.

use serde::{Deserialize, Serialize};

/// A contributor name, shaped after the CSL name object.
///
/// Either `literal` is set, or at least one of `family`/`given`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Person {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropping_particle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_dropping_particle: Option<String>,
}

/// Order in which name parts are written
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameStyle {
    /// "Family, Given" (BibTeX, RIS, EndNote)
    FamilyFirst,
    /// "Given Family" for display
    GivenFirst,
}

impl Person {
    pub fn family_given(family: impl Into<String>, given: impl Into<String>) -> Self {
        Self {
            family: Some(family.into()),
            given: Some(given.into()),
            ..Default::default()
        }
    }

    pub fn family_only(family: impl Into<String>) -> Self {
        Self {
            family: Some(family.into()),
            ..Default::default()
        }
    }

    /// A name that cannot be split, such as an organization
    pub fn literal(name: impl Into<String>) -> Self {
        Self {
            literal: Some(name.into()),
            ..Default::default()
        }
    }

    /// Builder method to add suffix
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Builder method to add a particle that stays with the family name
    pub fn with_particle(mut self, particle: impl Into<String>) -> Self {
        self.non_dropping_particle = Some(particle.into());
        self
    }

    /// Whether the name carries anything printable
    pub fn is_valid(&self) -> bool {
        non_empty(&self.literal).is_some()
            || non_empty(&self.family).is_some()
            || non_empty(&self.given).is_some()
    }

    /// Family name with its non-dropping particle, e.g. "van Beethoven"
    fn full_family(&self) -> Option<String> {
        let family = non_empty(&self.family)?;
        Some(match non_empty(&self.non_dropping_particle) {
            Some(particle) => format!("{} {}", particle, family),
            None => family.to_string(),
        })
    }

    /// Given name followed by any dropping particle
    fn full_given(&self) -> Option<String> {
        let given = non_empty(&self.given)?;
        Some(match non_empty(&self.dropping_particle) {
            Some(particle) => format!("{} {}", given, particle),
            None => given.to_string(),
        })
    }

    /// Format as "Given Family, Suffix" for display
    pub fn display_name(&self) -> String {
        serialize_name(self, NameStyle::GivenFirst)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a single name string. Returns `None` for blank input.
pub fn parse_name(input: &str) -> Option<Person> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(inner) = outer_group(trimmed) {
        let inner = inner.trim();
        return (!inner.is_empty()).then(|| Person::literal(inner));
    }

    let parts = split_top_level(trimmed, ',');
    let person = match parts.as_slice() {
        [single] => parse_given_first(single),
        [family, given] => parse_family_first(family, None, given),
        [family, suffix, given] => parse_family_first(family, Some(*suffix), given),
        [family, suffix, rest @ ..] => {
            parse_family_first(family, Some(*suffix), &rest.join(", "))
        }
        [] => return None,
    };

    person.is_valid().then_some(person)
}

/// Split a BibTeX name list on top-level "and" (any case) and parse each name
pub fn parse_names(field: &str) -> Vec<Person> {
    let mut names = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in split_words(field) {
        if word.eq_ignore_ascii_case("and") {
            names.push(current.join(" "));
            current.clear();
        } else {
            current.push(word);
        }
    }
    names.push(current.join(" "));

    names.iter().filter_map(|name| parse_name(name)).collect()
}

/// Serialize one person. Never fails; an empty person yields "".
pub fn serialize_name(person: &Person, style: NameStyle) -> String {
    let family = person.full_family();
    let given = person.full_given();
    let suffix = non_empty(&person.suffix);

    match style {
        NameStyle::FamilyFirst => match (family, given) {
            (Some(family), Some(given)) => match suffix {
                Some(suffix) => format!("{}, {}, {}", family, suffix, given),
                None => format!("{}, {}", family, given),
            },
            (family, given) => non_empty(&person.literal)
                .map(str::to_string)
                .or(family)
                .or(given)
                .unwrap_or_default(),
        },
        NameStyle::GivenFirst => {
            if family.is_none() && given.is_none() {
                return non_empty(&person.literal).unwrap_or("").to_string();
            }
            let mut name = [given, family]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if let Some(suffix) = suffix {
                name.push_str(", ");
                name.push_str(suffix);
            }
            name
        }
    }
}

/// Serialize a name list in BibTeX syntax: names joined by " and ", literal
/// names and multi-word family-only names brace-protected so they are not
/// re-split.
pub fn serialize_names(people: &[Person], style: NameStyle) -> String {
    people
        .iter()
        .map(|person| {
            if let Some(name) = braced_family_only(person) {
                return name;
            }
            let name = serialize_name(person, style);
            let is_literal = person.family.is_none() && person.given.is_none();
            if is_literal && !name.is_empty() && name != "others" {
                format!("{{{}}}", name)
            } else {
                name
            }
        })
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(" and ")
}

/// "von {Family Words}" for a person with a multi-word family name and no
/// given name; the particle stays outside the braces
fn braced_family_only(person: &Person) -> Option<String> {
    if non_empty(&person.given).is_some() || non_empty(&person.literal).is_some() {
        return None;
    }
    let family = non_empty(&person.family)?;
    if !family.contains(char::is_whitespace) {
        return None;
    }
    Some(match non_empty(&person.non_dropping_particle) {
        Some(particle) => format!("{} {{{}}}", particle, family),
        None => format!("{{{}}}", family),
    })
}

/// "First von Last"
fn parse_given_first(input: &str) -> Person {
    let words = split_words(input);
    let Some((last, rest)) = words.split_last() else {
        return Person::default();
    };
    if rest.is_empty() {
        return Person::family_only(unbrace(last));
    }

    // Given names run up to the first lowercase word; the von part runs up to
    // the last lowercase word before the final token.
    let von_start = rest.iter().position(|w| is_particle(w));
    let (given, von, family): (&[&str], &[&str], Vec<&str>) = match von_start {
        Some(start) => {
            let von_end = rest.iter().rposition(|w| is_particle(w)).unwrap_or(start) + 1;
            let mut family = rest[von_end..].to_vec();
            family.push(*last);
            (&rest[..start], &rest[start..von_end], family)
        }
        None => (rest, &rest[..0], vec![*last]),
    };

    build(given, von, &family, None)
}

/// "von Last, [Jr,] First"
fn parse_family_first(family_part: &str, suffix: Option<&str>, given: &str) -> Person {
    let words = split_words(family_part);
    // Leading lowercase words are the von part, but the family name keeps at
    // least one word.
    let von_len = words
        .iter()
        .take(words.len().saturating_sub(1))
        .take_while(|w| is_particle(w))
        .count();
    let given_words = split_words(given);
    build(&given_words, &words[..von_len], &words[von_len..], suffix)
}

fn build(given: &[&str], von: &[&str], family: &[&str], suffix: Option<&str>) -> Person {
    let join = |words: &[&str]| {
        let joined = words.iter().map(|w| unbrace(w)).collect::<Vec<_>>().join(" ");
        (!joined.is_empty()).then_some(joined)
    };
    Person {
        family: join(family),
        given: join(given),
        non_dropping_particle: join(von),
        suffix: suffix
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        ..Default::default()
    }
}

/// A lowercase word outside braces ("van", "de", "von")
fn is_particle(word: &str) -> bool {
    word.chars()
        .next()
        .map(|c| c.is_lowercase())
        .unwrap_or(false)
}

/// The contents of `s` if it is exactly one brace group
fn outer_group(s: &str) -> Option<&str> {
    let inner = s.strip_prefix('{')?.strip_suffix('}')?;
    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

fn unbrace(word: &str) -> &str {
    outer_group(word).unwrap_or(word)
}

/// Split on `sep` outside braces, trimming each part
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            c if c == sep && depth <= 0 => {
                parts.push(s[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts
}

/// Split on whitespace outside braces
fn split_words(s: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut depth = 0i32;
    let mut start: Option<usize> = None;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        if c.is_whitespace() && depth <= 0 {
            if let Some(begin) = start.take() {
                words.push(&s[begin..i]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(begin) = start {
        words.push(&s[begin..]);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_family_comma_given() {
        let person = parse_name("Einstein, Albert").unwrap();
        assert_eq!(person, Person::family_given("Einstein", "Albert"));
    }

    #[test]
    fn test_parse_given_first() {
        let person = parse_name("Albert Einstein").unwrap();
        assert_eq!(person, Person::family_given("Einstein", "Albert"));
    }

    #[test]
    fn test_parse_particles_and_suffix() {
        let person = parse_name("van Beethoven, Jr, Ludwig").unwrap();
        assert_eq!(person.family.as_deref(), Some("Beethoven"));
        assert_eq!(person.non_dropping_particle.as_deref(), Some("van"));
        assert_eq!(person.suffix.as_deref(), Some("Jr"));
        assert_eq!(person.given.as_deref(), Some("Ludwig"));

        let person = parse_name("Ludwig van Beethoven").unwrap();
        assert_eq!(person.family.as_deref(), Some("Beethoven"));
        assert_eq!(person.non_dropping_particle.as_deref(), Some("van"));
        assert_eq!(person.given.as_deref(), Some("Ludwig"));
    }

    #[test]
    fn test_parse_organization_literal() {
        let person = parse_name("{World Health Organization}").unwrap();
        assert_eq!(person, Person::literal("World Health Organization"));
    }

    #[test]
    fn test_parse_single_token() {
        assert_eq!(parse_name("Plato"), Some(Person::family_only("Plato")));
        assert_eq!(parse_name("   "), None);
    }

    #[test]
    fn test_parse_names_splits_top_level_and() {
        let people = parse_names("Smith, John AND Doe, Jane and {Barnes and Noble}");
        assert_eq!(people.len(), 3);
        assert_eq!(people[0].family.as_deref(), Some("Smith"));
        assert_eq!(people[1].given.as_deref(), Some("Jane"));
        assert_eq!(people[2].literal.as_deref(), Some("Barnes and Noble"));
    }

    #[test]
    fn test_serialize_family_first() {
        let person = Person::family_given("Smith", "John");
        assert_eq!(serialize_name(&person, NameStyle::FamilyFirst), "Smith, John");

        let person = Person::family_given("Beethoven", "Ludwig")
            .with_particle("van")
            .with_suffix("Jr");
        assert_eq!(
            serialize_name(&person, NameStyle::FamilyFirst),
            "van Beethoven, Jr, Ludwig"
        );
    }

    #[test]
    fn test_serialize_single_part_and_literal() {
        assert_eq!(
            serialize_name(&Person::literal("ACME"), NameStyle::FamilyFirst),
            "ACME"
        );
        assert_eq!(
            serialize_name(&Person::family_only("Plato"), NameStyle::FamilyFirst),
            "Plato"
        );
        assert_eq!(serialize_name(&Person::default(), NameStyle::FamilyFirst), "");
    }

    #[test]
    fn test_display_name() {
        let person = Person::family_given("King", "Martin Luther").with_suffix("Jr.");
        assert_eq!(person.display_name(), "Martin Luther King, Jr.");
    }

    #[test]
    fn test_serialize_names_protects_literals() {
        let people = vec![
            Person::family_given("Smith", "John"),
            Person::literal("Barnes and Noble"),
        ];
        let field = serialize_names(&people, NameStyle::FamilyFirst);
        assert_eq!(field, "Smith, John and {Barnes and Noble}");
        assert_eq!(parse_names(&field), people);
    }

    #[test]
    fn test_serialize_names_protects_multi_word_family() {
        let people = vec![
            Person::family_only("Van Halen"),
            Person::family_only("Der Graaf").with_particle("van"),
            Person::family_only("Plato"),
        ];
        let field = serialize_names(&people, NameStyle::FamilyFirst);
        assert_eq!(field, "{Van Halen} and van {Der Graaf} and Plato");

        let reparsed = parse_names(&field);
        assert_eq!(reparsed.len(), 3);
        assert!(reparsed.iter().all(|p| p.given.is_none()));
        assert_eq!(reparsed[0].literal.as_deref(), Some("Van Halen"));
        assert_eq!(reparsed[1], people[1]);
        assert_eq!(reparsed[2], people[2]);
    }
}
