//! BibTeX grammar integration tests

use citebridge_bibtex::{decode_latex, escape_latex, parse, ParseError, ValueStyle};
use rstest::rstest;

const LIBRARY: &str = r#"
@preamble{"\providecommand{\noopsort}[1]{}"}
@string{ jgr = "Journal of Geophysical Research" }

@Article{Einstein1905,
  author    = {Einstein, A.},
  title     = {Zur Elektrodynamik bewegter K{\"o}rper},
  journal   = {Annalen der Physik},
  year      = 1905,
  volume    = 322,
  number    = 10,
  pages     = {891--921},
}

@InProceedings{Lamport1978,
  author    = "Lamport, Leslie",
  title     = "Time, Clocks, and the Ordering of Events",
  booktitle = jgr # { (special issue)},
  month     = jul,
  year      = "1978"
}

@misc{Broken,
  title = {Missing close brace,
  year = 2000

@online{Web2024,
  url     = {https://example.com/a_b?x=1&y=2},
  urldate = {2024-05-01},
}
"#;

#[test]
fn test_library_records() {
    let output = parse(LIBRARY);
    let keys: Vec<&str> = output.records.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["Einstein1905", "Lamport1978", "Web2024"]);
    assert_eq!(output.preambles.len(), 1);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].error, ParseError::UnbalancedBraces);
    assert_eq!(output.errors[0].key.as_deref(), Some("Broken"));
}

#[test]
fn test_library_values() {
    let output = parse(LIBRARY);
    let einstein = &output.records[0];
    assert_eq!(einstein.kind, "article");
    assert_eq!(einstein.get("pages"), Some("891--921"));
    assert_eq!(
        decode_latex(einstein.get("title").unwrap()),
        "Zur Elektrodynamik bewegter Körper"
    );

    let lamport = &output.records[1];
    assert_eq!(
        lamport.get("booktitle"),
        Some("Journal of Geophysical Research (special issue)")
    );
    assert_eq!(lamport.get("year"), Some("1978"));
    let month = lamport.fields.iter().find(|f| f.name == "month").unwrap();
    assert_eq!(month.style, ValueStyle::Bare);

    let web = &output.records[2];
    assert_eq!(web.get("url"), Some("https://example.com/a_b?x=1&y=2"));
}

#[test]
fn test_raw_text_and_lines() {
    let output = parse(LIBRARY);
    let einstein = &output.records[0];
    assert_eq!(einstein.line, 5);
    assert!(einstein.raw.starts_with("@Article{Einstein1905,"));
    assert!(einstein.raw.ends_with('}'));
}

#[rstest]
#[case("", 0)]
#[case("% only a comment\n", 0)]
#[case("@comment{nothing here}", 0)]
#[case("@misc{a,}\n@misc{b,}", 2)]
#[case("@misc(a, title = {x})", 1)]
fn test_record_counts(#[case] input: &str, #[case] expected: usize) {
    let output = parse(input);
    assert_eq!(output.records.len(), expected);
    assert!(output.errors.is_empty());
}

#[rstest]
#[case("Ångström")]
#[case("Łukasiewicz & Nowak")]
#[case("Dvořák: 100% _new_ #1")]
#[case("Façade — “quoted”")]
fn test_escape_round_trip(#[case] text: &str) {
    let (escaped, _) = escape_latex(text);
    assert!(escaped.is_ascii() || text.contains('“'));
    assert_eq!(decode_latex(&escaped), text);
}
