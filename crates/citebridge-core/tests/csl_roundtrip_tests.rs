//! CSL-JSON documents survive a parse/generate cycle unchanged

use citebridge_core::Converter;
use proptest::prelude::*;
use serde_json::{json, Value};

const TYPES: &[&str] = &["article-journal", "book", "chapter", "report", "thesis", "dataset"];

fn item_strategy() -> impl Strategy<Value = (usize, String, Option<i32>, Option<(String, String)>)> {
    (
        0..TYPES.len(),
        "[A-Z][a-z]{1,8}( [a-z]{1,8}){0,3}",
        prop::option::of(1500i32..2100),
        prop::option::of(("[A-Z][a-z]{1,10}", "[A-Z][a-z]{1,10}")),
    )
}

proptest! {
    #[test]
    fn prop_csl_round_trip(items in prop::collection::vec(item_strategy(), 0..6)) {
        let document: Vec<Value> = items
            .iter()
            .enumerate()
            .map(|(i, (kind, title, year, author))| {
                let mut item = json!({
                    "id": format!("item{}", i),
                    "type": TYPES[*kind],
                    "title": title,
                });
                if let Some(year) = year {
                    item["issued"] = json!({"date-parts": [[year]]});
                }
                if let Some((family, given)) = author {
                    item["author"] = json!([{"family": family, "given": given}]);
                }
                item
            })
            .collect();
        let input = Value::Array(document);

        let converter = Converter::new();
        let output = converter
            .convert(&input.to_string(), "csl-json", "csl-json", None)
            .unwrap();
        let output: Value = serde_json::from_str(&output).unwrap();
        prop_assert_eq!(input, output);
    }
}
