//! Parsing of model answers into raw line items
//!
//! The model is asked for a bare JSON array but often wraps it in code fences
//! or surrounds it with prose. Parsing never fails: anything that cannot be
//! recovered yields an empty list.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// One line item as returned by the model, before normalization
pub type RawItem = Map<String, Value>;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("fence pattern is valid"));

/// Remove code fences and NUL bytes
pub fn clean_response(text: &str) -> String {
    let without_nul: String = text.chars().filter(|&c| c != '\0').collect();
    FENCE.replace_all(&without_nul, "").trim().to_string()
}

fn items_from(value: Value) -> Option<Vec<RawItem>> {
    match value {
        Value::Array(values) => Some(
            values
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(map) => Some(map),
                    other => {
                        log::debug!("Dropping non-object array member: {}", other);
                        None
                    }
                })
                .collect(),
        ),
        _ => None,
    }
}

fn parse_strict(text: &str) -> Option<Vec<RawItem>> {
    serde_json::from_str::<Value>(text).ok().and_then(items_from)
}

fn parse_lenient(text: &str) -> Option<Vec<RawItem>> {
    json5::from_str::<Value>(text).ok().and_then(items_from)
}

/// Slice between the first `[` and the last `]`, if both exist in order
fn bracketed(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}

/// Parse a model answer into raw items
pub fn parse_items(text: &str) -> Vec<RawItem> {
    let cleaned = clean_response(text);

    if let Some(items) = parse_strict(&cleaned) {
        return items;
    }

    if let Some(slice) = bracketed(&cleaned) {
        if let Some(items) = parse_strict(slice) {
            return items;
        }
        if let Some(items) = parse_lenient(slice) {
            log::debug!("Recovered {} item(s) with lenient parsing", items.len());
            return items;
        }
    }

    log::warn!(
        "Could not parse model answer ({} chars), treating as empty",
        text.len()
    );
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_array() {
        let items = parse_items(r#"[{"quantity": 2}, {"quantity": 3}]"#);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["quantity"], json!(3));
    }

    #[test]
    fn test_fenced_array_matches_unfenced() {
        let plain = r#"[{"description": "Gauze", "quantity": 10}]"#;
        let fenced = format!("```json\n{}\n```", plain);
        assert_eq!(parse_items(&fenced), parse_items(plain));
        assert_eq!(parse_items(&fenced).len(), 1);
    }

    #[test]
    fn test_embedded_array_recovered() {
        let items = parse_items(r#"noise[{"a":1}]moretext"#);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["a"], json!(1));
    }

    #[test]
    fn test_nul_bytes_removed() {
        let items = parse_items("[{\"a\":\u{0}1}]");
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_unparseable_is_empty() {
        assert!(parse_items("I could not read this document.").is_empty());
        assert!(parse_items("] backwards [").is_empty());
        assert!(parse_items("").is_empty());
    }

    #[test]
    fn test_object_instead_of_array_is_empty() {
        assert!(parse_items(r#"{"quantity": 1}"#).is_empty());
    }

    #[test]
    fn test_trailing_comma_recovered_leniently() {
        let items = parse_items("Here you go: [{\"a\": 1,}, {\"a\": 2},]");
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_non_objects_dropped() {
        let items = parse_items(r#"[{"a": 1}, "stray", 42, {"a": 2}]"#);
        assert_eq!(items.len(), 2);
    }
}
