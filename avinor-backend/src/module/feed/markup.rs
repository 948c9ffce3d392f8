///! Markup → generic tree conversion
///!
///! XML bodies are turned into a `serde_json::Value` tree using the usual
///! attribute/element mapping: attributes become `@name` keys, text-only
///! elements become strings (or null when empty), repeated child elements
///! become arrays and a single child stays a bare object. JSON bodies are
///! read as-is.

use roxmltree::{Node, ParsingOptions};
use serde_json::{Map, Value};

use crate::{Error, Result};

const TEXT_KEY: &str = "#text";

/// Parse a response body (XML or JSON) into a generic tree.
pub fn parse_document(body: &str) -> Result<Value> {
    let body = body.trim_start_matches('\u{feff}').trim();
    if body.is_empty() {
        return Err(Error::parse("Empty response body"));
    }

    if body.starts_with('{') || body.starts_with('[') {
        return serde_json::from_str(body)
            .map_err(|e| Error::parse(format!("Invalid JSON body: {}", e)));
    }

    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = roxmltree::Document::parse_with_options(body, options)
        .map_err(|e| Error::parse(format!("Invalid XML body: {}", e)))?;

    let root = document.root_element();
    let mut tree = Map::new();
    tree.insert(root.tag_name().name().to_string(), element_to_value(root));
    Ok(Value::Object(tree))
}

fn element_to_value(node: Node<'_, '_>) -> Value {
    let mut map = Map::new();

    for attribute in node.attributes() {
        map.insert(
            format!("@{}", attribute.name()),
            Value::String(attribute.value().to_string()),
        );
    }

    let mut text = String::new();
    for child in node.children() {
        if child.is_element() {
            insert_child(&mut map, child.tag_name().name(), element_to_value(child));
        } else if child.is_text() {
            if let Some(fragment) = child.text() {
                text.push_str(fragment);
            }
        }
    }

    let text = text.trim();
    if map.is_empty() {
        return if text.is_empty() {
            Value::Null
        } else {
            Value::String(text.to_string())
        };
    }

    if !text.is_empty() {
        map.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
    }
    Value::Object(map)
}

/// Repeated names are collected into an array, first occurrence stays bare.
fn insert_child(map: &mut Map<String, Value>, name: &str, value: Value) {
    match map.get_mut(name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(name.to_string(), value);
        }
    }
}

/// Read a scalar field as a string, following `#text` for elements with attributes.
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => map.get(TEXT_KEY).and_then(text_of),
        _ => None,
    }
}

/// Field lookup on an object node, `None` when the node is not an object.
pub fn field(node: &Value, key: &str) -> Option<String> {
    node.get(key).and_then(text_of)
}

/// First non-empty value among `keys`, in order.
pub fn first_non_empty(node: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| field(node, key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Normalize a "one or many" node into a list: null/missing → empty,
/// a bare object → one element, an array → its elements.
pub fn as_list(node: Option<&Value>) -> Vec<&Value> {
    match node {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attributes_and_text_elements() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
            <airport name="OSL">
              <flights lastUpdate="2025-01-01T12:00:00Z">
                <flight uniqueId="u1"><flight_id>DY123</flight_id><gate/></flight>
              </flights>
            </airport>"#;

        let tree = parse_document(xml).unwrap();
        assert_eq!(tree["airport"]["@name"], "OSL");
        assert_eq!(tree["airport"]["flights"]["@lastUpdate"], "2025-01-01T12:00:00Z");
        // A single child stays a bare object
        assert_eq!(tree["airport"]["flights"]["flight"]["@uniqueId"], "u1");
        assert_eq!(tree["airport"]["flights"]["flight"]["flight_id"], "DY123");
        assert!(tree["airport"]["flights"]["flight"]["gate"].is_null());
    }

    #[test]
    fn test_repeated_children_become_array() {
        let xml = "<root><item>a</item><item>b</item><item>c</item><other>x</other></root>";
        let tree = parse_document(xml).unwrap();
        assert_eq!(tree["root"]["item"], json!(["a", "b", "c"]));
        assert_eq!(tree["root"]["other"], "x");
    }

    #[test]
    fn test_mixed_text_and_attributes() {
        let tree = parse_document(r#"<status code="BRD">Boarding</status>"#).unwrap();
        assert_eq!(tree["status"]["@code"], "BRD");
        assert_eq!(text_of(&tree["status"]).as_deref(), Some("Boarding"));
    }

    #[test]
    fn test_json_body_is_accepted() {
        let tree = parse_document(r#" {"airport": {"flights": null}} "#).unwrap();
        assert!(tree["airport"]["flights"].is_null());
    }

    #[test]
    fn test_invalid_bodies_are_parse_errors() {
        assert!(matches!(parse_document("   "), Err(Error::Parse { .. })));
        assert!(matches!(parse_document("<airport><flights>"), Err(Error::Parse { .. })));
        assert!(matches!(parse_document("{not json"), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_as_list_normalization() {
        let single = json!({"a": 1});
        let many = json!([{"a": 1}, {"a": 2}]);
        assert!(as_list(None).is_empty());
        assert!(as_list(Some(&Value::Null)).is_empty());
        assert_eq!(as_list(Some(&single)).len(), 1);
        assert_eq!(as_list(Some(&many)).len(), 2);
    }

    #[test]
    fn test_first_non_empty_respects_order() {
        let node = json!({"@code": "", "code": "  ", "@iata": "osl", "iata": "BGO"});
        assert_eq!(first_non_empty(&node, &["@code", "code", "@iata", "iata"]).as_deref(), Some("osl"));
        assert_eq!(first_non_empty(&node, &["missing"]), None);
        assert_eq!(first_non_empty(&json!("scalar"), &["code"]), None);
    }
}
