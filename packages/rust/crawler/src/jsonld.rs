//! Structured-data graph parsing.
//!
//! Collects every `<script type="application/ld+json">` block of a page into
//! a flat, ordered list of JSON objects. Top-level arrays and `@graph`
//! containers are flattened in document order; non-object entries are dropped.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::warn;

/// Parse all JSON-LD blocks from `html` into an ordered node list.
///
/// A malformed block is logged and skipped; the remaining blocks still count.
pub fn parse_graph(html: &str) -> Vec<Value> {
    if html.trim().is_empty() {
        return Vec::new();
    }

    let doc = Html::parse_document(html);
    let sel = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();

    let mut nodes = Vec::new();
    for (index, script) in doc.select(&sel).enumerate() {
        let raw = script.text().collect::<String>();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(value) => flatten_into(value, &mut nodes),
            Err(e) => warn!(block = index, error = %e, "skipping malformed structured data block"),
        }
    }

    nodes
}

fn flatten_into(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::Object(mut map) => match map.remove("@graph") {
            Some(graph) => flatten_into(graph, out),
            None => out.push(Value::Object(map)),
        },
        _ => {}
    }
}

/// The node's `@type`. For multi-typed nodes the first string entry wins.
pub fn node_type(node: &Value) -> Option<&str> {
    match node.get("@type")? {
        Value::String(s) => Some(s.as_str()),
        Value::Array(types) => types.iter().find_map(Value::as_str),
        _ => None,
    }
}

/// True if the node's `@type` is one of `types`.
pub fn has_type(node: &Value, types: &[&str]) -> bool {
    node_type(node).is_some_and(|t| types.contains(&t))
}

/// Non-empty trimmed string field.
pub fn str_field<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    node.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// First non-empty string among `keys`, in order.
pub fn first_str_field<'a>(node: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| str_field(node, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(blocks: &[&str]) -> String {
        let scripts: String = blocks
            .iter()
            .map(|b| format!(r#"<script type="application/ld+json">{b}</script>"#))
            .collect();
        format!("<html><head>{scripts}</head><body><p>hi</p></body></html>")
    }

    #[test]
    fn empty_html_has_no_nodes() {
        assert!(parse_graph("").is_empty());
        assert!(parse_graph("<html><body>no data</body></html>").is_empty());
    }

    #[test]
    fn collects_blocks_in_document_order() {
        let html = page(&[
            r#"{"@type":"Organization","name":"A"}"#,
            r#"{"@type":"NewsArticle","headline":"B"}"#,
        ]);
        let nodes = parse_graph(&html);
        assert_eq!(nodes.len(), 2);
        assert_eq!(node_type(&nodes[0]), Some("Organization"));
        assert_eq!(node_type(&nodes[1]), Some("NewsArticle"));
    }

    #[test]
    fn flattens_arrays_and_graph_containers() {
        let html = page(&[
            r#"[{"@type":"WebSite"},{"@type":"BlogPosting"}]"#,
            r#"{"@context":"https://schema.org","@graph":[{"@type":"Person"},{"@type":"Comment"}]}"#,
        ]);
        let types: Vec<_> = parse_graph(&html)
            .iter()
            .filter_map(|n| node_type(n).map(str::to_string))
            .collect();
        assert_eq!(types, ["WebSite", "BlogPosting", "Person", "Comment"]);
    }

    #[test]
    fn malformed_block_is_skipped_not_fatal() {
        let html = page(&[r#"{"@type": "Article", "name": "#, r#"{"@type":"Article","name":"ok"}"#]);
        let nodes = parse_graph(&html);
        assert_eq!(nodes.len(), 1);
        assert_eq!(str_field(&nodes[0], "name"), Some("ok"));
    }

    #[test]
    fn scalar_entries_are_dropped() {
        let html = page(&[r#"[1, "two", {"@type":"Article"}]"#]);
        assert_eq!(parse_graph(&html).len(), 1);
    }

    #[test]
    fn multi_typed_node_uses_first_string() {
        let node = json!({"@type": ["NewsArticle", "Article"]});
        assert_eq!(node_type(&node), Some("NewsArticle"));
        assert!(has_type(&node, &["NewsArticle"]));
        assert!(!has_type(&json!({"name": "untyped"}), &["Article"]));
    }

    #[test]
    fn string_field_helpers_skip_blank_values() {
        let node = json!({"name": "  ", "headline": "Real", "count": 3});
        assert_eq!(str_field(&node, "name"), None);
        assert_eq!(str_field(&node, "count"), None);
        assert_eq!(first_str_field(&node, &["name", "headline"]), Some("Real"));
    }
}
