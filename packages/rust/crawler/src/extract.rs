//! Structured Data Extractor.
//!
//! Picks one target node from the page's structured-data graph and derives
//! title, author, date, publisher and type from it. Target selection is an
//! ordered rule list; the first rule that applies to the URL and finds a node
//! wins.

use serde_json::Value;
use tracing::{debug, instrument};

use citesync_shared::{ContentType, ExtractedMetadata};

use crate::adapters::is_linkedin_feed_update;
use crate::jsonld::{self, first_str_field, has_type, node_type};

/// Word limit for titles derived from body text.
pub const TITLE_WORD_LIMIT: usize = 20;

/// Types whose title comes from `name` / `headline`.
const ARTICLE_TYPES: &[&str] = &["NewsArticle", "BlogPosting", "Article"];

/// Types accepted by the generic post rule.
const POST_TYPES: &[&str] = &[
    "NewsArticle",
    "BlogPosting",
    "SocialMediaPosting",
    "DiscussionForumPosting",
    "Article",
];

// ---------------------------------------------------------------------------
// Target rules
// ---------------------------------------------------------------------------

/// One step of target-node selection.
pub struct TargetRule {
    pub name: &'static str,
    /// Whether the rule is considered for this URL at all.
    pub applies: fn(&str) -> bool,
    /// Pick the target from the top-level nodes, if any.
    pub select: fn(&[Value]) -> Option<&Value>,
}

/// Selection rules in priority order.
pub const TARGET_RULES: &[TargetRule] = &[
    TargetRule {
        name: "nested-comment",
        applies: is_linkedin_feed_update,
        select: first_nested_comment,
    },
    TargetRule {
        name: "comment",
        applies: any_url,
        select: first_comment,
    },
    TargetRule {
        name: "post",
        applies: any_url,
        select: first_post,
    },
];

fn any_url(_url: &str) -> bool {
    true
}

/// The first element of the first social post's non-empty `comment` array.
///
/// Later nested comments are never considered.
fn first_nested_comment(nodes: &[Value]) -> Option<&Value> {
    nodes
        .iter()
        .filter(|node| has_type(node, &["SocialMediaPosting"]))
        .find_map(|node| {
            node.get("comment")
                .and_then(Value::as_array)
                .and_then(|comments| comments.first())
        })
        .filter(|comment| comment.is_object())
}

fn first_comment(nodes: &[Value]) -> Option<&Value> {
    nodes.iter().find(|node| has_type(node, &["Comment"]))
}

fn first_post(nodes: &[Value]) -> Option<&Value> {
    nodes.iter().find(|node| has_type(node, POST_TYPES))
}

/// Run the rules in order and return the winning rule name with its node.
pub fn select_target<'a>(nodes: &'a [Value], url: &str) -> Option<(&'static str, &'a Value)> {
    TARGET_RULES
        .iter()
        .filter(|rule| (rule.applies)(url))
        .find_map(|rule| (rule.select)(nodes).map(|node| (rule.name, node)))
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract metadata from a fetched page.
///
/// Empty input, pages without structured data, and pages where no rule finds
/// a target all yield empty metadata.
#[instrument(skip_all, fields(url = %url))]
pub fn extract_metadata(html: &str, url: &str) -> ExtractedMetadata {
    if html.trim().is_empty() {
        return ExtractedMetadata::default();
    }

    let nodes = jsonld::parse_graph(html);
    let Some((rule, node)) = select_target(&nodes, url) else {
        debug!(nodes = nodes.len(), "no target node in structured data");
        return ExtractedMetadata::default();
    };

    let metadata = metadata_from_node(node);
    debug!(rule, source_type = %metadata.source_type, title = %metadata.title, "target node selected");
    metadata
}

/// Derive all fields from a single target node.
pub fn metadata_from_node(node: &Value) -> ExtractedMetadata {
    let source_type = node_type(node).unwrap_or_default().to_string();

    let title = if has_type(node, ARTICLE_TYPES) {
        first_str_field(node, &["name", "headline"])
            .unwrap_or_default()
            .to_string()
    } else {
        first_str_field(node, &["text", "articleBody"])
            .map(|text| truncate_words(text, TITLE_WORD_LIMIT))
            .unwrap_or_default()
    };

    let content_type = if source_type == "Comment" {
        ContentType::Comment
    } else if POST_TYPES.contains(&source_type.as_str()) {
        ContentType::Post
    } else {
        ContentType::Unknown
    };

    ExtractedMetadata {
        title,
        author: author_name(node.get("author")),
        date: first_str_field(node, &["datePublished", "dateCreated", "dateModified"])
            .unwrap_or_default()
            .to_string(),
        publisher: node
            .get("publisher")
            .filter(|p| p.is_object())
            .and_then(|p| jsonld::str_field(p, "name"))
            .unwrap_or_default()
            .to_string(),
        source_type,
        content_type,
    }
}

/// Author as a raw display string.
///
/// A list contributes its first entry; an object its `name`.
fn author_name(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Array(entries)) => author_name(entries.first()),
        Some(Value::Object(map)) => map
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    }
}

/// Keep the first `limit` whitespace-separated words, joined by single spaces.
///
/// Appends `" ..."` only when words were dropped.
pub fn truncate_words(text: &str, limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > limit {
        format!("{} ...", words[..limit].join(" "))
    } else {
        words.join(" ")
    }
}
