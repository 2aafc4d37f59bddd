//! Substack platform adapter.

use std::sync::LazyLock;

use regex::RegexSet;
use serde_json::Value;
use url::Url;

use citesync_shared::{ContentSubtype, Platform};

use super::PlatformAdapter;
use crate::jsonld::{self, has_type};

/// The platform's own root domain. Custom-domain publications live elsewhere.
const ROOT_DOMAIN: &str = "substack.com";

/// Image/asset CDN host, a fingerprint but never a publication host.
const CDN_DOMAIN: &str = "substackcdn.com";

// ---------------------------------------------------------------------------
// URL patterns (compiled once)
// ---------------------------------------------------------------------------

/// Note and profile-note paths.
static NOTE_PATHS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^/@[\w-]+/note/",
        r"(?i)^/notes/",
        r"(?i)^/@[\w-]+/p/comments/",
        r"(?i)^/profile/\d+-[\w-]+/note/",
    ])
    .expect("note path regex")
});

/// Chat-thread and single-comment paths.
static CHAT_PATHS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^/chat/\d+/post/",
        r"(?i)^/chat/posts/",
        r"(?i)^/p/[\w-]+/comment/\d+",
    ])
    .expect("chat path regex")
});

// ---------------------------------------------------------------------------
// URL checks
// ---------------------------------------------------------------------------

/// True iff the host is exactly `substack.com` or a strict subdomain of it.
///
/// Look-alike hosts (`evilsubstack.com`, `mysubstack.com`) and the CDN host do
/// not qualify.
pub fn is_substack_domain(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    host == ROOT_DOMAIN
        || host
            .strip_suffix(ROOT_DOMAIN)
            .is_some_and(|prefix| prefix.len() > 1 && prefix.ends_with('.'))
}

/// Classify a URL on the platform's own domain as a note or a chat.
///
/// Custom-domain URLs never match, whatever their path.
pub fn get_substack_content_type(url: &str) -> Option<ContentSubtype> {
    if !is_substack_domain(url) {
        return None;
    }
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path();

    if NOTE_PATHS.is_match(path) {
        Some(ContentSubtype::Note)
    } else if CHAT_PATHS.is_match(path) {
        Some(ContentSubtype::Chat)
    } else {
        None
    }
}

/// True for note / profile-note URLs.
pub fn is_substack_note_url(url: &str) -> bool {
    get_substack_content_type(url) == Some(ContentSubtype::Note)
}

/// Look for Substack hosting fingerprints in the page's structured data.
///
/// Only `NewsArticle` nodes are inspected. Notes are rejected up front since
/// their pages carry no structured data worth trusting.
pub fn check_if_substack(html: &str, url: &str) -> bool {
    if html.trim().is_empty() || is_substack_note_url(url) {
        return false;
    }

    jsonld::parse_graph(html)
        .iter()
        .filter(|node| has_type(node, &["NewsArticle"]))
        .any(has_hosting_fingerprint)
}

fn has_hosting_fingerprint(node: &Value) -> bool {
    if stringify(node.get("url")).contains(ROOT_DOMAIN) {
        return true;
    }
    if stringify(node.get("image")).contains(CDN_DOMAIN) {
        return true;
    }

    let Some(publisher) = node.get("publisher").and_then(Value::as_object) else {
        return false;
    };
    let publisher_url = publisher
        .get("url")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim_end_matches('/');
    if publisher_url.ends_with(ROOT_DOMAIN) {
        return true;
    }

    publisher
        .get("identifier")
        .and_then(Value::as_str)
        .is_some_and(|id| id.starts_with("pub:"))
}

/// Render any JSON value (string, object, list) as text for substring checks.
fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Detects Substack posts, notes and chats.
///
/// Own-domain URLs are trusted outright; custom domains need a structured-data
/// fingerprint. Either way the page must have been fetched.
pub struct SubstackAdapter;

impl PlatformAdapter for SubstackAdapter {
    fn platform(&self) -> Platform {
        Platform::Substack
    }

    fn detect(&self, url: &str, html: &str) -> bool {
        !html.trim().is_empty() && (is_substack_domain(url) || check_if_substack(html, url))
    }

    fn content_subtype(&self, url: &str) -> Option<ContentSubtype> {
        get_substack_content_type(url)
    }

    fn name(&self) -> &str {
        "substack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn news_article(fields: &str) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{{"@type":"NewsArticle",{fields}}}</script></head><body></body></html>"#
        )
    }

    #[test]
    fn root_and_subdomains_are_substack() {
        assert!(is_substack_domain("https://substack.com/notes/123"));
        assert!(is_substack_domain("https://astralcodexten.substack.com/p/test"));
        assert!(is_substack_domain("https://Open.Substack.com/chat/posts/1"));
    }

    #[test]
    fn look_alike_and_cdn_domains_are_not_substack() {
        assert!(!is_substack_domain("https://www.platformer.news/p/test"));
        assert!(!is_substack_domain("https://evilsubstack.com/p/test"));
        assert!(!is_substack_domain("https://mysubstack.com/p/test"));
        assert!(!is_substack_domain("https://substack.com.evil.net/p/test"));
        assert!(!is_substack_domain("https://substackcdn.com/image.jpg"));
        assert!(!is_substack_domain("not a url"));
    }

    #[test]
    fn note_urls() {
        for url in [
            "https://substack.com/@contraptions/note/c-191022428",
            "https://substack.com/notes/post-67890",
            "https://astralcodexten.substack.com/@scottwalker/note/c-123",
            "https://substack.com/profile/12345-some-writer/note/c-1",
        ] {
            assert_eq!(get_substack_content_type(url), Some(ContentSubtype::Note), "{url}");
            assert!(is_substack_note_url(url));
        }
    }

    #[test]
    fn chat_urls() {
        for url in [
            "https://substack.com/chat/9973/post/64cc3fbb-ef7b-44a8-b8a9-9e336cc7e71b",
            "https://open.substack.com/chat/posts/64cc3fbb-ef7b-44a8-b8a9-9e336cc7e71b",
            "https://astralcodexten.substack.com/p/some-post/comment/12345",
        ] {
            assert_eq!(get_substack_content_type(url), Some(ContentSubtype::Chat), "{url}");
        }
    }

    #[test]
    fn plain_posts_and_foreign_domains_have_no_subtype() {
        for url in [
            "https://www.platformer.news/p/some-post/comments",
            "https://astralcodexten.substack.com/p/some-post",
            "https://example.com/p/article",
            "https://evilsubstack.com/p/fake",
            "https://evilsubstack.com/@x/note/c-1",
        ] {
            assert_eq!(get_substack_content_type(url), None, "{url}");
        }
    }

    #[test]
    fn fingerprint_in_article_url() {
        let html = news_article(r#""url":"https://pub.substack.com/p/x""#);
        assert!(check_if_substack(&html, "https://www.custom.news/p/x"));
    }

    #[test]
    fn fingerprint_in_cdn_image() {
        let html = news_article(r#""image":[{"@type":"ImageObject","url":"https://substackcdn.com/image/fetch/a.png"}]"#);
        assert!(check_if_substack(&html, "https://www.custom.news/p/x"));
    }

    #[test]
    fn fingerprint_in_publisher() {
        let by_url = news_article(r#""publisher":{"name":"P","url":"https://p.substack.com"}"#);
        assert!(check_if_substack(&by_url, "https://www.custom.news/p/x"));

        let by_id = news_article(r#""publisher":{"name":"P","identifier":"pub:12345"}"#);
        assert!(check_if_substack(&by_id, "https://www.custom.news/p/x"));
    }

    #[test]
    fn no_fingerprint_or_wrong_type() {
        let plain = news_article(r#""url":"https://www.custom.news/p/x","publisher":"P""#);
        assert!(!check_if_substack(&plain, "https://www.custom.news/p/x"));

        let blog = r#"<script type="application/ld+json">{"@type":"BlogPosting","url":"https://a.substack.com/p/x"}</script>"#;
        assert!(!check_if_substack(blog, "https://www.custom.news/p/x"));
    }

    #[test]
    fn note_urls_are_never_fingerprinted() {
        let html = news_article(r#""url":"https://substack.com/@a/note/c-1""#);
        assert!(!check_if_substack(&html, "https://substack.com/@a/note/c-1"));
        assert!(!check_if_substack("", "https://www.custom.news/p/x"));
    }

    #[test]
    fn adapter_requires_fetched_page() {
        let adapter = SubstackAdapter;
        assert!(adapter.detect("https://pub.substack.com/p/slug", "<html></html>"));
        assert!(!adapter.detect("https://pub.substack.com/p/slug", ""));
        assert!(!adapter.detect("https://www.custom.news/p/x", "<html></html>"));
    }
}
