//! LinkedIn platform adapter.

use citesync_shared::Platform;

use super::PlatformAdapter;

const DOMAIN: &str = "linkedin.com";

/// Substring match on the LinkedIn domain.
pub fn is_linkedin(url: &str) -> bool {
    url.to_ascii_lowercase().contains(DOMAIN)
}

/// LinkedIn "feed/update" pages, which carry comments nested in the post node.
pub fn is_linkedin_feed_update(url: &str) -> bool {
    is_linkedin(url) && url.to_ascii_lowercase().contains("/feed/update/")
}

/// Detects LinkedIn posts and comments by URL.
pub struct LinkedInAdapter;

impl PlatformAdapter for LinkedInAdapter {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    fn detect(&self, url: &str, html: &str) -> bool {
        is_linkedin(url) && !html.trim().is_empty()
    }

    fn name(&self) -> &str {
        "linkedin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linkedin_urls() {
        assert!(is_linkedin("https://www.linkedin.com/posts/jane_activity-123"));
        assert!(is_linkedin("https://WWW.LinkedIn.com/feed/update/urn:li:activity:1/"));
        assert!(!is_linkedin("https://example.com/linked-in"));
    }

    #[test]
    fn feed_update_pages() {
        assert!(is_linkedin_feed_update(
            "https://www.linkedin.com/feed/update/urn:li:activity:7100000000000000000/"
        ));
        assert!(!is_linkedin_feed_update("https://www.linkedin.com/posts/jane_activity-123"));
        assert!(!is_linkedin_feed_update("https://example.com/feed/update/1"));
    }

    #[test]
    fn adapter_requires_fetched_page() {
        let adapter = LinkedInAdapter;
        assert!(adapter.detect("https://www.linkedin.com/posts/x", "<html></html>"));
        assert!(!adapter.detect("https://www.linkedin.com/posts/x", "  "));
        assert_eq!(adapter.content_subtype("https://www.linkedin.com/posts/x"), None);
    }
}
