//! Platform adapters and the site classifier.
//!
//! Each adapter recognises one originating platform from the URL and, where
//! the URL alone is ambiguous, from the fetched page.

mod linkedin;
mod substack;

use citesync_shared::{ClassificationResult, ContentSubtype, Platform};
use tracing::debug;

pub use linkedin::{LinkedInAdapter, is_linkedin, is_linkedin_feed_update};
pub use substack::{
    SubstackAdapter, check_if_substack, get_substack_content_type, is_substack_domain,
    is_substack_note_url,
};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Trait for platform detection.
///
/// Adapters are tried in registry order; the first to detect wins.
pub trait PlatformAdapter: Send + Sync {
    /// The platform this adapter recognises.
    fn platform(&self) -> Platform;

    /// Decide whether `url` with fetched `html` belongs to this platform.
    fn detect(&self, url: &str, html: &str) -> bool;

    /// Content subtype recognisable from the URL alone.
    fn content_subtype(&self, _url: &str) -> Option<ContentSubtype> {
        None
    }

    /// Human-readable adapter name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered adapters in priority order.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    /// Create a registry with all built-in adapters (Substack first).
    pub fn new() -> Self {
        Self {
            adapters: vec![Box::new(SubstackAdapter), Box::new(LinkedInAdapter)],
        }
    }

    /// Classify a page. Unrecognised pages yield an empty result.
    pub fn classify(&self, url: &str, html: &str) -> ClassificationResult {
        for adapter in &self.adapters {
            if adapter.detect(url, html) {
                let content_subtype = adapter.content_subtype(url);
                debug!(
                    adapter = adapter.name(),
                    subtype = content_subtype.map(|s| s.as_str()).unwrap_or("none"),
                    "platform detected"
                );
                return ClassificationResult {
                    platform: Some(adapter.platform()),
                    content_subtype,
                };
            }
        }
        ClassificationResult::none()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_substack_note() {
        let result = AdapterRegistry::new()
            .classify("https://substack.com/@writer/note/c-42", "<html><body>hi</body></html>");
        assert_eq!(result.platform, Some(Platform::Substack));
        assert_eq!(result.content_subtype, Some(ContentSubtype::Note));
    }

    #[test]
    fn classifies_linkedin_without_subtype() {
        let result = AdapterRegistry::new()
            .classify("https://www.linkedin.com/posts/jane_activity-1", "<html></html>");
        assert_eq!(result.platform, Some(Platform::LinkedIn));
        assert_eq!(result.content_subtype, None);
    }

    #[test]
    fn unknown_or_unfetched_pages_are_unclassified() {
        let registry = AdapterRegistry::default();
        assert_eq!(
            registry.classify("https://example.com/post", "<html></html>"),
            ClassificationResult::none()
        );
        assert_eq!(
            registry.classify("https://pub.substack.com/p/slug", ""),
            ClassificationResult::none()
        );
    }
}
