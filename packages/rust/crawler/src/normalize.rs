//! Tracking-parameter removal.

use tracing::{debug, warn};
use url::Url;
use url::form_urlencoded;

/// Query keys stripped from every URL, compared lowercase.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "source",
    "ref",
    "referral",
    "etype",
    "mc_cid",
    "mc_eid",
    "fbclid",
    "ref_src",
    "ref_url",
    "_hsenc",
    "_hsmi",
    "hs_preview",
    "preview",
    "r",
    "s",
    "gclid",
    "ocid",
    "msclkid",
    "dclid",
    "igshid",
];

/// Whether `key` is on the tracking denylist (case-insensitive).
pub fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&lower.as_str())
}

/// Remove tracking query parameters from `url`.
///
/// Remaining parameters keep their relative order. A URL with nothing to strip
/// is returned byte-for-byte, so the function is idempotent. Unparsable input
/// is logged and returned unchanged.
pub fn clean_url(url: &str) -> String {
    if let Err(e) = Url::parse(url) {
        warn!(url, error = %e, "could not clean URL");
        return url.to_string();
    }

    let (without_fragment, fragment) = match url.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (url, None),
    };
    let Some((base, query)) = without_fragment.split_once('?') else {
        return url.to_string();
    };

    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    let kept: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !is_tracking_param(k)).collect();

    // Nothing removed and a non-empty query: keep the original encoding.
    if kept.len() == pairs.len() && !query.is_empty() {
        return url.to_string();
    }

    let mut cleaned = base.to_string();
    if !kept.is_empty() {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        cleaned.push('?');
        cleaned.push_str(&encoded);
    }
    if let Some(frag) = fragment {
        cleaned.push('#');
        cleaned.push_str(frag);
    }

    debug!(original = url, cleaned = %cleaned, "stripped tracking parameters");
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_utm_parameters() {
        assert_eq!(
            clean_url("https://pub.substack.com/p/slug?utm_source=x"),
            "https://pub.substack.com/p/slug"
        );
        assert_eq!(
            clean_url("https://example.com/a?utm_source=tw&utm_medium=social&utm_campaign=c"),
            "https://example.com/a"
        );
    }

    #[test]
    fn keeps_other_parameters_in_order() {
        assert_eq!(
            clean_url("https://example.com/a?b=2&utm_source=x&a=1&r=abc"),
            "https://example.com/a?b=2&a=1"
        );
    }

    #[test]
    fn key_match_is_case_insensitive() {
        assert_eq!(
            clean_url("https://example.com/a?UTM_Source=x&eType=EmailBlastContent&id=7"),
            "https://example.com/a?id=7"
        );
    }

    #[test]
    fn removes_bare_question_mark() {
        assert_eq!(clean_url("https://example.com/a?"), "https://example.com/a");
    }

    #[test]
    fn preserves_fragment() {
        assert_eq!(
            clean_url("https://example.com/a?fbclid=zzz#section-2"),
            "https://example.com/a#section-2"
        );
    }

    #[test]
    fn untouched_url_is_returned_verbatim() {
        // No trailing slash added, no re-encoding.
        for url in [
            "https://example.com",
            "https://example.com/p/post?id=a%20b",
            "https://www.linkedin.com/feed/update/urn:li:activity:123/",
        ] {
            assert_eq!(clean_url(url), url);
        }
    }

    #[test]
    fn invalid_url_is_returned_unchanged() {
        assert_eq!(clean_url("not a url?utm_source=x"), "not a url?utm_source=x");
    }

    #[test]
    fn normalizing_is_idempotent() {
        for url in [
            "https://pub.substack.com/p/slug?utm_source=x&utm_medium=email&token=a+b",
            "https://example.com/a?s=1&q=rust%20lang#top",
            "https://example.com/a?",
            "https://example.com/",
        ] {
            let once = clean_url(url);
            assert_eq!(clean_url(&once), once, "not idempotent for {url}");
        }
    }

    #[test]
    fn no_tracking_key_survives() {
        let url = "https://example.com/x?utm_term=1&ref=2&Ref_Src=3&gclid=4&keep=5&MSCLKID=6";
        let cleaned = clean_url(url);
        let parsed = Url::parse(&cleaned).unwrap();
        for (key, _) in parsed.query_pairs() {
            assert!(!is_tracking_param(&key), "tracking key {key} survived");
        }
        assert_eq!(cleaned, "https://example.com/x?keep=5");
    }
}
