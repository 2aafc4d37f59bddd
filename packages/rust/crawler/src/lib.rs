//! Page fetching, site classification, and structured-data extraction.
//!
//! This crate provides:
//! - [`normalize`]: tracking-parameter removal for record URLs
//! - [`fetch`]: page download that never fails the caller
//! - [`adapters`]: platform adapters and the [`AdapterRegistry`] classifier
//! - [`extract`]: target-node selection and metadata derivation
//! - [`note`]: title fallback for pages without structured data

pub mod adapters;
pub mod extract;
pub mod fetch;
pub mod jsonld;
pub mod normalize;
pub mod note;

pub use adapters::{
    AdapterRegistry, LinkedInAdapter, PlatformAdapter, SubstackAdapter, check_if_substack,
    get_substack_content_type, is_linkedin, is_linkedin_feed_update, is_substack_domain,
    is_substack_note_url,
};
pub use extract::{TITLE_WORD_LIMIT, extract_metadata, select_target, truncate_words};
pub use fetch::{HttpFetcher, PageFetcher};
pub use normalize::clean_url;
pub use note::extract_note_title;
