//! Record Reconciler.
//!
//! Merges extracted metadata into a record under the item-type field rules,
//! keeping curated values (creators, an already-correct date) in place.

use tracing::{debug, warn};

use citesync_shared::{
    Creator, ExtractedMetadata, ItemType, PROCESSED_TAG, Platform, Record, RecordData,
};

use crate::dates::normalize_date;

/// Structured-data types reconciled as forum posts.
const FORUM_TYPES: &[&str] = &["Comment", "DiscussionForumPosting", "SocialMediaPosting"];

/// Item type for a target node's `@type`.
pub fn resolve_item_type(source_type: &str) -> ItemType {
    if FORUM_TYPES.contains(&source_type) {
        ItemType::ForumPost
    } else {
        ItemType::BlogPost
    }
}

/// Apply `metadata` detected on `platform` to a copy of `record`.
///
/// The returned record never carries both `blogTitle` and `forumTitle`, and
/// gains the processed tag only when some field actually changed.
pub fn prepare_item_update(
    record: &Record,
    metadata: &ExtractedMetadata,
    platform: Platform,
) -> Record {
    let mut updated = record.clone();
    let data = &mut updated.data;

    data.item_type = resolve_item_type(&metadata.source_type);
    data.website_type = Some(platform.marker().to_string());

    if !metadata.title.is_empty() {
        data.title = metadata.title.clone();
    }

    if !metadata.publisher.is_empty() {
        match data.item_type {
            ItemType::ForumPost => data.forum_title = Some(metadata.publisher.clone()),
            _ => data.blog_title = Some(metadata.publisher.clone()),
        }
    }
    data.enforce_title_field();

    reconcile_date(data, &metadata.date);

    if data.creators.is_empty() {
        if let Some(creator) = creator_from_author(&metadata.author) {
            data.creators.push(creator);
        }
    }

    data.add_tag(platform.label());

    if updated.data != record.data {
        updated.data.add_tag(PROCESSED_TAG);
    }

    updated.data.enforce_title_field();
    updated
}

/// Overwrite the date when the extracted one parses and differs.
///
/// An unparsable extracted date only fills an empty field.
fn reconcile_date(data: &mut RecordData, raw: &str) {
    if raw.trim().is_empty() {
        return;
    }

    let new_date = match normalize_date(raw) {
        Ok(date) => date,
        Err(e) => {
            warn!(date = %raw, error = %e, "could not parse extracted date");
            if data.date.trim().is_empty() {
                data.date = raw.to_string();
            }
            return;
        }
    };

    let current = match data.date.trim() {
        "" => None,
        existing => match normalize_date(existing) {
            Ok(date) => Some(date),
            Err(e) => {
                warn!(date = %existing, error = %e, "could not parse existing date");
                None
            }
        },
    };

    if current.as_deref() == Some(new_date.as_str()) {
        debug!(date = %new_date, "dates match, no update needed");
    } else {
        debug!(from = %data.date, to = %new_date, "date will be updated");
        data.date = new_date;
    }
}

/// Split a full name: the last token is the last name, the rest the first.
fn creator_from_author(author: &str) -> Option<Creator> {
    let mut parts: Vec<&str> = author.split_whitespace().collect();
    let last = parts.pop()?;
    Some(Creator::author(parts.join(" "), last))
}
