//! Per-record pipeline: normalize → classify → extract → reconcile.
//!
//! Shared by the batch orchestrator and the streaming handler; only delivery
//! and write-back differ between the two.

use tracing::{debug, info, instrument, warn};
use url::Url;

use citesync_crawler::{
    AdapterRegistry, PageFetcher, clean_url, extract_metadata, extract_note_title, is_linkedin,
};
use citesync_shared::{
    CitesyncError, ContentSubtype, ContentType, PROCESSED_TAG, Platform, Record, Result, RunStats,
};

use crate::reconcile::prepare_item_update;

/// Per-run switches for the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Re-detect records already carrying the processed tag.
    pub force: bool,
    /// Skip detection for every non-LinkedIn URL.
    pub skip_substack: bool,
    /// Skip detection for LinkedIn URLs.
    pub skip_linkedin: bool,
}

/// What one pipeline pass produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    /// The record to write back, if any field changed.
    pub update: Option<Record>,
    pub detected: Option<Platform>,
    pub url_cleaned: bool,
}

impl RecordOutcome {
    /// Fold this outcome's detections into running counters.
    pub fn tally(&self, stats: &mut RunStats) {
        if self.url_cleaned {
            stats.urls_cleaned += 1;
        }
        if let Some(platform) = self.detected {
            stats.record_detection(platform);
        }
    }
}

/// The normalize → classify → extract → reconcile chain.
pub struct RecordPipeline<'a> {
    fetcher: &'a dyn PageFetcher,
    registry: AdapterRegistry,
}

impl<'a> RecordPipeline<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher) -> Self {
        Self {
            fetcher,
            registry: AdapterRegistry::new(),
        }
    }

    /// Run one record through the pipeline.
    ///
    /// Page problems (unfetchable URL, empty or unrecognised page) degrade
    /// to "no detection"; URL cleaning still applies.
    #[instrument(skip_all, fields(key = %record.key))]
    pub async fn process_record(
        &self,
        record: &Record,
        options: &ProcessOptions,
    ) -> Result<RecordOutcome> {
        let mut working = record.clone();
        let title = record.title_preview(50);

        let url = clean_url(&record.data.url);
        let url_cleaned = url != record.data.url;
        if url_cleaned {
            debug!(from = %record.data.url, to = %url, "cleaned URL");
            working.data.url = url.clone();
        }

        let mut detected = None;
        if record.data.has_tag(PROCESSED_TAG) && !options.force {
            warn!(title = %title, "already processed");
        } else if let Some(reason) = excluded(&url, options) {
            debug!(title = %title, reason, "detection skipped");
        } else if let Err(e) = check_fetchable(&url) {
            warn!(title = %title, error = %e, "page cannot be fetched, detection skipped");
        } else {
            let html = self.fetcher.fetch(&url).await;
            let classification = self.registry.classify(&url, &html);

            if let Some(platform) = classification.platform {
                info!(platform = %platform, title = %title, "platform detected");
                let mut metadata = extract_metadata(&html, &url);

                if let Some(subtype) = classification.content_subtype {
                    metadata.content_type = match subtype {
                        ContentSubtype::Note => ContentType::Note,
                        ContentSubtype::Chat => ContentType::Chat,
                    };
                    if metadata.title.is_empty() {
                        metadata.title = extract_note_title(&html);
                    }
                }

                working = prepare_item_update(&working, &metadata, platform);
                log_changes(record, &working);
                detected = Some(platform);
            } else {
                debug!(title = %title, "not a Substack or LinkedIn page");
            }
        }

        if working.data != record.data {
            working.data.add_tag(PROCESSED_TAG);
        }

        let update = (working.data != record.data).then_some(working);
        Ok(RecordOutcome {
            update,
            detected,
            url_cleaned,
        })
    }
}

/// Reason detection is switched off for this URL, if it is.
fn excluded(url: &str, options: &ProcessOptions) -> Option<&'static str> {
    let linkedin = is_linkedin(url);
    if options.skip_linkedin && linkedin {
        Some("linkedin excluded")
    } else if options.skip_substack && !linkedin {
        Some("substack excluded")
    } else {
        None
    }
}

fn check_fetchable(url: &str) -> Result<()> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(parsed) => Err(CitesyncError::validation(format!(
            "unsupported URL scheme '{}' in {url}",
            parsed.scheme()
        ))),
        Err(e) => Err(CitesyncError::validation(format!("invalid URL '{url}': {e}"))),
    }
}

fn log_changes(before: &Record, after: &Record) {
    let (old, new) = (&before.data, &after.data);
    if old.item_type != new.item_type {
        info!(from = %old.item_type, to = %new.item_type, "type");
    }
    if old.title != new.title {
        info!(from = %old.title, to = %new.title, "title");
    }
    if old.date != new.date {
        info!(from = %old.date, to = %new.date, "date");
    }
    if old.creators != new.creators {
        let authors: Vec<String> = new.creators.iter().map(|c| c.display_name()).collect();
        info!(to = %authors.join(", "), "authors");
    }
    if old.container_title() != new.container_title() {
        info!(to = new.container_title().unwrap_or_default(), "publication");
    }
}
