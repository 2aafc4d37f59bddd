//! Batch Orchestrator: page through the library, run every record through the
//! pipeline, and write changes back in bounded batches.
//!
//! Fully sequential. One record is processed to completion before the next,
//! and one flush is acknowledged (or failed) before processing continues.

use tracing::{debug, error, info, instrument, warn};

use citesync_shared::{BatchConfig, ItemType, Platform, Record, Result, RunStats};
use citesync_storage::{MAX_BATCH_SIZE, RecordStore};

use crate::pipeline::{ProcessOptions, RecordPipeline};

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Analyze only; never write to the store.
    pub dry_run: bool,
    /// Skip the confirmation prompt.
    pub auto_confirm: bool,
    pub process: ProcessOptions,
    pub page_size: usize,
    /// Buffered updates that trigger a flush. Capped at the store's write limit.
    pub flush_threshold: usize,
    /// Records between progress log lines.
    pub progress_interval: usize,
}

impl BatchOptions {
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            dry_run: false,
            auto_confirm: false,
            process: ProcessOptions::default(),
            page_size: config.page_size,
            flush_threshold: config.flush_threshold,
            progress_interval: config.progress_interval,
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&BatchConfig::default())
    }
}

/// One changed record, kept for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordChange {
    pub original: Record,
    pub updated: Record,
    pub platform: Option<Platform>,
}

/// Result of a batch run.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub stats: RunStats,
    /// Every changed record, in processing order (dry runs included).
    pub changes: Vec<RecordChange>,
    /// Number of records with a URL that were considered.
    pub total: usize,
    /// The user declined the confirmation prompt; nothing was touched.
    pub cancelled: bool,
}

/// Asks the user before anything is mutated.
pub trait ConfirmPrompt: Send + Sync {
    fn confirm(&self, question: &str) -> bool;
}

/// Progress callback for reporting batch status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each record.
    fn record_processed(&self, current: usize, total: usize, title: &str);
    /// Called when the run completes.
    fn done(&self, stats: &RunStats);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_processed(&self, _current: usize, _total: usize, _title: &str) {}
    fn done(&self, _stats: &RunStats) {}
}

/// Run the whole library through the pipeline.
///
/// Listing failures abort the run before any record is touched. After that,
/// per-record and flush failures are counted in the statistics and the run
/// carries on.
#[instrument(skip_all, fields(dry_run = options.dry_run, force = options.process.force))]
pub async fn run_batch(
    store: &dyn RecordStore,
    pipeline: &RecordPipeline<'_>,
    options: &BatchOptions,
    confirm: &dyn ConfirmPrompt,
    progress: &dyn ProgressReporter,
) -> Result<BatchResult> {
    progress.phase("Retrieving records");
    let records = collect_records(store, options.page_size).await?;
    let total = records.len();
    info!(total, "found web items to process");

    if !options.auto_confirm && !confirm.confirm(&confirm_question(total, options.dry_run)) {
        warn!("operation cancelled by user");
        return Ok(BatchResult {
            total,
            cancelled: true,
            ..BatchResult::default()
        });
    }

    progress.phase("Processing records");
    let threshold = options.flush_threshold.clamp(1, MAX_BATCH_SIZE);
    let interval = options.progress_interval.max(1);

    let mut stats = RunStats::default();
    let mut changes = Vec::new();
    let mut buffer: Vec<Record> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match pipeline.process_record(record, &options.process).await {
            Ok(outcome) => {
                outcome.tally(&mut stats);
                if let Some(updated) = outcome.update {
                    if !options.dry_run {
                        buffer.push(updated.clone());
                    }
                    changes.push(RecordChange {
                        original: record.clone(),
                        updated,
                        platform: outcome.detected,
                    });
                }
            }
            Err(e) => {
                error!(key = %record.key, error = %e, "error processing record");
                stats.errors += 1;
            }
        }

        let is_last = index + 1 == total;
        if !buffer.is_empty() && (buffer.len() >= threshold || is_last) {
            flush(store, &mut buffer, &mut stats).await;
        }

        stats.processed += 1;
        progress.record_processed(stats.processed, total, &record.title_preview(50));
        if stats.processed % interval == 0 || is_last {
            debug!(
                processed = stats.processed,
                total,
                urls_cleaned = stats.urls_cleaned,
                substack = stats.substack_found,
                linkedin = stats.linkedin_found,
                updated = stats.updated,
                "progress"
            );
        }
    }

    progress.done(&stats);
    info!(
        processed = stats.processed,
        urls_cleaned = stats.urls_cleaned,
        substack = stats.substack_found,
        linkedin = stats.linkedin_found,
        updated = stats.updated,
        errors = stats.errors,
        "analysis complete"
    );

    Ok(BatchResult {
        stats,
        changes,
        total,
        cancelled: false,
    })
}

/// All listed item types, page by page, keeping records that carry a URL.
async fn collect_records(store: &dyn RecordStore, page_size: usize) -> Result<Vec<Record>> {
    let page_size = page_size.max(1);
    let mut records = Vec::new();

    for item_type in &ItemType::LISTED {
        let mut start = 0;
        loop {
            let page = store.list_records(item_type, start, page_size).await?;
            let count = page.len();
            records.extend(page);
            if count < page_size {
                break;
            }
            start += count;
        }
        debug!(item_type = %item_type, total = records.len(), "listing complete");
    }

    records.retain(|r| !r.data.url.trim().is_empty());
    Ok(records)
}

fn confirm_question(total: usize, dry_run: bool) -> String {
    if dry_run {
        format!("Analyze {total} items? (Dry run, no changes will be made) (y/n): ")
    } else {
        format!("Process and update {total} items? (This will update your Zotero database directly) (y/n): ")
    }
}

/// Write the buffer in one call. A failure counts the whole buffer as errors;
/// the buffer is cleared either way.
async fn flush(store: &dyn RecordStore, buffer: &mut Vec<Record>, stats: &mut RunStats) {
    let count = buffer.len();
    info!(count, "batch updating");
    match store.update_records(buffer).await {
        Ok(()) => {
            stats.updated += count;
            info!(count, "batch update succeeded");
        }
        Err(e) => {
            error!(count, error = %e, "batch update failed");
            stats.errors += count;
        }
    }
    buffer.clear();
}
