//! Record store access.
//!
//! The [`RecordStore`] trait is the single seam between the pipeline and the
//! bibliographic library. [`ZoteroStore`] implements it over the Zotero Web
//! API v3.
//!
//! A store has exactly one owner per process run: either the batch
//! orchestrator or the streaming handler.

mod zotero;

use async_trait::async_trait;
use citesync_shared::{ItemType, Record, Result};

pub use zotero::{API_VERSION, MAX_BATCH_SIZE, ZoteroStore};

/// Paginated listing and write-back of records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// One page of records of `item_type`. A page shorter than `limit` is the last.
    async fn list_records(&self, item_type: &ItemType, start: usize, limit: usize)
    -> Result<Vec<Record>>;

    /// The `limit` most recently modified records, newest first.
    async fn recent_records(&self, limit: usize) -> Result<Vec<Record>>;

    /// Write back a single record.
    async fn update_record(&self, record: &Record) -> Result<()>;

    /// Write back several records in one call. Fails as a whole.
    async fn update_records(&self, records: &[Record]) -> Result<()>;
}
