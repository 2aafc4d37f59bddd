//! Zotero Web API v3 client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use citesync_shared::{
    CitesyncError, ItemType, LibraryConfig, Record, Result, StoreConfig, mask_key,
};

use crate::RecordStore;

/// Value of the `Zotero-API-Version` header.
pub const API_VERSION: &str = "3";

/// Largest write the API accepts in one request.
pub const MAX_BATCH_SIZE: usize = 50;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// HTTP client bound to one library.
pub struct ZoteroStore {
    client: Client,
    /// `<base>/users/<id>` or `<base>/groups/<id>`.
    prefix: String,
    api_key: String,
}

impl ZoteroStore {
    pub fn new(store: &StoreConfig, library: &LibraryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| CitesyncError::Network(format!("failed to build HTTP client: {e}")))?;

        let prefix = format!("{}{}", store.base_url.trim_end_matches('/'), library.topic());
        info!(
            api_key = %mask_key(&library.api_key),
            kind = library.kind.path_segment(),
            library_id = %library.library_id,
            "connecting to record store"
        );

        Ok(Self {
            client,
            prefix,
            api_key: library.api_key.clone(),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Zotero-API-Key", &self.api_key)
            .header("Zotero-API-Version", API_VERSION)
    }

    async fn get_items(&self, query: &[(&str, String)]) -> Result<Vec<Record>> {
        let url = format!("{}/items", self.prefix);
        let response = self
            .authorized(self.client.get(&url).query(query))
            .send()
            .await
            .map_err(|e| CitesyncError::Network(format!("{url}: {e}")))?;

        let response = check_status(&url, response).await?;
        response
            .json::<Vec<Record>>()
            .await
            .map_err(|e| CitesyncError::Storage(format!("{url}: invalid item list: {e}")))
    }
}

#[async_trait]
impl RecordStore for ZoteroStore {
    #[instrument(skip_all, fields(item_type = %item_type, start, limit))]
    async fn list_records(
        &self,
        item_type: &ItemType,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let records = self
            .get_items(&[
                ("itemType", item_type.as_str().to_string()),
                ("start", start.to_string()),
                ("limit", limit.to_string()),
            ])
            .await?;
        debug!(count = records.len(), "page retrieved");
        Ok(records)
    }

    async fn recent_records(&self, limit: usize) -> Result<Vec<Record>> {
        self.get_items(&[
            ("limit", limit.to_string()),
            ("sort", "dateModified".to_string()),
            ("direction", "desc".to_string()),
        ])
        .await
    }

    #[instrument(skip_all, fields(key = %record.key))]
    async fn update_record(&self, record: &Record) -> Result<()> {
        let url = format!("{}/items/{}", self.prefix, record.key);
        let response = self
            .authorized(self.client.patch(&url))
            .header("If-Unmodified-Since-Version", record.version.to_string())
            .json(&write_payload(record)?)
            .send()
            .await
            .map_err(|e| CitesyncError::Network(format!("{url}: {e}")))?;

        check_status(&url, response).await?;
        debug!("record updated");
        Ok(())
    }

    #[instrument(skip_all, fields(count = records.len()))]
    async fn update_records(&self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        if records.len() > MAX_BATCH_SIZE {
            return Err(CitesyncError::validation(format!(
                "batch of {} exceeds the {MAX_BATCH_SIZE}-record write limit",
                records.len()
            )));
        }

        let payload = records
            .iter()
            .map(write_payload)
            .collect::<Result<Vec<_>>>()?;

        let url = format!("{}/items", self.prefix);
        let response = self
            .authorized(self.client.post(&url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| CitesyncError::Network(format!("{url}: {e}")))?;

        let response = check_status(&url, response).await?;
        let outcome: WriteOutcome = response
            .json()
            .await
            .map_err(|e| CitesyncError::Storage(format!("{url}: invalid write response: {e}")))?;

        if !outcome.failed.is_empty() {
            let detail = outcome
                .failed
                .values()
                .filter_map(|f| f.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CitesyncError::Storage(format!(
                "{} of {} records rejected: {detail}",
                outcome.failed.len(),
                records.len()
            )));
        }

        Ok(())
    }
}

/// Per-index results of a multi-object write.
#[derive(Debug, Default, Deserialize)]
struct WriteOutcome {
    #[serde(default)]
    failed: Map<String, Value>,
}

/// Item data with `key` and `version` set, as the write endpoints expect.
fn write_payload(record: &Record) -> Result<Value> {
    let mut data = serde_json::to_value(&record.data)
        .map_err(|e| CitesyncError::Storage(format!("{}: cannot serialize: {e}", record.key)))?;

    if let Value::Object(map) = &mut data {
        map.insert("key".into(), Value::String(record.key.clone()));
        map.insert("version".into(), Value::from(record.version));
    }
    Ok(data)
}

async fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CitesyncError::Storage(format!(
        "{url}: HTTP {status}: {}",
        body.trim()
    )))
}
