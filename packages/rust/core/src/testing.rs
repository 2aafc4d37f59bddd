//! In-memory fakes of the store, fetcher, prompt and stream transport.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use citesync_crawler::PageFetcher;
use citesync_shared::{CitesyncError, ItemType, Record, Result};
use citesync_storage::RecordStore;

use crate::batch::ConfirmPrompt;
use crate::streaming::{StreamConnection, StreamTransport};

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> String {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    listings: HashMap<String, Vec<Record>>,
    recent: Vec<Record>,
    failing_batches: HashSet<usize>,
    list_calls: Mutex<Vec<(String, usize, usize)>>,
    recent_calls: Mutex<usize>,
    batch_calls: Mutex<usize>,
    batch_writes: Mutex<Vec<Vec<Record>>>,
    single_writes: Mutex<Vec<Record>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(mut self, item_type: ItemType, records: Vec<Record>) -> Self {
        self.listings.insert(item_type.as_str().to_string(), records);
        self
    }

    pub fn with_recent(mut self, records: Vec<Record>) -> Self {
        self.recent = records;
        self
    }

    /// Make the `n`th batch write (0-based) fail.
    pub fn failing_batch(mut self, n: usize) -> Self {
        self.failing_batches.insert(n);
        self
    }

    pub fn list_calls(&self) -> Vec<(String, usize, usize)> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn recent_calls(&self) -> usize {
        *self.recent_calls.lock().unwrap()
    }

    /// Successful batch writes only.
    pub fn batch_writes(&self) -> Vec<Vec<Record>> {
        self.batch_writes.lock().unwrap().clone()
    }

    pub fn single_writes(&self) -> Vec<Record> {
        self.single_writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn list_records(&self, item_type: &ItemType, start: usize, limit: usize) -> Result<Vec<Record>> {
        self.list_calls
            .lock()
            .unwrap()
            .push((item_type.as_str().to_string(), start, limit));
        let all = self.listings.get(item_type.as_str()).map(Vec::as_slice).unwrap_or_default();
        Ok(all.iter().skip(start).take(limit).cloned().collect())
    }

    async fn recent_records(&self, limit: usize) -> Result<Vec<Record>> {
        *self.recent_calls.lock().unwrap() += 1;
        Ok(self.recent.iter().take(limit).cloned().collect())
    }

    async fn update_record(&self, record: &Record) -> Result<()> {
        self.single_writes.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn update_records(&self, records: &[Record]) -> Result<()> {
        let call = {
            let mut calls = self.batch_calls.lock().unwrap();
            *calls += 1;
            *calls - 1
        };
        if self.failing_batches.contains(&call) {
            return Err(CitesyncError::Storage("simulated write failure".into()));
        }
        self.batch_writes.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

pub struct ScriptedConfirm {
    answer: bool,
    questions: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

impl ConfirmPrompt for ScriptedConfirm {
    fn confirm(&self, question: &str) -> bool {
        self.questions.lock().unwrap().push(question.to_string());
        self.answer
    }
}

// ---------------------------------------------------------------------------
// Stream transport
// ---------------------------------------------------------------------------

/// What a scripted connection yields on each `recv`.
#[derive(Debug, Clone)]
pub enum Frame {
    Text(String),
    Closed,
}

impl Frame {
    pub fn text(json: serde_json::Value) -> Self {
        Self::Text(json.to_string())
    }
}

/// Hands out scripted connections in order; `None` entries fail to connect.
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<VecDeque<Option<Vec<Frame>>>>,
    connects: Mutex<usize>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(self, frames: Vec<Frame>) -> Self {
        self.scripts.lock().unwrap().push_back(Some(frames));
        self
    }

    pub fn refused(self) -> Self {
        self.scripts.lock().unwrap().push_back(None);
        self
    }

    pub fn connects(&self) -> usize {
        *self.connects.lock().unwrap()
    }

    /// Every frame sent, across all connections.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamTransport for FakeTransport {
    async fn connect(&self, _endpoint: &str) -> Result<Box<dyn StreamConnection>> {
        *self.connects.lock().unwrap() += 1;
        match self.scripts.lock().unwrap().pop_front() {
            Some(Some(frames)) => Ok(Box::new(FakeConnection {
                frames: frames.into(),
                sent: Arc::clone(&self.sent),
            })),
            Some(None) => Err(CitesyncError::Network("connection refused".into())),
            None => Err(CitesyncError::Network("no more scripted connections".into())),
        }
    }
}

struct FakeConnection {
    frames: VecDeque<Frame>,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl StreamConnection for FakeConnection {
    async fn send(&mut self, text: String) -> Result<()> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Result<String> {
        match self.frames.pop_front() {
            Some(Frame::Text(text)) => Ok(text),
            Some(Frame::Closed) => Err(CitesyncError::ConnectionClosed),
            None => Err(CitesyncError::stream("script exhausted")),
        }
    }
}
