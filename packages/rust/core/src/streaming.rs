//! Streaming Update Handler.
//!
//! Holds a websocket subscription to library change notifications and runs
//! the most recently modified records through the pipeline on every update.
//! Changed records are written back one at a time.
//!
//! ```text
//! Disconnected → Connecting → Subscribed ⇄ Processing
//!       ↑______________|__________|  (connection fault)
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, instrument, warn};

use citesync_shared::{
    ChangeNotification, CitesyncError, ItemType, LibraryConfig, Result, RunStats, StreamConfig,
    mask_key,
};
use citesync_storage::RecordStore;

use crate::pipeline::{ProcessOptions, RecordPipeline};

// ---------------------------------------------------------------------------
// Wire protocol
// ---------------------------------------------------------------------------

/// Server → client events. Unknown events are tolerated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    Connected {
        /// Server-advised retry interval in milliseconds.
        #[serde(default)]
        retry: Option<u64>,
    },
    SubscriptionsCreated {
        #[serde(default)]
        errors: Vec<serde_json::Value>,
    },
    TopicUpdated(ChangeNotification),
    #[serde(other)]
    Other,
}

impl ServerEvent {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| CitesyncError::parse(format!("invalid stream message: {e}")))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeRequest<'a> {
    action: &'static str,
    subscriptions: [Subscription<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Subscription<'a> {
    api_key: &'a str,
    topics: [&'a str; 1],
}

fn subscribe_message(api_key: &str, topic: &str) -> Result<String> {
    let request = SubscribeRequest {
        action: "createSubscriptions",
        subscriptions: [Subscription {
            api_key,
            topics: [topic],
        }],
    };
    serde_json::to_string(&request)
        .map_err(|e| CitesyncError::stream(format!("cannot encode subscription: {e}")))
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// One open streaming connection exchanging JSON text frames.
#[async_trait]
pub trait StreamConnection: Send {
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next text frame. `Err(ConnectionClosed)` once the peer has gone away.
    async fn recv(&mut self) -> Result<String>;
}

/// Opens streaming connections.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn StreamConnection>>;
}

/// Websocket transport over `tokio-tungstenite`.
pub struct WsTransport;

#[async_trait]
impl StreamTransport for WsTransport {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn StreamConnection>> {
        let (socket, _response) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| CitesyncError::Network(format!("{endpoint}: {e}")))?;
        Ok(Box::new(WsConnection { socket }))
    }
}

struct WsConnection {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamConnection for WsConnection {
    async fn send(&mut self, text: String) -> Result<()> {
        self.socket
            .send(Message::Text(text))
            .await
            .map_err(map_ws_error)
    }

    async fn recv(&mut self) -> Result<String> {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Close(_))) | None => return Err(CitesyncError::ConnectionClosed),
                // Pings are answered by tungstenite on the next read.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(map_ws_error(e)),
            }
        }
    }
}

fn map_ws_error(e: tungstenite::Error) -> CitesyncError {
    match e {
        tungstenite::Error::ConnectionClosed
        | tungstenite::Error::AlreadyClosed
        | tungstenite::Error::Io(_)
        | tungstenite::Error::Protocol(_) => CitesyncError::ConnectionClosed,
        other => CitesyncError::stream(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Exponential backoff with a bounded, resettable attempt counter.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    initial: Duration,
    max_delay: Duration,
    multiplier: u32,
    max_attempts: u32,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            max_delay,
            multiplier: 2,
            max_attempts: max_attempts.max(1),
            attempt: 0,
        }
    }

    /// Record a failed attempt. Returns the wait before the next one, or
    /// `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }
        let factor = self.multiplier.saturating_pow(self.attempt - 1);
        Some(self.initial.saturating_mul(factor).min(self.max_delay))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Failed attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60), 10)
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Subscribed,
    Processing,
}

/// Long-lived subscriber applying the pipeline to each change notification.
pub struct StreamHandler<'a> {
    store: &'a dyn RecordStore,
    pipeline: RecordPipeline<'a>,
    transport: &'a dyn StreamTransport,
    library: LibraryConfig,
    endpoint: String,
    recent_window: usize,
    options: ProcessOptions,
    backoff: ReconnectBackoff,
    connection: Option<Box<dyn StreamConnection>>,
    state: StreamState,
    topics: BTreeSet<String>,
    retry_delay: Duration,
    stats: RunStats,
}

impl<'a> StreamHandler<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        pipeline: RecordPipeline<'a>,
        transport: &'a dyn StreamTransport,
        library: LibraryConfig,
        config: &StreamConfig,
    ) -> Self {
        Self {
            store,
            pipeline,
            transport,
            library,
            endpoint: config.endpoint.clone(),
            recent_window: config.recent_window,
            options: ProcessOptions::default(),
            backoff: ReconnectBackoff::new(
                Duration::from_secs(1),
                Duration::from_secs(60),
                config.max_connect_attempts,
            ),
            connection: None,
            state: StreamState::Disconnected,
            topics: BTreeSet::new(),
            retry_delay: Duration::from_millis(config.default_retry_ms),
            stats: RunStats::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: ReconnectBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_options(mut self, options: ProcessOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Supervisor sleep after a fault, as last advised by the server.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(String::as_str)
    }

    /// Open a connection and wait for the `connected` handshake.
    ///
    /// Failed attempts (including a wrong handshake) are retried with
    /// exponential backoff until the attempt budget is spent.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn connect(&mut self) -> Result<()> {
        self.state = StreamState::Connecting;
        self.connection = None;
        self.backoff.reset();

        loop {
            match self.handshake().await {
                Ok((connection, retry_ms)) => {
                    if let Some(ms) = retry_ms {
                        self.retry_delay = Duration::from_millis(ms);
                    }
                    self.connection = Some(connection);
                    self.backoff.reset();
                    info!(retry_ms = self.retry_delay.as_millis() as u64, "connected to streaming API");
                    return Ok(());
                }
                Err(e) => match self.backoff.next_delay() {
                    Some(delay) => {
                        warn!(
                            attempt = self.backoff.attempts(),
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "connection attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(attempts = self.backoff.attempts(), error = %e, "giving up on connection");
                        self.state = StreamState::Disconnected;
                        return Err(e);
                    }
                },
            }
        }
    }

    async fn handshake(&self) -> Result<(Box<dyn StreamConnection>, Option<u64>)> {
        let mut connection = self.transport.connect(&self.endpoint).await?;
        let reply = connection.recv().await?;
        match ServerEvent::parse(&reply)? {
            ServerEvent::Connected { retry } => Ok((connection, retry)),
            other => Err(CitesyncError::stream(format!("unexpected handshake: {other:?}"))),
        }
    }

    /// Subscribe to the library's topic and wait for the acknowledgement.
    pub async fn subscribe(&mut self) -> Result<()> {
        let topic = self.library.topic();
        let message = subscribe_message(&self.library.api_key, &topic)?;
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| CitesyncError::stream("subscribe before connect"))?;

        connection.send(message).await?;
        let reply = connection.recv().await?;

        match ServerEvent::parse(&reply)? {
            ServerEvent::SubscriptionsCreated { errors } if errors.is_empty() => {
                info!(topic = %topic, api_key = %mask_key(&self.library.api_key), "subscribed to updates");
                self.topics.insert(topic);
                self.state = StreamState::Subscribed;
                Ok(())
            }
            ServerEvent::SubscriptionsCreated { errors } => Err(CitesyncError::stream(format!(
                "subscription rejected: {}",
                serde_json::Value::Array(errors)
            ))),
            other => Err(CitesyncError::stream(format!(
                "unexpected subscription reply: {other:?}"
            ))),
        }
    }

    /// Receive loop.
    ///
    /// A closed connection is recovered inline with one `connect` +
    /// `subscribe`; any other fault is returned to the supervisor.
    pub async fn process_updates(&mut self) -> Result<()> {
        loop {
            let message = match self.recv().await {
                Ok(message) => message,
                Err(e) if e.is_connection_closed() => {
                    warn!("connection closed, reconnecting");
                    self.connect().await?;
                    self.subscribe().await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match ServerEvent::parse(&message) {
                Ok(ServerEvent::TopicUpdated(notification))
                    if self.topics.contains(&notification.topic) =>
                {
                    self.handle_update(&notification).await;
                }
                Ok(ServerEvent::TopicUpdated(notification)) => {
                    debug!(topic = %notification.topic, "update for another topic ignored");
                }
                Ok(event) => debug!(?event, "ignoring stream event"),
                Err(e) => warn!(error = %e, "skipping unreadable stream message"),
            }
        }
    }

    async fn recv(&mut self) -> Result<String> {
        match self.connection.as_mut() {
            Some(connection) => connection.recv().await,
            None => Err(CitesyncError::stream("receive before connect")),
        }
    }

    /// Run the recent window through the pipeline, writing back one by one.
    #[instrument(skip_all, fields(topic = %notification.topic, version = notification.version))]
    async fn handle_update(&mut self, notification: &ChangeNotification) {
        info!("received library update");
        self.state = StreamState::Processing;

        match self.store.recent_records(self.recent_window).await {
            Ok(records) => {
                let web_records = records.iter().filter(|r| {
                    ItemType::LISTED.contains(&r.data.item_type) && !r.data.url.trim().is_empty()
                });
                for record in web_records {
                    self.stats.processed += 1;
                    let outcome = match self.pipeline.process_record(record, &self.options).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(key = %record.key, error = %e, "error processing record");
                            self.stats.errors += 1;
                            continue;
                        }
                    };
                    outcome.tally(&mut self.stats);

                    let Some(updated) = outcome.update else {
                        continue;
                    };
                    match self.store.update_record(&updated).await {
                        Ok(()) => {
                            self.stats.updated += 1;
                            info!(title = %updated.title_preview(50), "updated record");
                        }
                        Err(e) => {
                            self.stats.errors += 1;
                            error!(key = %updated.key, error = %e, "error updating record");
                        }
                    }
                }
            }
            Err(e) => {
                self.stats.errors += 1;
                error!(error = %e, "failed to fetch recent records");
            }
        }

        self.state = StreamState::Subscribed;
    }

    /// One supervisor pass: connect and subscribe if needed, then receive
    /// until a fault the receive loop cannot absorb.
    pub async fn supervise_once(&mut self) -> Result<()> {
        let result = self.connect_and_process().await;
        if result.is_err() {
            self.connection = None;
            self.state = StreamState::Disconnected;
        }
        result
    }

    async fn connect_and_process(&mut self) -> Result<()> {
        if self.connection.is_none() || self.state == StreamState::Disconnected {
            self.connect().await?;
            self.subscribe().await?;
        }
        self.process_updates().await
    }

    /// Supervisory loop. Faults are logged and followed by the server-advised
    /// retry sleep; only process shutdown ends it.
    pub async fn run(&mut self) {
        loop {
            if let Err(e) = self.supervise_once().await {
                error!(
                    error = %e,
                    retry_ms = self.retry_delay.as_millis() as u64,
                    "error in streaming handler"
                );
                tokio::time::sleep(self.retry_delay).await;
            }
        }
    }
}
