//! Realtime change feed over the backend's Phoenix-channel websocket.
//!
//! A subscription joins `realtime:<table>` asking for every change on
//! `public.<table>`, keeps the socket alive with a heartbeat every 25 seconds
//! and reconnects with linear backoff when the socket drops. Change events are
//! forwarded over a channel; [`LiveQuery`] turns that stream into a live view
//! of a table by refetching on every event.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::mpsc;
use futures::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::{BackendClient, BackendError};

/// Phoenix protocol version spoken by the backend.
const PROTOCOL_VERSION: &str = "1.0.0";

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_STEPS: u32 = 10;
const EVENT_BUFFER: usize = 64;

// =============================================================================
// Wire codec
// =============================================================================

/// Row-level change type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row change on a subscribed table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    /// New row; `Null` for deletes.
    pub record: Value,
    /// Previous row, when the table publishes it.
    pub old_record: Value,
}

/// A decoded inbound channel message.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A row changed.
    Change(ChangeEvent),
    /// Reply to a join or heartbeat.
    Reply { reference: Option<String>, ok: bool },
    /// The server closed or crashed the channel.
    ChannelClosed { topic: String, reason: String },
    /// Anything else (presence, system notices).
    Other(String),
}

#[derive(Deserialize)]
struct Envelope {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(default, rename = "ref")]
    reference: Option<String>,
}

#[derive(Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Deserialize)]
struct ChangeData {
    table: String,
    #[serde(rename = "type")]
    kind: ChangeKind,
    #[serde(default)]
    record: Value,
    #[serde(default)]
    old_record: Value,
}

/// Topic name for a table subscription.
#[must_use]
pub fn topic(table: &str) -> String {
    format!("realtime:{table}")
}

/// Join a table's change feed. `access_token` lets row-level policies see the user.
#[must_use]
pub fn join_message(table: &str, reference: u64, access_token: Option<&str>) -> String {
    let mut payload = json!({
        "config": {
            "postgres_changes": [
                { "event": "*", "schema": "public", "table": table }
            ]
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = Value::String(token.to_string());
    }
    json!({
        "topic": topic(table),
        "event": "phx_join",
        "payload": payload,
        "ref": reference.to_string(),
        "join_ref": reference.to_string(),
    })
    .to_string()
}

#[must_use]
pub fn heartbeat_message(reference: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string(),
    })
    .to_string()
}

/// Decode one inbound text frame. Returns `None` for frames that are not
/// channel messages at all.
#[must_use]
pub fn decode(text: &str) -> Option<ChannelEvent> {
    let envelope: Envelope = serde_json::from_str(text).ok()?;
    let event = match envelope.event.as_str() {
        "postgres_changes" => {
            let payload: ChangePayload = serde_json::from_value(envelope.payload).ok()?;
            ChannelEvent::Change(ChangeEvent {
                table: payload.data.table,
                kind: payload.data.kind,
                record: payload.data.record,
                old_record: payload.data.old_record,
            })
        }
        "phx_reply" => ChannelEvent::Reply {
            ok: envelope.payload.get("status").and_then(Value::as_str) == Some("ok"),
            reference: envelope.reference,
        },
        "phx_close" | "phx_error" => ChannelEvent::ChannelClosed {
            reason: envelope
                .payload
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or(envelope.event.as_str())
                .to_string(),
            topic: envelope.topic,
        },
        other => ChannelEvent::Other(other.to_string()),
    };
    Some(event)
}

// =============================================================================
// Client
// =============================================================================

/// Opens change-feed subscriptions.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    url: Url,
    access_token: Option<String>,
    heartbeat: Duration,
    reconnect_delay: Duration,
}

impl RealtimeClient {
    /// Derive the websocket endpoint from the backend's URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend URL cannot be turned into a websocket URL.
    pub fn new(backend: &BackendClient) -> Result<Self, BackendError> {
        let mut url = backend.base_url().join("realtime/v1/websocket")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| BackendError::Realtime(format!("cannot use scheme {scheme}")))?;
        url.query_pairs_mut()
            .append_pair("apikey", backend.anon_key())
            .append_pair("vsn", PROTOCOL_VERSION);

        Ok(Self {
            url,
            access_token: None,
            heartbeat: HEARTBEAT_INTERVAL,
            reconnect_delay: RECONNECT_BASE_DELAY,
        })
    }

    /// Send this user token when joining.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Base delay between reconnects; it grows with each consecutive failure.
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    #[must_use]
    pub fn websocket_url(&self) -> &Url {
        &self.url
    }

    /// Subscribe to every change on `table`.
    ///
    /// The connection runs on a background task until the returned
    /// [`Subscription`] is dropped.
    #[must_use]
    pub fn subscribe(&self, table: &'static str) -> Subscription {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = self.clone();
        let task = tokio::spawn(async move { client.run(table, tx).await });
        Subscription { events: rx, task }
    }

    async fn run(self, table: &'static str, mut tx: mpsc::Sender<ChangeEvent>) {
        let mut failures: u32 = 0;
        loop {
            match self.listen(table, &mut tx).await {
                Ok(()) => {
                    failures = 0;
                    tracing::info!(table, "Realtime connection closed");
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(table, error = %e, failures, "Realtime connection failed");
                }
            }
            if tx.is_closed() {
                return;
            }
            let delay = self
                .reconnect_delay
                .saturating_mul(failures.clamp(1, MAX_RECONNECT_STEPS));
            tokio::time::sleep(delay).await;
        }
    }

    async fn listen(
        &self,
        table: &'static str,
        tx: &mut mpsc::Sender<ChangeEvent>,
    ) -> Result<(), BackendError> {
        let (socket, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| BackendError::Realtime(e.to_string()))?;
        let (mut write, mut read) = socket.split();

        let mut reference: u64 = 1;
        write
            .send(Message::Text(join_message(
                table,
                reference,
                self.access_token.as_deref(),
            )))
            .await
            .map_err(|e| BackendError::Realtime(e.to_string()))?;
        tracing::debug!(table, "Joined realtime channel");

        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    reference += 1;
                    write
                        .send(Message::Text(heartbeat_message(reference)))
                        .await
                        .map_err(|e| BackendError::Realtime(e.to_string()))?;
                }
                frame = read.next() => {
                    let Some(frame) = frame else { return Ok(()) };
                    match frame.map_err(|e| BackendError::Realtime(e.to_string()))? {
                        Message::Text(text) => match decode(&text) {
                            Some(ChannelEvent::Change(change)) => {
                                if tx.send(change).await.is_err() {
                                    // Subscriber went away.
                                    return Ok(());
                                }
                            }
                            Some(ChannelEvent::Reply { ok: false, reference }) => {
                                return Err(BackendError::Realtime(format!(
                                    "server rejected message {}",
                                    reference.unwrap_or_default()
                                )));
                            }
                            Some(ChannelEvent::ChannelClosed { topic, reason }) => {
                                return Err(BackendError::Realtime(format!("{topic} closed: {reason}")));
                            }
                            Some(_) => {}
                            None => tracing::debug!(table, "Ignoring undecodable realtime frame"),
                        },
                        Message::Close(_) => return Ok(()),
                        _ => {}
                    }
                }
            }
        }
    }
}

/// A live change-feed subscription. Dropping it closes the connection.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    task: JoinHandle<()>,
}

impl Stream for Subscription {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// LiveQuery
// =============================================================================

/// A table view kept current by refetching on every change event.
///
/// Every event triggers a full refetch; there is no debouncing and the most
/// recent fetch wins. A failed fetch is logged and the previous rows stay
/// published.
#[derive(Debug)]
pub struct LiveQuery<T> {
    rows: watch::Receiver<Vec<T>>,
    task: JoinHandle<()>,
}

impl<T> LiveQuery<T>
where
    T: Send + Sync + 'static,
{
    /// Fetch once, then refetch on every event from `changes`.
    pub async fn start<S, F, Fut, E>(mut changes: S, mut fetch: F) -> Self
    where
        S: Stream<Item = ChangeEvent> + Send + Unpin + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, E>> + Send,
        E: Display,
    {
        let initial = match fetch().await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Initial live query fetch failed");
                Vec::new()
            }
        };
        let (tx, rows) = watch::channel(initial);

        let task = tokio::spawn(async move {
            while let Some(change) = changes.next().await {
                tracing::debug!(table = %change.table, kind = ?change.kind, "Change received, refetching");
                match fetch().await {
                    Ok(fresh) => {
                        if tx.send(fresh).is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Live query refetch failed, keeping last rows"),
                }
            }
        });

        Self { rows, task }
    }

    /// Wait for the next published result. Returns `false` once the feed has ended.
    pub async fn changed(&mut self) -> bool {
        self.rows.changed().await.is_ok()
    }

    /// A receiver for the published rows.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<T>> {
        self.rows.clone()
    }
}

impl<T: Clone> LiveQuery<T> {
    /// The latest rows.
    #[must_use]
    pub fn current(&self) -> Vec<T> {
        self.rows.borrow().clone()
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::net::TcpListener;

    use super::*;
    use crate::config::{BackendConfig, ClientConfig};

    fn change(kind: ChangeKind) -> ChangeEvent {
        ChangeEvent {
            table: "products".to_string(),
            kind,
            record: json!({ "id": 1 }),
            old_record: Value::Null,
        }
    }

    #[test]
    fn test_join_message_shape() {
        let msg: Value = serde_json::from_str(&join_message("products", 1, None)).unwrap();
        assert_eq!(msg["topic"], "realtime:products");
        assert_eq!(msg["event"], "phx_join");
        assert_eq!(msg["ref"], "1");
        assert_eq!(
            msg["payload"]["config"]["postgres_changes"][0],
            json!({ "event": "*", "schema": "public", "table": "products" })
        );
        assert!(msg["payload"].get("access_token").is_none());

        let msg: Value = serde_json::from_str(&join_message("orders", 3, Some("tok"))).unwrap();
        assert_eq!(msg["payload"]["access_token"], "tok");
    }

    #[test]
    fn test_heartbeat_message_shape() {
        let msg: Value = serde_json::from_str(&heartbeat_message(7)).unwrap();
        assert_eq!(
            msg,
            json!({ "topic": "phoenix", "event": "heartbeat", "payload": {}, "ref": "7" })
        );
    }

    #[test]
    fn test_decode_change() {
        let text = json!({
            "topic": "realtime:products",
            "event": "postgres_changes",
            "payload": {
                "data": {
                    "schema": "public",
                    "table": "products",
                    "type": "UPDATE",
                    "record": { "id": 1, "in_stock": false },
                    "old_record": { "id": 1 }
                },
                "ids": [42]
            },
            "ref": null
        })
        .to_string();

        let Some(ChannelEvent::Change(event)) = decode(&text) else {
            panic!("expected a change");
        };
        assert_eq!(event.table, "products");
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.record["in_stock"], false);
        assert_eq!(event.old_record["id"], 1);
    }

    #[test]
    fn test_decode_replies_and_noise() {
        let ok = r#"{"topic":"realtime:products","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#;
        assert_eq!(
            decode(ok),
            Some(ChannelEvent::Reply {
                reference: Some("1".to_string()),
                ok: true
            })
        );

        let closed = r#"{"topic":"realtime:products","event":"phx_error","payload":{},"ref":null}"#;
        assert!(matches!(decode(closed), Some(ChannelEvent::ChannelClosed { .. })));

        let presence = r#"{"topic":"realtime:products","event":"presence_state","payload":{}}"#;
        assert_eq!(
            decode(presence),
            Some(ChannelEvent::Other("presence_state".to_string()))
        );

        assert_eq!(decode("not json"), None);
    }

    #[test]
    fn test_websocket_url_from_backend() {
        let config = ClientConfig::new(BackendConfig::new(
            Url::parse("https://abc.supabase.co").unwrap(),
            "anon",
        ));
        let backend = BackendClient::new(&config).unwrap();
        let realtime = RealtimeClient::new(&backend).unwrap();
        assert_eq!(
            realtime.websocket_url().as_str(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[tokio::test]
    async fn test_subscribe_joins_and_forwards_changes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let Some(Ok(Message::Text(join))) = ws.next().await else {
                panic!("expected join frame");
            };
            let join: Value = serde_json::from_str(&join).unwrap();
            assert_eq!(join["topic"], "realtime:products");

            let change = json!({
                "topic": "realtime:products",
                "event": "postgres_changes",
                "payload": { "data": {
                    "schema": "public", "table": "products", "type": "INSERT",
                    "record": { "id": 9 }, "old_record": null
                }},
                "ref": null
            });
            ws.send(Message::Text(change.to_string())).await.unwrap();
            // Keep the socket open until the client hangs up.
            while ws.next().await.is_some() {}
        });

        let config = ClientConfig::new(BackendConfig::new(
            Url::parse(&format!("http://{addr}")).unwrap(),
            "anon",
        ));
        let backend = BackendClient::new(&config).unwrap();
        let mut subscription = RealtimeClient::new(&backend).unwrap().subscribe("products");

        let event = tokio::time::timeout(Duration::from_secs(5), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.record["id"], 9);

        drop(subscription);
        server.abort();
    }

    #[tokio::test]
    async fn test_live_query_refetches_on_every_event() {
        let (tx, rx) = mpsc::unbounded::<ChangeEvent>();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let mut live = LiveQuery::start(rx, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, String>(vec![n]) }
        })
        .await;
        assert_eq!(live.current(), vec![0]);

        tx.unbounded_send(change(ChangeKind::Insert)).unwrap();
        assert!(live.changed().await);
        assert_eq!(live.current(), vec![1]);

        tx.unbounded_send(change(ChangeKind::Delete)).unwrap();
        assert!(live.changed().await);
        assert_eq!(live.current(), vec![2]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_live_query_keeps_rows_when_refetch_fails() {
        let (tx, rx) = mpsc::unbounded::<ChangeEvent>();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let mut live = LiveQuery::start(rx, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Ok(vec!["first"]),
                    1 => Err("backend down".to_string()),
                    _ => Ok(vec!["third"]),
                }
            }
        })
        .await;

        tx.unbounded_send(change(ChangeKind::Update)).unwrap();
        tx.unbounded_send(change(ChangeKind::Update)).unwrap();
        assert!(live.changed().await);
        assert_eq!(live.current(), vec!["third"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        drop(tx);
        assert!(!live.changed().await);
        assert_eq!(live.current(), vec!["third"]);
    }
}
