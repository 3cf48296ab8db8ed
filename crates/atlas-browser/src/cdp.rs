//! Low-level CDP (Chrome DevTools Protocol) WebSocket client.
//!
//! Connects to a running Chrome/Chromium instance via its DevTools WebSocket
//! endpoint and provides JSON-RPC 2.0 command/response correlation with
//! method-keyed event subscriptions: callers subscribe to an event name and
//! receive a channel that the reader task feeds in arrival order.
//!
//! This module handles:
//! - WebSocket connection management
//! - Command ID generation and request/response correlation
//! - Event routing to per-method subscription channels
//! - Timeout handling for commands

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::SessionError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Registry of event subscriptions: event method name -> channel senders.
///
/// Only the reader task writes into the channels, so each receiver observes
/// events in the order the browser emitted them.
type SubscriptionMap = Arc<StdMutex<HashMap<String, Vec<mpsc::UnboundedSender<CdpEvent>>>>>;

/// A CDP event received from the browser.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// The event method name (e.g. "Debugger.scriptParsed").
    pub method: String,
    /// The event parameters.
    pub params: Value,
}

/// A CDP command to send to the browser.
#[derive(Debug, Clone, serde::Serialize)]
struct CdpCommand {
    id: u64,
    method: String,
    params: Value,
}

/// A CDP response from the browser.
#[derive(Debug, Clone)]
pub struct CdpResponse {
    /// The command ID this response correlates to.
    pub id: u64,
    /// The result value on success.
    pub result: Option<Value>,
    /// The error object on failure.
    pub error: Option<CdpResponseError>,
}

/// Error object in a CDP response.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CdpResponseError {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

// ---------------------------------------------------------------------------
// CdpClient
// ---------------------------------------------------------------------------

/// Default timeout applied to commands sent via [`CdpClient::send_command`].
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Low-level CDP client that manages a WebSocket connection to Chrome DevTools.
///
/// Commands are sent with auto-incrementing IDs and responses are correlated
/// back to the caller. Events are routed to subscription channels keyed by
/// event method name; see [`CdpClient::subscribe`].
pub struct CdpClient {
    /// Auto-incrementing command ID counter.
    next_id: Arc<AtomicU64>,
    /// Pending commands awaiting responses: id -> oneshot sender.
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>>,
    /// Event subscriptions fed by the reader task.
    subscriptions: SubscriptionMap,
    /// WebSocket write half, wrapped in a mutex for shared access.
    writer: Arc<Mutex<WsSink>>,
    /// Timeout applied to `send_command`.
    command_timeout: Duration,
    /// Handle to the background reader task.
    _reader_handle: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a Chrome DevTools WebSocket endpoint.
    ///
    /// The `ws_url` should be of the form:
    /// `ws://localhost:{port}/devtools/page/{target_id}`,
    /// as listed by Chrome's `/json` HTTP endpoint.
    pub async fn connect(ws_url: &str) -> Result<Self, SessionError> {
        tracing::info!(url = ws_url, "connecting to Chrome DevTools WebSocket");

        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| SessionError::ConnectionFailed {
                url: ws_url.to_string(),
                reason: e.to_string(),
            })?;

        let (writer, reader) = ws_stream.split();

        let next_id = Arc::new(AtomicU64::new(1));
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let subscriptions: SubscriptionMap = Arc::new(StdMutex::new(HashMap::new()));

        let pending_clone = Arc::clone(&pending);
        let subscriptions_clone = Arc::clone(&subscriptions);
        let reader_handle = tokio::spawn(async move {
            Self::read_loop(reader, pending_clone, subscriptions_clone).await;
        });

        tracing::info!(url = ws_url, "CDP WebSocket connection established");

        Ok(Self {
            next_id,
            pending,
            subscriptions,
            writer: Arc::new(Mutex::new(writer)),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            _reader_handle: reader_handle,
        })
    }

    /// Override the default timeout applied to [`CdpClient::send_command`].
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Subscribe to a CDP event by method name.
    ///
    /// Returns a channel receiver fed by the reader task. Events of the given
    /// method are delivered in the order the browser emitted them. Dropping
    /// the receiver unsubscribes; the registry entry is pruned on the next
    /// dispatch. The channel closes when the WebSocket connection drops.
    pub fn subscribe(&self, method: &str) -> mpsc::UnboundedReceiver<CdpEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.subscriptions.lock().expect("subscription lock poisoned");
        subs.entry(method.to_string()).or_default().push(tx);
        tracing::debug!(method = method, "registered CDP event subscription");
        rx
    }

    /// Send a CDP command and wait for its response.
    ///
    /// Returns the result value from the CDP response. If the CDP response
    /// contains an error, it is returned as a `SessionError::Cdp`.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        self.send_command_with_timeout(method, params, self.command_timeout)
            .await
    }

    /// Send a CDP command with a custom timeout.
    pub async fn send_command_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, SessionError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let cmd = CdpCommand {
            id,
            method: method.to_string(),
            params,
        };

        let json = serde_json::to_string(&cmd).map_err(|e| SessionError::Protocol {
            detail: format!("failed to serialize command: {e}"),
        })?;

        tracing::debug!(id = id, method = method, "sending CDP command");

        // Register the pending response before sending to avoid races.
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        // Send the command.
        {
            let mut writer = self.writer.lock().await;
            writer
                .send(Message::Text(json.into()))
                .await
                .map_err(|e| SessionError::Protocol {
                    detail: format!("failed to send WebSocket message: {e}"),
                })?;
        }

        // Wait for the response with timeout.
        let response = tokio::time::timeout(timeout, rx)
            .await
            .map_err(|_| SessionError::Timeout {
                method: method.to_string(),
                duration: timeout,
            })?
            .map_err(|_| SessionError::Protocol {
                detail: "response channel closed unexpectedly".to_string(),
            })?;

        // Check for CDP-level errors.
        if let Some(err) = response.error {
            return Err(SessionError::Cdp {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Enable a CDP domain (e.g. "Page", "Runtime", "Debugger").
    ///
    /// Many CDP domains require an explicit `enable` call before they will
    /// emit events.
    pub async fn enable_domain(&self, domain: &str) -> Result<(), SessionError> {
        let method = format!("{domain}.enable");
        self.send_command(&method, serde_json::json!({})).await?;
        Ok(())
    }

    /// Disable a CDP domain, stopping its event flow.
    pub async fn disable_domain(&self, domain: &str) -> Result<(), SessionError> {
        let method = format!("{domain}.disable");
        self.send_command(&method, serde_json::json!({})).await?;
        Ok(())
    }

    /// Background task that reads WebSocket messages and dispatches them.
    ///
    /// - Messages with an `id` field are responses to pending commands.
    /// - Messages with a `method` field (and no `id`) are events, routed to
    ///   the matching subscription channels.
    async fn read_loop(
        mut reader: futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
        pending: Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>>,
        subscriptions: SubscriptionMap,
    ) {
        while let Some(msg_result) = reader.next().await {
            let msg = match msg_result {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket read error, stopping reader");
                    break;
                }
            };

            let text = match msg {
                Message::Text(t) => t.to_string(),
                Message::Binary(b) => match String::from_utf8(b.to_vec()) {
                    Ok(s) => s,
                    Err(_) => continue,
                },
                Message::Close(_) => {
                    tracing::info!("WebSocket closed by remote");
                    break;
                }
                _ => continue,
            };

            let json: Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse CDP message as JSON");
                    continue;
                }
            };

            if let Some(response) = parse_cdp_response(&json) {
                let mut pending_guard = pending.lock().await;
                if let Some(tx) = pending_guard.remove(&response.id) {
                    let _ = tx.send(response);
                } else {
                    tracing::debug!(id = response.id, "received response for unknown command ID");
                }
            } else if let Some(event) = parse_cdp_event(&json) {
                let mut subs = subscriptions.lock().expect("subscription lock poisoned");
                route_event(&mut subs, event);
            }
        }

        // Clean up: cancel all pending commands and close subscription
        // channels when the connection drops.
        let mut pending_guard = pending.lock().await;
        for (id, tx) in pending_guard.drain() {
            let _ = tx.send(CdpResponse {
                id,
                result: None,
                error: Some(CdpResponseError {
                    code: -1,
                    message: "WebSocket connection closed".to_string(),
                    data: None,
                }),
            });
        }
        subscriptions
            .lock()
            .expect("subscription lock poisoned")
            .clear();
    }
}

// ---------------------------------------------------------------------------
// CDP protocol helpers
// ---------------------------------------------------------------------------

/// Route an event to the subscription channels registered for its method.
///
/// Senders whose receiver has been dropped are pruned. If nobody is
/// subscribed to the method, the event is dropped.
fn route_event(subs: &mut HashMap<String, Vec<mpsc::UnboundedSender<CdpEvent>>>, event: CdpEvent) {
    let Some(senders) = subs.get_mut(&event.method) else {
        return;
    };
    senders.retain(|tx| tx.send(event.clone()).is_ok());
    if senders.is_empty() {
        subs.remove(&event.method);
    }
}

/// Parse a CDP response JSON into its components.
///
/// Responses are distinguished from events by the presence of an `id` field.
pub fn parse_cdp_response(json: &Value) -> Option<CdpResponse> {
    let id = json.get("id")?.as_u64()?;
    Some(CdpResponse {
        id,
        result: json.get("result").cloned(),
        error: json
            .get("error")
            .and_then(|e| serde_json::from_value(e.clone()).ok()),
    })
}

/// Parse a CDP event JSON into its components.
pub fn parse_cdp_event(json: &Value) -> Option<CdpEvent> {
    // Events have a `method` field but no `id`.
    if json.get("id").is_some() {
        return None;
    }
    let method = json.get("method")?.as_str()?.to_string();
    let params = json.get("params").cloned().unwrap_or(Value::Null);
    Some(CdpEvent { method, params })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
