//! services/sync-client/src/socket/connection.rs
//!
//! The connection handle: owns the single persistent websocket to the remote
//! sync service, dispatches inbound frames into the listener registry, and
//! performs transport-level reconnection with bounded attempts and a fixed
//! backoff. Application-level retries are not its business.

use crate::socket::protocol::EventFrame;
use crate::socket::registry::ListenerRegistry;
use assignment_sync_core::ports::{
    EventSocket, OnceSubscription, PushSubscription, SyncError, SyncResult,
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport-level retry bounds for involuntary disconnects.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Why the frame loop for one established stream ended.
enum DriveEnd {
    Cancelled,
    Dropped,
}

/// State shared between the handle and its background connection task.
struct Shared {
    reconnect: ReconnectPolicy,
    registry: ListenerRegistry,
    connected: AtomicBool,
    connecting: AtomicBool,
    last_error: Mutex<Option<String>>,
}

/// Manages the websocket connection to the sync service.
///
/// `connect` is idempotent while connected or connecting. An involuntary
/// disconnect keeps the handle (and its registered listeners) alive and
/// retries the transport; an explicit `disconnect` cancels everything and
/// clears the listeners, after which the owner is expected to drop the
/// handle.
pub struct SocketConnection {
    url: String,
    shared: Arc<Shared>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    shutdown: Mutex<Option<CancellationToken>>,
}

impl SocketConnection {
    pub fn new(url: impl Into<String>) -> Arc<Self> {
        Self::with_reconnect(url, ReconnectPolicy::default())
    }

    pub fn with_reconnect(url: impl Into<String>, reconnect: ReconnectPolicy) -> Arc<Self> {
        Arc::new(Self {
            url: url.into(),
            shared: Arc::new(Shared {
                reconnect,
                registry: ListenerRegistry::new(),
                connected: AtomicBool::new(false),
                connecting: AtomicBool::new(false),
                last_error: Mutex::new(None),
            }),
            outbound: Mutex::new(None),
            shutdown: Mutex::new(None),
        })
    }

    /// Establishes the connection, authenticating with the opaque identity
    /// token. A no-op while already connected or connecting.
    pub async fn connect(&self, identity: &str) -> SyncResult<()> {
        if self.shared.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.shared.connecting.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let url = authenticated_url(&self.url, identity);
        info!("Connecting to sync service at {}", self.url);

        let stream = match connect_async(url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                self.shared.connecting.store(false, Ordering::SeqCst);
                self.shared.record_error(e.to_string());
                return Err(SyncError::Transport(e.to_string()));
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        *self.lock_outbound() = Some(outbound_tx);
        *self.lock_shutdown() = Some(token.clone());
        self.shared.connected.store(true, Ordering::SeqCst);
        self.shared.connecting.store(false, Ordering::SeqCst);
        *self.shared.lock_error() = None;
        info!("Connected.");

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.run(stream, outbound_rx, url, token).await;
        });

        Ok(())
    }

    /// Tears the connection down and clears every registered listener.
    /// Idempotent.
    pub fn disconnect(&self) {
        if let Some(token) = self.lock_shutdown().take() {
            token.cancel();
        }
        self.lock_outbound().take();
        let was_connected = self.shared.connected.swap(false, Ordering::SeqCst);
        self.shared.connecting.store(false, Ordering::SeqCst);
        self.shared.registry.clear();
        if was_connected {
            info!("Disconnected from sync service.");
        }
    }

    pub fn connecting(&self) -> bool {
        self.shared.connecting.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.lock_error().clone()
    }

    fn lock_outbound(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_shutdown(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.shutdown.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Shared {
    /// The loop that owns one websocket stream at a time, re-dialing on
    /// involuntary loss until the policy is exhausted or the token fires.
    async fn run(
        self: Arc<Self>,
        stream: WsStream,
        mut outbound_rx: mpsc::UnboundedReceiver<String>,
        url: String,
        token: CancellationToken,
    ) {
        let mut current = stream;
        loop {
            match self.drive(current, &mut outbound_rx, &token).await {
                DriveEnd::Cancelled => return,
                DriveEnd::Dropped => {
                    self.connected.store(false, Ordering::SeqCst);
                    warn!("Connection lost; attempting to reconnect.");
                }
            }

            match self.redial(&url, &token).await {
                Some(stream) => current = stream,
                None => {
                    // Exhausted or cancelled. Fail pending waiters now rather
                    // than letting each ride out its own timeout.
                    self.connecting.store(false, Ordering::SeqCst);
                    self.registry.clear();
                    return;
                }
            }
        }
    }

    /// Pumps one established stream: outbound frames from the channel,
    /// inbound frames into the registry.
    async fn drive(
        &self,
        stream: WsStream,
        outbound_rx: &mut mpsc::UnboundedReceiver<String>,
        token: &CancellationToken,
    ) -> DriveEnd {
        let (mut sink, mut source) = stream.split();
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    let _ = sink.close().await;
                    return DriveEnd::Cancelled;
                }
                outgoing = outbound_rx.recv() => match outgoing {
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            self.record_error(e.to_string());
                            return DriveEnd::Dropped;
                        }
                    }
                    // The sender half only goes away on explicit disconnect.
                    None => return DriveEnd::Cancelled,
                },
                incoming = source.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.dispatch_frame(&text),
                    Some(Ok(Message::Close(_))) | None => {
                        self.record_error("connection closed by server".to_string());
                        return DriveEnd::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        self.record_error(e.to_string());
                        return DriveEnd::Dropped;
                    }
                },
            }
        }
    }

    /// Bounded fixed-backoff redial. Returns `None` once the policy is
    /// exhausted or the shutdown token fires mid-wait.
    async fn redial(&self, url: &str, token: &CancellationToken) -> Option<WsStream> {
        self.connecting.store(true, Ordering::SeqCst);
        for attempt in 1..=self.reconnect.max_attempts {
            tokio::select! {
                _ = token.cancelled() => return None,
                _ = tokio::time::sleep(self.reconnect.backoff) => {}
            }
            match connect_async(url).await {
                Ok((stream, _response)) => {
                    self.connected.store(true, Ordering::SeqCst);
                    self.connecting.store(false, Ordering::SeqCst);
                    *self.lock_error() = None;
                    info!(attempt, "Reconnected to sync service.");
                    return Some(stream);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Reconnect attempt failed.");
                    self.record_error(e.to_string());
                }
            }
        }
        error!(
            attempts = self.reconnect.max_attempts,
            "Giving up on reconnection."
        );
        None
    }

    fn dispatch_frame(&self, text: &str) {
        match serde_json::from_str::<EventFrame>(text) {
            Ok(frame) => {
                let delivered = self.registry.dispatch(&frame.event, frame.data);
                if delivered == 0 {
                    debug!(event = %frame.event, "Frame arrived with no listener registered.");
                }
            }
            Err(e) => warn!(error = %e, "Dropping malformed frame from server."),
        }
    }

    fn record_error(&self, message: String) {
        *self.lock_error() = Some(message);
    }

    fn lock_error(&self) -> MutexGuard<'_, Option<String>> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EventSocket for SocketConnection {
    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    async fn emit(&self, event: &str, payload: Value) -> SyncResult<()> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let text = serde_json::to_string(&EventFrame::new(event, payload))
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let outbound = self.lock_outbound();
        match outbound.as_ref() {
            Some(tx) => tx
                .send(text)
                .map_err(|_| SyncError::Transport("outbound channel closed".to_string())),
            None => Err(SyncError::NotConnected),
        }
    }

    fn subscribe_once(&self, event: &str) -> OnceSubscription {
        self.shared.registry.subscribe_once(event)
    }

    fn subscribe(&self, event: &str) -> PushSubscription {
        self.shared.registry.subscribe(event)
    }
}

fn authenticated_url(url: &str, identity: &str) -> String {
    if identity.is_empty() {
        url.to_string()
    } else if url.contains('?') {
        format!("{url}&token={identity}")
    } else {
        format!("{url}?token={identity}")
    }
}
