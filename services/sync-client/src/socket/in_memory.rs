//! services/sync-client/src/socket/in_memory.rs
//!
//! In-memory adapter for tests and early wiring: a loopback [`EventSocket`]
//! whose "server" is the test, which injects response events by hand.

use crate::socket::registry::ListenerRegistry;
use assignment_sync_core::ports::{
    EventSocket, OnceSubscription, PushSubscription, SyncError, SyncResult,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub struct InMemoryEventSocket {
    registry: ListenerRegistry,
    connected: AtomicBool,
    emitted: Mutex<Vec<(String, Value)>>,
}

impl InMemoryEventSocket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: ListenerRegistry::new(),
            connected: AtomicBool::new(true),
            emitted: Mutex::new(Vec::new()),
        })
    }

    /// A socket that was never connected, for exercising fail-fast paths.
    pub fn disconnected() -> Arc<Self> {
        let socket = Self::new();
        socket.connected.store(false, Ordering::SeqCst);
        socket
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Plays the server's part: delivers an event to whoever is listening.
    /// Returns how many listeners took delivery.
    pub fn inject(&self, event: &str, payload: Value) -> usize {
        self.registry.dispatch(event, payload)
    }

    /// Every `(event, payload)` pair emitted so far, in order.
    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn once_listener_count(&self, event: &str) -> usize {
        self.registry.once_listener_count(event)
    }

    pub fn standing_listener_count(&self, event: &str) -> usize {
        self.registry.standing_listener_count(event)
    }
}

#[async_trait]
impl EventSocket for InMemoryEventSocket {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn emit(&self, event: &str, payload: Value) -> SyncResult<()> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((event.to_string(), payload));
        Ok(())
    }

    fn subscribe_once(&self, event: &str) -> OnceSubscription {
        self.registry.subscribe_once(event)
    }

    fn subscribe(&self, event: &str) -> PushSubscription {
        self.registry.subscribe(event)
    }
}
