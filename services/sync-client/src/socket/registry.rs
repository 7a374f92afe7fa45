//! services/sync-client/src/socket/registry.rs
//!
//! The pending-request table shared by every [`EventSocket`] adapter: at most
//! one one-shot listener per response event name, any number of standing
//! listeners, token-keyed removal so stale guards cannot deregister a newer
//! registration.

use assignment_sync_core::ports::{ListenerGuard, OnceSubscription, PushSubscription, SyncError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};

type OnceSender = oneshot::Sender<Result<Value, SyncError>>;

#[derive(Default)]
struct RegistryInner {
    next_token: u64,
    one_shot: HashMap<String, (u64, OnceSender)>,
    standing: HashMap<String, Vec<(u64, mpsc::UnboundedSender<Value>)>>,
}

/// Cheaply cloneable handle to one shared listener table.
#[derive(Default, Clone)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a one-shot listener for `event`. A previous one-shot
    /// registration for the same event is displaced and its waiter observes
    /// [`SyncError::Superseded`].
    pub fn subscribe_once(&self, event: &str) -> OnceSubscription {
        let (tx, rx) = oneshot::channel();
        let token = {
            let mut inner = self.lock();
            inner.next_token += 1;
            let token = inner.next_token;
            if let Some((_, displaced)) = inner.one_shot.insert(event.to_string(), (token, tx)) {
                let _ = displaced.send(Err(SyncError::Superseded(event.to_string())));
            }
            token
        };

        let registry = self.clone();
        let name = event.to_string();
        OnceSubscription {
            receiver: rx,
            guard: ListenerGuard::new(move || registry.remove_once(&name, token)),
        }
    }

    /// Registers a standing listener that receives every future `event`
    /// dispatch until its guard is dropped.
    pub fn subscribe(&self, event: &str) -> PushSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = {
            let mut inner = self.lock();
            inner.next_token += 1;
            let token = inner.next_token;
            inner
                .standing
                .entry(event.to_string())
                .or_default()
                .push((token, tx));
            token
        };

        let registry = self.clone();
        let name = event.to_string();
        PushSubscription {
            receiver: rx,
            guard: ListenerGuard::new(move || registry.remove_standing(&name, token)),
        }
    }

    /// Delivers one event: the one-shot listener (if any) is removed as it
    /// fires, standing listeners each receive a copy. Returns how many
    /// listeners took delivery; a late response that finds nobody returns 0.
    pub fn dispatch(&self, event: &str, payload: Value) -> usize {
        let mut delivered = 0;
        let mut inner = self.lock();

        if let Some((_, tx)) = inner.one_shot.remove(event) {
            if tx.send(Ok(payload.clone())).is_ok() {
                delivered += 1;
            }
        }

        if let Some(listeners) = inner.standing.get_mut(event) {
            listeners.retain(|(_, tx)| tx.send(payload.clone()).is_ok());
            delivered += listeners.len();
            if listeners.is_empty() {
                inner.standing.remove(event);
            }
        }

        delivered
    }

    fn remove_once(&self, event: &str, token: u64) {
        let mut inner = self.lock();
        // Only remove our own registration; a newer listener under the same
        // name keeps its slot.
        if inner.one_shot.get(event).is_some_and(|(t, _)| *t == token) {
            inner.one_shot.remove(event);
        }
    }

    fn remove_standing(&self, event: &str, token: u64) {
        let mut inner = self.lock();
        if let Some(listeners) = inner.standing.get_mut(event) {
            listeners.retain(|(t, _)| *t != token);
            if listeners.is_empty() {
                inner.standing.remove(event);
            }
        }
    }

    /// Drops every listener. One-shot waiters observe a transport failure.
    pub fn clear(&self) {
        let mut inner = self.lock();
        for (event, (_, tx)) in inner.one_shot.drain() {
            let _ = tx.send(Err(SyncError::Transport(format!(
                "connection closed while waiting for '{event}'"
            ))));
        }
        inner.standing.clear();
    }

    /// Diagnostic count of one-shot listeners registered for `event`.
    pub fn once_listener_count(&self, event: &str) -> usize {
        usize::from(self.lock().one_shot.contains_key(event))
    }

    /// Diagnostic count of standing listeners registered for `event`.
    pub fn standing_listener_count(&self, event: &str) -> usize {
        self.lock().standing.get(event).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn one_shot_listener_is_removed_as_it_fires() {
        let registry = ListenerRegistry::new();
        let sub = registry.subscribe_once("assignment:status_update");

        assert_eq!(registry.dispatch("assignment:status_update", json!({"ok": true})), 1);
        assert_eq!(registry.once_listener_count("assignment:status_update"), 0);

        let payload = sub.receiver.await.unwrap().unwrap();
        assert_eq!(payload["ok"], true);

        // The guard's removal after the fact is a no-op.
        sub.guard.release();
        assert_eq!(registry.dispatch("assignment:status_update", json!({})), 0);
    }

    #[tokio::test]
    async fn newer_registration_displaces_the_older_waiter() {
        let registry = ListenerRegistry::new();
        let first = registry.subscribe_once("assignment:updated");
        let second = registry.subscribe_once("assignment:updated");

        let displaced = first.receiver.await.unwrap();
        assert!(matches!(displaced, Err(SyncError::Superseded(_))));

        // Dropping the displaced guard must not unhook the live listener.
        drop(first.guard);
        assert_eq!(registry.once_listener_count("assignment:updated"), 1);

        registry.dispatch("assignment:updated", json!({"success": true}));
        assert!(second.receiver.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn standing_listeners_receive_every_dispatch() {
        let registry = ListenerRegistry::new();
        let mut sub = registry.subscribe("assignment:details");

        registry.dispatch("assignment:details", json!({"n": 1}));
        registry.dispatch("assignment:details", json!({"n": 2}));

        assert_eq!(sub.receiver.recv().await.unwrap()["n"], 1);
        assert_eq!(sub.receiver.recv().await.unwrap()["n"], 2);

        drop(sub.guard);
        assert_eq!(registry.standing_listener_count("assignment:details"), 0);
        assert_eq!(registry.dispatch("assignment:details", json!({"n": 3})), 0);
    }

    #[tokio::test]
    async fn clear_fails_pending_waiters() {
        let registry = ListenerRegistry::new();
        let sub = registry.subscribe_once("assignment:created");
        registry.clear();

        let outcome = sub.receiver.await.unwrap();
        assert!(matches!(outcome, Err(SyncError::Transport(_))));
    }
}
