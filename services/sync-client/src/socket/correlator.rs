//! services/sync-client/src/socket/correlator.rs
//!
//! One logical request, one correlated response, one timeout. The listener is
//! registered before the request is emitted and removed on every outcome.

use assignment_sync_core::ports::{EventSocket, OnceSubscription, SyncError, SyncResult};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Emits `request_event` and waits for exactly one `response_event`, bounded
/// by `timeout`.
///
/// Fails fast with [`SyncError::NotConnected`] when no live connection
/// exists; in that case nothing is emitted and no listener is registered.
/// Exactly one of resolve/reject occurs per call, and the one-shot listener
/// is added and removed exactly once regardless of outcome. A response that
/// arrives after the timeout finds no listener and is dropped.
///
/// Two concurrent calls sharing a `response_event` are a caller error: the
/// second displaces the first, which rejects with [`SyncError::Superseded`].
pub async fn request(
    socket: &dyn EventSocket,
    request_event: &str,
    payload: Value,
    response_event: &str,
    timeout: Duration,
) -> SyncResult<Value> {
    if !socket.is_connected() {
        return Err(SyncError::NotConnected);
    }

    // Listener first, then emit: a response cannot outrun its listener.
    let OnceSubscription { receiver, guard } = socket.subscribe_once(response_event);
    socket.emit(request_event, payload).await?;

    let issued_at = Instant::now();
    match tokio::time::timeout(timeout, receiver).await {
        Ok(Ok(Ok(response))) => {
            debug!(
                event = response_event,
                elapsed_ms = issued_at.elapsed().as_millis() as u64,
                "Correlated response received."
            );
            // Dispatch already removed the listener; releasing the guard now
            // is a no-op on a newer registration.
            guard.release();
            Ok(response)
        }
        Ok(Ok(Err(displaced))) => Err(displaced),
        Ok(Err(_closed)) => Err(SyncError::Transport(format!(
            "listener for '{response_event}' dropped before a response arrived"
        ))),
        Err(_elapsed) => {
            warn!(
                event = response_event,
                timeout_ms = timeout.as_millis() as u64,
                "Request timed out; removing listener."
            );
            guard.release();
            Err(SyncError::Timeout {
                event: response_event.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::in_memory::InMemoryEventSocket;
    use serde_json::json;
    use std::sync::Arc;

    /// Yields until the socket has recorded `n` emits, so a test can answer a
    /// request that is already in flight.
    async fn wait_for_emits(socket: &InMemoryEventSocket, n: usize) {
        while socket.emitted().len() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn rejects_immediately_when_not_connected() {
        let socket = InMemoryEventSocket::disconnected();
        let outcome = request(
            socket.as_ref(),
            "assignment:status",
            json!({"assignment_id": 42}),
            "assignment:status_update",
            Duration::from_secs(10),
        )
        .await;

        assert!(matches!(outcome, Err(SyncError::NotConnected)));
        assert!(socket.emitted().is_empty());
        assert_eq!(socket.once_listener_count("assignment:status_update"), 0);
    }

    #[tokio::test]
    async fn resolves_with_the_response_and_leaves_no_listener() {
        let socket = InMemoryEventSocket::new();
        let task = {
            let socket = Arc::clone(&socket);
            tokio::spawn(async move {
                request(
                    socket.as_ref(),
                    "assignment:status",
                    json!({"assignment_id": 42}),
                    "assignment:status_update",
                    Duration::from_secs(5),
                )
                .await
            })
        };

        wait_for_emits(&socket, 1).await;
        assert_eq!(socket.emitted()[0].0, "assignment:status");
        assert_eq!(
            socket.inject("assignment:status_update", json!({"success": true})),
            1
        );

        let response = task.await.unwrap().unwrap();
        assert_eq!(response["success"], true);
        assert_eq!(socket.once_listener_count("assignment:status_update"), 0);
    }

    #[tokio::test]
    async fn times_out_and_a_late_response_finds_no_listener() {
        let socket = InMemoryEventSocket::new();
        let outcome = request(
            socket.as_ref(),
            "assignment:update",
            json!({"assignment_id": 42, "updates": {}}),
            "assignment:updated",
            Duration::from_millis(20),
        )
        .await;

        assert!(matches!(outcome, Err(SyncError::Timeout { .. })));
        assert_eq!(socket.once_listener_count("assignment:updated"), 0);

        // The server answering past the bound reaches nobody.
        assert_eq!(socket.inject("assignment:updated", json!({"success": true})), 0);
    }

    #[tokio::test]
    async fn a_second_call_on_the_same_response_event_supersedes_the_first() {
        let socket = InMemoryEventSocket::new();
        let first = {
            let socket = Arc::clone(&socket);
            tokio::spawn(async move {
                request(
                    socket.as_ref(),
                    "assignment:status",
                    json!({"assignment_id": 1}),
                    "assignment:status_update",
                    Duration::from_secs(5),
                )
                .await
            })
        };
        wait_for_emits(&socket, 1).await;

        let second = {
            let socket = Arc::clone(&socket);
            tokio::spawn(async move {
                request(
                    socket.as_ref(),
                    "assignment:status",
                    json!({"assignment_id": 2}),
                    "assignment:status_update",
                    Duration::from_secs(5),
                )
                .await
            })
        };
        wait_for_emits(&socket, 2).await;

        let displaced = first.await.unwrap();
        assert!(matches!(displaced, Err(SyncError::Superseded(_))));

        socket.inject("assignment:status_update", json!({"success": true}));
        assert!(second.await.unwrap().is_ok());
        assert_eq!(socket.once_listener_count("assignment:status_update"), 0);
    }

    #[tokio::test]
    async fn emit_failure_removes_the_listener() {
        // Connected check passes, then the transport drops before the emit.
        struct FlakySocket(Arc<InMemoryEventSocket>);

        #[async_trait::async_trait]
        impl assignment_sync_core::ports::EventSocket for FlakySocket {
            fn is_connected(&self) -> bool {
                true
            }
            async fn emit(&self, _event: &str, _payload: serde_json::Value) -> SyncResult<()> {
                Err(SyncError::Transport("socket went away".to_string()))
            }
            fn subscribe_once(
                &self,
                event: &str,
            ) -> assignment_sync_core::ports::OnceSubscription {
                self.0.subscribe_once(event)
            }
            fn subscribe(&self, event: &str) -> assignment_sync_core::ports::PushSubscription {
                self.0.subscribe(event)
            }
        }

        let inner = InMemoryEventSocket::new();
        let flaky = FlakySocket(Arc::clone(&inner));
        let outcome = request(
            &flaky,
            "assignment:create",
            json!({}),
            "assignment:created",
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(outcome, Err(SyncError::Transport(_))));
        assert_eq!(inner.once_listener_count("assignment:created"), 0);
    }
}
