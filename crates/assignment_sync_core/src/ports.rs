//! crates/assignment_sync_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the sync layer's boundary.
//! The core stays independent of the concrete websocket implementation; the
//! client service provides the real adapter and tests provide an in-memory
//! one.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};

//=========================================================================================
// Error and Result Types
//=========================================================================================

/// Everything a sync operation can fail with.
///
/// All variants surface as rejected results to the immediate caller; none are
/// fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No live connection existed when a request was attempted. Fails fast,
    /// before any event is emitted or listener registered.
    #[error("Not connected to the sync service")]
    NotConnected,

    /// The correlated response did not arrive within the bound.
    #[error("Timed out after {timeout_ms} ms waiting for '{event}'")]
    Timeout { event: String, timeout_ms: u64 },

    /// The server answered with `success: false`.
    #[error("Server rejected the request: {message}")]
    ServerRejected {
        message: String,
        validation_errors: Option<BTreeMap<String, String>>,
    },

    /// A local field key has no wire-field mapping. Caller-side programming
    /// error; nothing was emitted.
    #[error("Unknown local field '{0}'")]
    UnknownField(String),

    /// A newer request registered a listener for the same response event and
    /// displaced this one. Callers must use distinct response events per
    /// concurrent operation or serialize them.
    #[error("Request superseded by a newer listener for '{0}'")]
    Superseded(String),

    /// The transport failed to carry the request (socket gone, send error).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response arrived but did not match the expected payload shape.
    #[error("Malformed payload for '{event}': {reason}")]
    Protocol { event: String, reason: String },
}

/// A convenience type alias for `Result<T, SyncError>`.
pub type SyncResult<T> = Result<T, SyncError>;

//=========================================================================================
// Listener Handles
//=========================================================================================

/// Runs its cleanup exactly once, either when invoked via [`ListenerGuard::release`]
/// or when dropped. Used to deregister a listener on every exit path.
pub struct ListenerGuard(Option<Box<dyn FnOnce() + Send>>);

impl ListenerGuard {
    pub fn new(cleanup: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(cleanup)))
    }

    /// A guard with nothing to clean up.
    pub fn noop() -> Self {
        Self(None)
    }

    /// Runs the cleanup now instead of at drop.
    pub fn release(mut self) {
        if let Some(cleanup) = self.0.take() {
            cleanup();
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.0.take() {
            cleanup();
        }
    }
}

impl std::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ListenerGuard").field(&self.0.is_some()).finish()
    }
}

/// A one-shot wait for a single named event. Dropping the subscription (or
/// just its guard) deregisters the listener.
///
/// The channel carries a result so the registrar can report a displaced or
/// torn-down listener explicitly instead of leaving the waiter to guess.
pub struct OnceSubscription {
    pub receiver: oneshot::Receiver<SyncResult<Value>>,
    pub guard: ListenerGuard,
}

/// A standing subscription that receives every future event with the given
/// name until the guard is dropped.
pub struct PushSubscription {
    pub receiver: mpsc::UnboundedReceiver<Value>,
    pub guard: ListenerGuard,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The connection boundary the correlator and flows are written against.
///
/// One persistent bidirectional connection, addressed by named events.
#[async_trait]
pub trait EventSocket: Send + Sync {
    /// Whether the underlying connection is currently established.
    fn is_connected(&self) -> bool;

    /// Emits a named event with a JSON payload.
    async fn emit(&self, event: &str, payload: Value) -> SyncResult<()>;

    /// Registers a one-shot listener. At most one one-shot listener exists
    /// per event name: a second registration displaces the first, whose
    /// waiter observes [`SyncError::Superseded`].
    fn subscribe_once(&self, event: &str) -> OnceSubscription;

    /// Registers a standing listener for every future event with this name.
    fn subscribe(&self, event: &str) -> PushSubscription;
}
