//! services/sync-client/src/socket/fetch_task.rs
//!
//! The fetch-and-restore flow: on entering an assignment view, pull the
//! authoritative server state into the store, then keep following
//! server-pushed detail events until the returned subscription is dropped.

use crate::socket::correlator::request;
use crate::socket::protocol::{events, Details, StatusRequest, StatusUpdate};
use assignment_sync_core::ports::{
    EventSocket, ListenerGuard, PushSubscription, SyncError, SyncResult,
};
use assignment_sync_core::store::AssignmentStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle for one view's standing detail subscription. Dropping it (or
/// calling [`SyncSubscription::stop`]) deregisters the listener and ends the
/// apply task, so unmounted views neither leak listeners nor apply future
/// pushes.
pub struct SyncSubscription {
    task: Option<JoinHandle<()>>,
    guard: Option<ListenerGuard>,
}

impl SyncSubscription {
    /// The cleanup handle for a flow that never started (no assignment id or
    /// no connection).
    pub fn noop() -> Self {
        Self { task: None, guard: None }
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    pub fn stop(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.release();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SyncSubscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// One `assignment:status` → `assignment:status_update` exchange, reconciled
/// into the store.
///
/// A failure response (or any error) leaves the snapshot untouched; fields
/// are never partially applied from a failed response.
pub async fn fetch_assignment_status(
    socket: &dyn EventSocket,
    store: &AssignmentStore,
    assignment_id: i64,
    timeout: Duration,
) -> SyncResult<()> {
    let payload = serde_json::to_value(StatusRequest { assignment_id }).unwrap();
    let response = request(
        socket,
        events::STATUS_REQUEST,
        payload,
        events::STATUS_UPDATE,
        timeout,
    )
    .await?;

    let status: StatusUpdate = serde_json::from_value(response).map_err(|e| {
        SyncError::Protocol {
            event: events::STATUS_UPDATE.to_string(),
            reason: e.to_string(),
        }
    })?;

    if !status.success {
        return Err(SyncError::ServerRejected {
            message: status
                .error
                .unwrap_or_else(|| "status fetch failed".to_string()),
            validation_errors: None,
        });
    }

    let Some(Value::Object(fields)) = status.assignment else {
        return Err(SyncError::Protocol {
            event: events::STATUS_UPDATE.to_string(),
            reason: "successful response carried no assignment object".to_string(),
        });
    };

    apply_assignment_fields(store, &fields);
    store.mark_synced();
    info!(assignment_id, "Assignment state restored from server.");
    Ok(())
}

/// One `assignment:description` → `assignment:details` exchange, applied the
/// same way as a detail push.
pub async fn fetch_assignment_details(
    socket: &dyn EventSocket,
    store: &AssignmentStore,
    assignment_id: i64,
    timeout: Duration,
) -> SyncResult<()> {
    let payload = serde_json::to_value(StatusRequest { assignment_id }).unwrap();
    let response = request(
        socket,
        events::DESCRIPTION_REQUEST,
        payload,
        events::DETAILS,
        timeout,
    )
    .await?;

    let details: Details = serde_json::from_value(response).map_err(|e| SyncError::Protocol {
        event: events::DETAILS.to_string(),
        reason: e.to_string(),
    })?;
    if !details.success {
        return Err(SyncError::ServerRejected {
            message: "details fetch failed".to_string(),
            validation_errors: None,
        });
    }

    apply_assignment_fields(store, &details.fields);
    Ok(())
}

/// The view-mount flow: restore server state, then follow unsolicited
/// `assignment:details` pushes for the same assignment.
///
/// With no assignment id or no live connection there is nothing to do and a
/// no-op subscription is returned. A failed restore returns the error and
/// registers no standing listener.
pub async fn start_assignment_sync(
    socket: Arc<dyn EventSocket>,
    store: Arc<AssignmentStore>,
    assignment_id: Option<i64>,
    timeout: Duration,
) -> SyncResult<SyncSubscription> {
    let Some(assignment_id) = assignment_id else {
        return Ok(SyncSubscription::noop());
    };
    if !socket.is_connected() {
        return Ok(SyncSubscription::noop());
    }

    fetch_assignment_status(socket.as_ref(), store.as_ref(), assignment_id, timeout).await?;

    let PushSubscription { mut receiver, guard } = socket.subscribe(events::DETAILS);
    let task = tokio::spawn(async move {
        while let Some(payload) = receiver.recv().await {
            apply_details_push(&store, assignment_id, payload);
        }
    });

    Ok(SyncSubscription {
        task: Some(task),
        guard: Some(guard),
    })
}

/// Applies one server-pushed detail event, ignoring pushes about other
/// assignments.
fn apply_details_push(store: &AssignmentStore, assignment_id: i64, payload: Value) {
    let details: Details = match serde_json::from_value(payload) {
        Ok(details) => details,
        Err(e) => {
            warn!(error = %e, "Dropping malformed detail push.");
            return;
        }
    };
    if !details.success {
        warn!("Ignoring failed detail push.");
        return;
    }

    let pushed_id = details
        .fields
        .get("assignment_id")
        .or_else(|| details.fields.get("id"))
        .and_then(Value::as_i64);
    if pushed_id.is_some_and(|id| id != assignment_id) {
        debug!(pushed_id, "Detail push is for a different assignment; skipping.");
        return;
    }

    apply_assignment_fields(store, &details.fields);
    debug!(assignment_id, "Applied server-pushed assignment details.");
}

/// Applies every field present in a server payload, in the order received.
/// `chat_messages` replaces the prior transcript inside `replace_field`,
/// since these payloads are full-state, not incremental.
fn apply_assignment_fields(store: &AssignmentStore, fields: &Map<String, Value>) {
    for (key, value) in fields {
        store.replace_field(key, value);
    }
}
