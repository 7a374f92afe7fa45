//! services/sync-client/src/socket/update_task.rs
//!
//! The field-update flow (one answered question pushed to the server) and the
//! create flow. Neither writes the store: the caller's optimistic write
//! stands, and on failure the caller decides whether to revert or re-prompt.

use crate::socket::correlator::request;
use crate::socket::protocol::{
    events, CreateAck, CreatedAssignment, UpdateAck, UpdateRequest, UpdatedAssignment,
};
use assignment_sync_core::fields::{coerce, field_spec};
use assignment_sync_core::ports::{EventSocket, SyncError, SyncResult};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

/// Pushes one field to the server and waits for the confirmation.
///
/// The local key is mapped through the static field table and the value
/// coerced to the field's declared kind before anything is emitted; an
/// unmapped key fails with [`SyncError::UnknownField`] without touching the
/// network. The ack's `updated_fields` list is advisory and only logged.
pub async fn update_assignment_field(
    socket: &dyn EventSocket,
    assignment_id: i64,
    local_key: &str,
    value: &Value,
    timeout: Duration,
) -> SyncResult<Option<UpdatedAssignment>> {
    let spec = field_spec(local_key)
        .ok_or_else(|| SyncError::UnknownField(local_key.to_string()))?;

    let mut updates = Map::new();
    updates.insert(spec.remote.to_string(), coerce(spec.kind, value));
    let payload = serde_json::to_value(UpdateRequest {
        assignment_id,
        updates,
    })
    .unwrap();

    let response = request(socket, events::UPDATE_REQUEST, payload, events::UPDATED, timeout)
        .await?;

    let ack: UpdateAck = serde_json::from_value(response).map_err(|e| SyncError::Protocol {
        event: events::UPDATED.to_string(),
        reason: e.to_string(),
    })?;

    if !ack.success {
        return Err(SyncError::ServerRejected {
            message: ack.error.unwrap_or_else(|| "update rejected".to_string()),
            validation_errors: ack.validation_errors,
        });
    }

    if let Some(confirmed) = &ack.assignment {
        debug!(
            assignment_id = confirmed.id,
            updated_fields = ?confirmed.updated_fields,
            "Server confirmed field update."
        );
    }
    Ok(ack.assignment)
}

/// Asks the server for a fresh assignment record.
pub async fn create_assignment(
    socket: &dyn EventSocket,
    timeout: Duration,
) -> SyncResult<CreatedAssignment> {
    let response = request(socket, events::CREATE_REQUEST, json!({}), events::CREATED, timeout)
        .await?;

    let ack: CreateAck = serde_json::from_value(response).map_err(|e| SyncError::Protocol {
        event: events::CREATED.to_string(),
        reason: e.to_string(),
    })?;

    if !ack.success {
        return Err(SyncError::ServerRejected {
            message: ack.error.unwrap_or_else(|| "create rejected".to_string()),
            validation_errors: None,
        });
    }
    ack.assignment.ok_or_else(|| SyncError::Protocol {
        event: events::CREATED.to_string(),
        reason: "successful response carried no assignment".to_string(),
    })
}
