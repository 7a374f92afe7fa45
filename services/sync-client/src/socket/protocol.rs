//! services/sync-client/src/socket/protocol.rs
//!
//! Defines the event-based wire contract between this client and the remote
//! assignment service. Each websocket text frame carries one named event and
//! its JSON payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default bound for a correlated request/response exchange.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

//=========================================================================================
// Event Names
//=========================================================================================

pub mod events {
    /// Request the full state of one assignment.
    pub const STATUS_REQUEST: &str = "assignment:status";
    /// Full-state response correlated with [`STATUS_REQUEST`].
    pub const STATUS_UPDATE: &str = "assignment:status_update";

    /// Request the detail fields of one assignment.
    pub const DESCRIPTION_REQUEST: &str = "assignment:description";
    /// Detail response; also pushed unsolicited when the server finishes
    /// background work (e.g. generation completing).
    pub const DETAILS: &str = "assignment:details";

    /// Push one field update.
    pub const UPDATE_REQUEST: &str = "assignment:update";
    /// Confirmation correlated with [`UPDATE_REQUEST`].
    pub const UPDATED: &str = "assignment:updated";

    /// Create a fresh assignment.
    pub const CREATE_REQUEST: &str = "assignment:create";
    /// Confirmation correlated with [`CREATE_REQUEST`].
    pub const CREATED: &str = "assignment:created";
}

//=========================================================================================
// Frame Envelope
//=========================================================================================

/// One websocket text frame: a named event plus its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }
}

//=========================================================================================
// Request Payloads (Client → Server)
//=========================================================================================

#[derive(Debug, Serialize)]
pub struct StatusRequest {
    pub assignment_id: i64,
}

#[derive(Debug, Serialize)]
pub struct UpdateRequest {
    pub assignment_id: i64,
    pub updates: Map<String, Value>,
}

//=========================================================================================
// Response Payloads (Server → Client)
//=========================================================================================

/// Envelope of the `assignment:status_update` response. The assignment object
/// itself is an open field set applied key-by-key.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub success: bool,
    #[serde(default)]
    pub assignment: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The `assignment:details` payload: a success flag with the assignment's
/// fields spread at the top level.
#[derive(Debug, Deserialize)]
pub struct Details {
    pub success: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAck {
    pub success: bool,
    #[serde(default)]
    pub assignment: Option<UpdatedAssignment>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub validation_errors: Option<BTreeMap<String, String>>,
}

/// The advisory body of a successful `assignment:updated` confirmation.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatedAssignment {
    pub id: i64,
    #[serde(default)]
    pub updated_fields: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAck {
    pub success: bool,
    #[serde(default)]
    pub assignment: Option<CreatedAssignment>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedAssignment {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
