//! services/sync-client/src/socket/state.rs
//!
//! The shared client state handed to whatever drives the sync flows: the
//! event socket, the assignment store, and the loaded configuration. Built
//! once at startup and cloned freely.

use crate::config::Config;
use assignment_sync_core::ports::EventSocket;
use assignment_sync_core::store::AssignmentStore;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct ClientState {
    pub socket: Arc<dyn EventSocket>,
    pub store: Arc<AssignmentStore>,
    pub config: Arc<Config>,
}

impl ClientState {
    pub fn new(socket: Arc<dyn EventSocket>, store: Arc<AssignmentStore>, config: Arc<Config>) -> Self {
        Self { socket, store, config }
    }

    /// The bound applied to every correlated request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.config.request_timeout_ms)
    }
}
