//! services/sync-client/src/bin/sync_client.rs
//!
//! A small inspection client: connects to the sync service, restores one
//! assignment into a local store, prints the snapshot, then follows
//! server-pushed updates until interrupted.

use assignment_sync_core::store::AssignmentStore;
use std::sync::Arc;
use sync_client_lib::{
    config::Config,
    error::ClientError,
    socket::{start_assignment_sync, ClientState, ReconnectPolicy, SocketConnection},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting sync client...");

    // --- 2. Resolve the Assignment To Follow ---
    // A CLI argument wins over the ASSIGNMENT_ID environment variable.
    let assignment_id = match std::env::args().nth(1) {
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
            ClientError::Internal(format!("'{raw}' is not a valid assignment id"))
        })?),
        None => config.assignment_id,
    };

    // --- 3. Connect ---
    let connection = SocketConnection::with_reconnect(
        config.server_url.clone(),
        ReconnectPolicy {
            max_attempts: config.reconnect_attempts,
            backoff: std::time::Duration::from_millis(config.reconnect_backoff_ms),
        },
    );
    connection.connect(&config.auth_token).await?;

    // --- 4. Build the Shared ClientState ---
    let state = ClientState::new(
        connection.clone(),
        Arc::new(AssignmentStore::new()),
        config.clone(),
    );

    // --- 5. Restore Server State & Follow Pushes ---
    let subscription = start_assignment_sync(
        Arc::clone(&state.socket),
        Arc::clone(&state.store),
        assignment_id,
        state.request_timeout(),
    )
    .await?;

    match assignment_id {
        Some(id) => {
            let snapshot = state.store.snapshot();
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshot)
                    .map_err(|e| ClientError::Internal(e.to_string()))?
            );
            info!(assignment_id = id, "Snapshot restored. Following server pushes; press Ctrl-C to exit.");
        }
        None => info!("No assignment id given; connected and idle. Press Ctrl-C to exit."),
    }

    tokio::signal::ctrl_c().await?;

    // --- 6. Tear Down ---
    subscription.stop();
    connection.disconnect();
    info!("Sync client stopped.");
    Ok(())
}
