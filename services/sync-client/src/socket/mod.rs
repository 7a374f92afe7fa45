pub mod connection;
pub mod correlator;
pub mod fetch_task;
pub mod in_memory;
pub mod protocol;
pub mod registry;
pub mod state;
pub mod update_task;

// Re-export the pieces a consumer wires together, so the library surface
// reads as connection + flows without digging through submodules.
pub use connection::{ReconnectPolicy, SocketConnection};
pub use correlator::request;
pub use fetch_task::{
    fetch_assignment_details, fetch_assignment_status, start_assignment_sync, SyncSubscription,
};
pub use in_memory::InMemoryEventSocket;
pub use state::ClientState;
pub use update_task::{create_assignment, update_assignment_field};
