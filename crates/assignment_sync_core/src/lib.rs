pub mod domain;
pub mod fields;
pub mod ports;
pub mod store;

pub use domain::{AdvisoryFlags, AssignmentSnapshot, ChatMessage, ChatRole, GeneratedContent};
pub use fields::{coerce, field_spec, FieldKind, FieldSpec, FIELD_MAP};
pub use ports::{
    EventSocket, ListenerGuard, OnceSubscription, PushSubscription, SyncError, SyncResult,
};
pub use store::AssignmentStore;
