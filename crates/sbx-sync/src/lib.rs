//! sbx-sync: priority-queue-driven bidirectional sync between the local
//! cache and the remote object store.

pub mod engine;
pub mod queue;
pub mod state;
pub mod watcher;

pub use engine::{RemoteChild, SyncEngine, SyncStatus};
pub use queue::SyncQueue;
pub use state::MetadataStore;
