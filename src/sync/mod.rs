//! Queue synchronization
//!
//! Every actor (kiosk, console, display) converges on the shared store by
//! polling it. The display runs a [`QueueSync`] loop that re-reads the
//! ticket sequence each tick and fires the call notification when the
//! called count grows.
//!
//! ## Tick
//!
//! 1. **Read**: load the ticket sequence; on failure keep the last snapshot
//! 2. **Detect**: compare the called count with the watcher baseline
//! 3. **Notify**: fire the signal once if the count grew
//! 4. **Cache**: replace the snapshot the surfaces render from
//!
//! ## Communication
//!
//! - **Event Stream**: `NewCalls`, `CallsExpired`, `TickCompleted`, `Error`
//! - **Command Channel**: poll now, change the interval, shut down
//! - **Snapshot**: shared handle read by the HTTP display route
//!
//! # Example
//!
//! ```no_run
//! use queuedesk::store::MemoryStore;
//! use queuedesk::sync::{QueueSync, QueueSyncConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> queuedesk::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let mut sync = QueueSync::new(QueueSyncConfig::new(), store);
//!
//!     let mut events = sync.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     sync.run().await
//! }
//! ```

mod daemon;
pub mod metrics;
mod watcher;

pub use daemon::{
    QueueCommand, QueueEvent, QueueSnapshot, QueueSync, QueueSyncConfig, QueueSyncStats,
    SharedSnapshot, TickOutcome, DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_POLL_INTERVAL,
};
pub use watcher::{CallMarks, CallWatcher};
