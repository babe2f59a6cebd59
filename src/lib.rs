//! queuedesk - Shared-state ticket queue
//!
//! Three independent actors converge on one persisted store: a kiosk that
//! issues tickets, an operator console that calls them to service windows,
//! and a public display that polls and shows the queue.
//!
//! # Architecture
//!
//! - **store**: Key-addressed shared state (SQLite, in-memory) with atomic updates
//! - **ledger**: Ticket lifecycle, retention and display views
//! - **registry**: Service-window categories and the company profile
//! - **sync**: Per-actor poll loop, call detection and metrics
//! - **notify**: Call chime signals
//! - **server**: HTTP surfaces for kiosk, console and display
//! - **config**: YAML configuration and validation

// Core modules
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;

// Components
pub mod ledger;
pub mod notify;
pub mod registry;
pub mod server;
pub mod style;
pub mod sync;

// Re-exports
pub use error::{QueueError, Result};
