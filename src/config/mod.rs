//! Configuration system
//!
//! Loads ~/.config/queuedesk/config.yaml with support for:
//! - Shared store backend and location
//! - Retention and display visibility limits
//! - Poll loop timing
//! - Call notification style
//! - HTTP surface address and rate limits

mod queue_config;
pub mod validation;

pub use crate::ledger::{RetentionPolicy, VisibilityAnchor};
pub use queue_config::{
    config_dir, NotificationConfig, QueueConfig, ServerConfig, SignalKind, StoreBackend,
    StoreConfig, SyncSettings,
};
pub use validation::{validate_config, validate_config_result, ValidationError};
