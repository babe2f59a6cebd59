//! Configuration validation
//!
//! Validates queuedesk configuration for correctness:
//! - Retention limits are non-zero and consistent
//! - Poll interval and channel capacity are usable
//! - The bind address parses
//! - A command signal has a template

use super::queue_config::{QueueConfig, SignalKind, StoreBackend};
use crate::QueueError;
use std::net::SocketAddr;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a queuedesk configuration
pub fn validate_config(config: &QueueConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.store.backend == StoreBackend::Sqlite && config.store.path.as_os_str().is_empty() {
        errors.push(ValidationError::new(
            "store.path",
            "SQLite backend requires a database path",
        ));
    }

    let retention = &config.retention;
    if retention.max_retained == 0 {
        errors.push(ValidationError::new(
            "retention.max_retained",
            "Must retain at least one ticket",
        ));
    }
    for (field, value) in [
        ("retention.visible_waiting", retention.visible_waiting),
        ("retention.visible_called", retention.visible_called),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "Must show at least one ticket"));
        } else if value > retention.max_retained {
            errors.push(ValidationError::new(
                field,
                format!(
                    "Cannot exceed retention.max_retained ({})",
                    retention.max_retained
                ),
            ));
        }
    }
    if retention.called_visibility_secs == 0 {
        errors.push(ValidationError::new(
            "retention.called_visibility_secs",
            "Called tickets must stay visible for at least one second",
        ));
    }

    if config.sync.poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "sync.poll_interval_ms",
            "Poll interval must be greater than 0",
        ));
    }
    if config.sync.event_channel_capacity == 0 {
        errors.push(ValidationError::new(
            "sync.event_channel_capacity",
            "Channel capacity must be greater than 0",
        ));
    }

    if config.notification.kind == SignalKind::Command
        && config
            .notification
            .command
            .as_deref()
            .map_or(true, |c| c.trim().is_empty())
    {
        errors.push(ValidationError::new(
            "notification.command",
            "Command signal requires a command template",
        ));
    }

    if config.server.bind.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind",
            format!("Invalid listen address: {}", config.server.bind),
        ));
    }
    if config.server.max_requests == 0 || config.server.window_secs == 0 {
        errors.push(ValidationError::new(
            "server",
            "Rate limit requests and window must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate and fold every problem into one error
pub fn validate_config_result(config: &QueueConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        QueueError::Validation(
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&QueueConfig::new()).is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = QueueConfig::new();
        config.retention.max_retained = 0;
        config.sync.poll_interval_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"retention.max_retained"));
        assert!(fields.contains(&"sync.poll_interval_ms"));
        // visible_* now exceed max_retained
        assert!(fields.contains(&"retention.visible_waiting"));
    }

    #[test]
    fn test_command_signal_requires_template() {
        let mut config = QueueConfig::new();
        config.notification.kind = SignalKind::Command;
        assert!(validate_config(&config).is_err());

        config.notification.command = Some("play {freq}".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_bind_address() {
        let mut config = QueueConfig::new();
        config.server.bind = "localhost".to_string();

        let result = validate_config_result(&config);
        assert!(matches!(result, Err(QueueError::Validation(ref msg)) if msg.contains("server.bind")));
    }
}
