//! Per-client rate limiting for ticket issuing

use crate::config::ServerConfig;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Tracked clients before stale windows are swept
const SWEEP_THRESHOLD: usize = 1024;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    /// Window duration
    pub window: Duration,
    /// Request body size limit in bytes
    pub max_body_size: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for RateLimitConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            max_body_size: config.max_body_size,
        }
    }
}

/// Fixed window rate limiter keyed by client IP
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    /// Map of IP address to (request count, window start)
    windows: Mutex<HashMap<String, (u32, Instant)>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check if a request from the given IP should be allowed
    pub async fn check(&self, ip: &str) -> Result<(), RateLimitError> {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();

        if windows.len() >= SWEEP_THRESHOLD {
            let window = self.config.window;
            windows.retain(|_, (_, start)| now.duration_since(*start) <= window);
        }

        let entry = windows.entry(ip.to_string()).or_insert((0, now));

        if now.duration_since(entry.1) > self.config.window {
            entry.0 = 1;
            entry.1 = now;
            return Ok(());
        }

        if entry.0 >= self.config.max_requests {
            let remaining = self
                .config
                .window
                .saturating_sub(now.duration_since(entry.1));
            return Err(RateLimitError::Exceeded {
                retry_after: remaining,
            });
        }

        entry.0 += 1;
        Ok(())
    }

    /// Number of clients currently tracked
    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    Exceeded { retry_after: Duration },
}
