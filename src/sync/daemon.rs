//! QueueSync poll loop
//!
//! Re-reads the shared ticket sequence on a fixed interval, fires the call
//! notification on growth of the called count and keeps a cached snapshot
//! that surfaces render from. Runs as a tokio event loop.

use super::metrics;
use super::watcher::{departed, CallMarks, CallWatcher};
use crate::clock::{Clock, SystemClock};
use crate::config::QueueConfig;
use crate::ledger::{ActiveView, RetentionPolicy};
use crate::model::{Ticket, TicketId};
use crate::notify::{NotificationSignal, SilentSignal};
use crate::store::{self, SharedStore, StoreKey};
use crate::{QueueError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};

/// Default poll interval (1 second)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default event channel capacity (1000 events)
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Poll loop configuration
#[derive(Debug, Clone)]
pub struct QueueSyncConfig {
    /// Interval between store reads
    pub poll_interval: Duration,

    /// Event broadcast channel capacity
    pub event_channel_capacity: usize,

    /// Visibility limits applied to the cached view
    pub policy: RetentionPolicy,
}

impl Default for QueueSyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            policy: RetentionPolicy::default(),
        }
    }
}

impl QueueSyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    pub fn with_policy(mut self, policy: RetentionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl From<&QueueConfig> for QueueSyncConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            poll_interval: config.sync.poll_interval(),
            event_channel_capacity: config.sync.event_channel_capacity,
            policy: config.retention.clone(),
        }
    }
}

/// Events emitted by the poll loop
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// Loop started
    Started,

    /// Loop stopped
    Stopped,

    /// A tick read the store successfully
    TickCompleted {
        /// Retained waiting tickets
        waiting: usize,
        /// Retained called tickets
        called: usize,
        /// Whether the notification fired this tick
        notified: bool,
    },

    /// Tickets called since the previous tick (re-calls included)
    NewCalls { ticket_ids: Vec<TicketId> },

    /// Called tickets that left the display since the previous tick
    CallsExpired { ticket_ids: Vec<TicketId> },

    /// A tick failed; the previous snapshot is kept
    Error { message: String },
}

/// Commands accepted by the poll loop
#[derive(Debug, Clone)]
pub enum QueueCommand {
    /// Poll immediately
    PollNow,

    /// Change the poll interval
    SetPollInterval(Duration),

    /// Stop the loop
    Shutdown,
}

/// Result of handling a command
enum CommandResult {
    Continue,
    Stop,
}

/// Last good read of the shared store, as seen by one actor
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Retained tickets, newest first
    pub tickets: Vec<Ticket>,

    /// When `tickets` was read; `None` until the first good tick
    pub refreshed_at: Option<DateTime<Utc>>,

    /// Error from the most recent tick, cleared by the next good one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueueSnapshot {
    /// Display subsets at `now`, derived from the cached tickets
    pub fn view(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> ActiveView {
        policy.active_view(&self.tickets, now)
    }

    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }
}

/// Handle to the snapshot a running loop keeps current
pub type SharedSnapshot = Arc<RwLock<QueueSnapshot>>;

/// What one successful tick observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub called_count: usize,
    pub notified: bool,
    pub new_calls: Vec<TicketId>,
    pub expired: Vec<TicketId>,
}

/// Poll loop statistics
#[derive(Debug, Clone)]
pub struct QueueSyncStats {
    /// Successful ticks
    pub ticks: u64,

    /// Failed ticks
    pub failed_ticks: u64,

    /// Times the notification fired
    pub notifications: u64,

    /// Called count the watcher last observed
    pub last_called_count: usize,

    /// Current poll interval
    pub poll_interval: Duration,
}

/// Per-actor poll loop over the shared store
pub struct QueueSync {
    config: QueueSyncConfig,
    store: Arc<dyn SharedStore>,
    signal: Arc<dyn NotificationSignal>,
    clock: Arc<dyn Clock>,

    watcher: CallWatcher,
    marks: CallMarks,
    visible_called: Vec<TicketId>,
    snapshot: SharedSnapshot,

    event_tx: broadcast::Sender<QueueEvent>,
    command_rx: Option<mpsc::Receiver<QueueCommand>>,
    command_tx: mpsc::Sender<QueueCommand>,

    running: bool,
    ticks: u64,
    failed_ticks: u64,
    notifications: u64,
}

impl QueueSync {
    /// Create a poll loop with a silent signal and the system clock
    pub fn new(config: QueueSyncConfig, store: Arc<dyn SharedStore>) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let (command_tx, command_rx) = mpsc::channel(10);

        Self {
            config,
            store,
            signal: Arc::new(SilentSignal),
            clock: Arc::new(SystemClock),
            watcher: CallWatcher::new(),
            marks: CallMarks::new(),
            visible_called: Vec::new(),
            snapshot: Arc::new(RwLock::new(QueueSnapshot::default())),
            event_tx,
            command_rx: Some(command_rx),
            command_tx,
            running: false,
            ticks: 0,
            failed_ticks: 0,
            notifications: 0,
        }
    }

    pub fn with_signal(mut self, signal: Arc<dyn NotificationSignal>) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get an event subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    /// Get a command sender
    pub fn command_sender(&self) -> mpsc::Sender<QueueCommand> {
        self.command_tx.clone()
    }

    /// Shared handle to the cached snapshot
    pub fn snapshot_handle(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    /// Copy of the cached snapshot
    pub fn snapshot(&self) -> QueueSnapshot {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Display subsets from the cached snapshot at the current time
    pub fn view(&self) -> ActiveView {
        self.snapshot().view(&self.config.policy, self.clock.now())
    }

    pub fn watcher(&self) -> &CallWatcher {
        &self.watcher
    }

    /// Send an event, logging if dropped due to no receivers or channel full
    fn send_event(&self, event: QueueEvent) {
        match self.event_tx.send(event) {
            Ok(_) => {
                let capacity = self.config.event_channel_capacity;
                let len = self.event_tx.len();
                if len > capacity * 80 / 100 {
                    tracing::warn!(
                        current = len,
                        capacity = capacity,
                        threshold_pct = 80,
                        "Event channel nearing capacity"
                    );
                }
            }
            Err(_) => {
                tracing::trace!("Event sent but no receivers subscribed");
            }
        }
    }

    fn update_snapshot(&self, apply: impl FnOnce(&mut QueueSnapshot)) {
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(&mut guard);
    }

    /// Read the store once and update the watcher and the cached snapshot
    ///
    /// On a failed read nothing but the snapshot's `last_error` changes; the
    /// previous tickets stay cached for rendering.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        let started = Instant::now();

        let tickets: Vec<Ticket> = match store::load_json(self.store.as_ref(), StoreKey::Tickets) {
            Ok(tickets) => tickets.unwrap_or_default(),
            Err(e) => {
                metrics::record_store_error("read");
                metrics::record_tick("error");
                self.failed_ticks += 1;
                let message = e.to_string();
                self.update_snapshot(|snapshot| snapshot.last_error = Some(message));
                return Err(e);
            }
        };
        let now = self.clock.now();

        let called_count = tickets.iter().filter(|t| t.is_called()).count();
        let notified = self.watcher.observe(called_count);
        if notified {
            self.signal.fire();
            self.notifications += 1;
            metrics::record_notification(self.signal.name());
            tracing::info!(called_count, signal = self.signal.name(), "New call observed");
        }

        let new_calls = self.marks.update(&tickets);

        let view = self.config.policy.active_view(&tickets, now);
        let visible: Vec<TicketId> = view.called.iter().map(|t| t.id.clone()).collect();
        let expired = departed(&self.visible_called, &visible);
        self.visible_called = visible;

        metrics::set_queue_depth(tickets.len() - called_count, called_count);
        self.update_snapshot(|snapshot| {
            snapshot.tickets = tickets;
            snapshot.refreshed_at = Some(now);
            snapshot.last_error = None;
        });

        self.ticks += 1;
        metrics::record_tick("success");
        metrics::record_tick_duration(started.elapsed().as_secs_f64());

        Ok(TickOutcome {
            called_count,
            notified,
            new_calls,
            expired,
        })
    }

    /// Tick and publish what changed
    pub fn poll_cycle(&mut self) {
        match self.tick() {
            Ok(outcome) => {
                let snapshot = self.snapshot();
                let waiting = snapshot.tickets.len() - outcome.called_count;

                if !outcome.new_calls.is_empty() {
                    self.send_event(QueueEvent::NewCalls {
                        ticket_ids: outcome.new_calls,
                    });
                }
                if !outcome.expired.is_empty() {
                    tracing::debug!(count = outcome.expired.len(), "Calls left the display");
                    self.send_event(QueueEvent::CallsExpired {
                        ticket_ids: outcome.expired,
                    });
                }
                self.send_event(QueueEvent::TickCompleted {
                    waiting,
                    called: outcome.called_count,
                    notified: outcome.notified,
                });
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "Poll failed, keeping last good view");
                self.send_event(QueueEvent::Error {
                    message: e.to_string(),
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Poll failed, keeping last good view");
                self.send_event(QueueEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    /// Run the poll loop with graceful shutdown on SIGTERM/SIGINT
    pub async fn run(&mut self) -> Result<()> {
        let mut command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| QueueError::Config("Poll loop already running".to_string()))?;

        self.running = true;
        metrics::set_health_status(true);
        self.send_event(QueueEvent::Started);
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            store = self.store.backend(),
            signal = self.signal.name(),
            "Queue sync started"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);

        #[cfg(unix)]
        let result = self.run_with_signals(&mut interval, &mut command_rx).await;

        #[cfg(not(unix))]
        let result = self.run_without_signals(&mut interval, &mut command_rx).await;

        self.running = false;
        metrics::set_health_status(false);
        tracing::info!(
            ticks = self.ticks,
            failed_ticks = self.failed_ticks,
            notifications = self.notifications,
            "Queue sync stopped"
        );
        self.send_event(QueueEvent::Stopped);
        result
    }

    /// Run event loop with Unix signal handling (SIGTERM/SIGINT)
    #[cfg(unix)]
    async fn run_with_signals(
        &mut self,
        interval: &mut tokio::time::Interval,
        command_rx: &mut mpsc::Receiver<QueueCommand>,
    ) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| QueueError::Other(format!("Failed to set up SIGTERM handler: {}", e)))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| QueueError::Other(format!("Failed to set up SIGINT handler: {}", e)))?;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.poll_cycle();
                }
                Some(cmd) = command_rx.recv() => {
                    match self.handle_command(cmd, interval) {
                        CommandResult::Continue => {}
                        CommandResult::Stop => break,
                    }
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    break;
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Run event loop without signal handling (non-Unix platforms)
    #[cfg(not(unix))]
    async fn run_without_signals(
        &mut self,
        interval: &mut tokio::time::Interval,
        command_rx: &mut mpsc::Receiver<QueueCommand>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.poll_cycle();
                }
                Some(cmd) = command_rx.recv() => {
                    match self.handle_command(cmd, interval) {
                        CommandResult::Continue => {}
                        CommandResult::Stop => break,
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_command(
        &mut self,
        cmd: QueueCommand,
        interval: &mut tokio::time::Interval,
    ) -> CommandResult {
        match cmd {
            QueueCommand::PollNow => {
                self.poll_cycle();
            }
            QueueCommand::SetPollInterval(duration) => {
                if duration.is_zero() {
                    tracing::warn!("Ignoring zero poll interval");
                } else {
                    *interval = tokio::time::interval(duration);
                    self.config.poll_interval = duration;
                    tracing::info!(poll_interval_ms = duration.as_millis() as u64, "Poll interval changed");
                }
            }
            QueueCommand::Shutdown => {
                tracing::info!("Received shutdown command");
                return CommandResult::Stop;
            }
        }
        CommandResult::Continue
    }

    /// Check if the loop is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stats(&self) -> QueueSyncStats {
        QueueSyncStats {
            ticks: self.ticks,
            failed_ticks: self.failed_ticks,
            notifications: self.notifications,
            last_called_count: self.watcher.last_observed(),
            poll_interval: self.config.poll_interval,
        }
    }
}
