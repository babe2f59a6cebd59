//! Retention and visibility policy
//!
//! Pure functions over a ticket sequence (newest first). The ledger applies
//! them to fresh store reads; the poll loop applies them to its cached
//! snapshot.

use crate::model::Ticket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp the called-ticket visibility window is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityAnchor {
    /// Measure from issue time
    #[default]
    CreatedAt,
    /// Measure from the (latest) call; falls back to issue time
    CalledAt,
}

/// Retention limits for the ledger and its views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Tickets kept in the store; older ones are evicted on create
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,

    /// Waiting tickets shown on the display
    #[serde(default = "default_visible")]
    pub visible_waiting: usize,

    /// Called tickets shown on the display
    #[serde(default = "default_visible")]
    pub visible_called: usize,

    /// How long a called ticket stays on the display, in seconds
    #[serde(default = "default_called_visibility_secs")]
    pub called_visibility_secs: u64,

    /// Ledger positions skipped by the history view
    #[serde(default = "default_history_offset")]
    pub history_offset: usize,

    #[serde(default)]
    pub visibility_anchor: VisibilityAnchor,
}

fn default_max_retained() -> usize {
    100
}

fn default_visible() -> usize {
    5
}

fn default_called_visibility_secs() -> u64 {
    30
}

fn default_history_offset() -> usize {
    10
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_retained: default_max_retained(),
            visible_waiting: default_visible(),
            visible_called: default_visible(),
            called_visibility_secs: default_called_visibility_secs(),
            history_offset: default_history_offset(),
            visibility_anchor: VisibilityAnchor::default(),
        }
    }
}

/// What the public display shows at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveView {
    pub waiting: Vec<Ticket>,
    pub called: Vec<Ticket>,
    pub observed_at: DateTime<Utc>,
}

impl RetentionPolicy {
    /// Whether a called ticket is still inside the visibility window
    ///
    /// The window is half-open: a ticket exactly `called_visibility_secs` old
    /// is no longer visible.
    pub fn is_visible_call(&self, ticket: &Ticket, now: DateTime<Utc>) -> bool {
        if !ticket.is_called() {
            return false;
        }
        let anchor = match self.visibility_anchor {
            VisibilityAnchor::CreatedAt => ticket.created_at,
            VisibilityAnchor::CalledAt => ticket.called_at.unwrap_or(ticket.created_at),
        };
        let window = chrono::Duration::seconds(self.called_visibility_secs as i64);
        now - anchor < window
    }

    /// Derive the display subsets from a ticket sequence
    pub fn active_view(&self, tickets: &[Ticket], now: DateTime<Utc>) -> ActiveView {
        let waiting = tickets
            .iter()
            .filter(|t| t.is_waiting())
            .take(self.visible_waiting)
            .cloned()
            .collect();

        let called = tickets
            .iter()
            .filter(|t| self.is_visible_call(t, now))
            .take(self.visible_called)
            .cloned()
            .collect();

        ActiveView {
            waiting,
            called,
            observed_at: now,
        }
    }

    /// Tickets beyond the most recent `history_offset`, in ledger order
    pub fn history(&self, tickets: &[Ticket]) -> Vec<Ticket> {
        tickets.iter().skip(self.history_offset).cloned().collect()
    }

    /// Insert a new ticket keeping the sequence ordered newest first, then evict
    ///
    /// Returns the evicted tickets.
    pub fn admit(&self, tickets: &mut Vec<Ticket>, ticket: Ticket) -> Vec<Ticket> {
        let pos = tickets
            .iter()
            .position(|t| t.number < ticket.number)
            .unwrap_or(tickets.len());
        tickets.insert(pos, ticket);

        if tickets.len() > self.max_retained {
            tickets.split_off(self.max_retained)
        } else {
            Vec::new()
        }
    }
}
