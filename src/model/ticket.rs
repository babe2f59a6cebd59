//! Ticket data structure
//!
//! A queue position issued by the kiosk and called by the operator console.
//! Serialized with camelCase field names so every actor reads the same shape.

use super::TicketId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ticket lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Issued, waiting to be called
    #[default]
    Waiting,
    /// Summoned to a service window
    Called,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "waiting",
            TicketStatus::Called => "called",
        }
    }
}

/// A queue ticket
///
/// `window` is set if and only if `status` is `Called`; `created_at` never
/// changes after issue. Use [`Ticket::mark_called`] rather than touching the
/// fields directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Unique identifier ("T" + number)
    pub id: TicketId,

    /// Sequential ticket number, starting at 1
    pub number: u64,

    /// When the kiosk issued the ticket
    pub created_at: DateTime<Utc>,

    /// Current status
    pub status: TicketStatus,

    /// Service category chosen at the kiosk
    #[serde(default)]
    pub category: String,

    /// Window the ticket was called to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<u32>,

    /// When the ticket was (last) called
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub called_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Create a waiting ticket for the given number
    pub fn new(number: u64, category: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: TicketId::from_number(number),
            number,
            created_at,
            status: TicketStatus::Waiting,
            category: category.into(),
            window: None,
            called_at: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.status == TicketStatus::Waiting
    }

    pub fn is_called(&self) -> bool {
        self.status == TicketStatus::Called
    }

    /// Transition to `Called` at the given window
    ///
    /// Calling an already-called ticket reassigns its window.
    pub fn mark_called(&mut self, window: u32, at: DateTime<Utc>) {
        self.status = TicketStatus::Called;
        self.window = Some(window);
        self.called_at = Some(at);
    }
}
