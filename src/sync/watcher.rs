//! Change detection between poll ticks

use crate::model::{Ticket, TicketId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Growth detector for the called-ticket count
///
/// Level-triggered: only an increase over the last observed count reports a
/// new call. A decrease (a called ticket evicted) moves the
/// baseline down without reporting anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallWatcher {
    last_observed_called_count: usize,
}

impl CallWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_observed(&self) -> usize {
        self.last_observed_called_count
    }

    /// Record this tick's called count; true if it grew
    pub fn observe(&mut self, called_count: usize) -> bool {
        let previous = self.last_observed_called_count;
        self.last_observed_called_count = called_count;

        if called_count < previous {
            tracing::debug!(previous, called_count, "Called count dropped, baseline reset");
        }
        called_count > previous
    }
}

/// Per-ticket call marks from the previous tick
///
/// Tracks `called_at` so a re-call (window correction) shows up as a new call
/// even though the called count does not change.
#[derive(Debug, Clone, Default)]
pub struct CallMarks {
    marks: HashMap<TicketId, Option<DateTime<Utc>>>,
}

impl CallMarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids called since the previous update, in ledger order; replaces the marks
    pub fn update(&mut self, tickets: &[Ticket]) -> Vec<TicketId> {
        let mut next = HashMap::new();
        let mut fresh = Vec::new();

        for ticket in tickets.iter().filter(|t| t.is_called()) {
            match self.marks.get(&ticket.id) {
                Some(called_at) if *called_at == ticket.called_at => {}
                _ => fresh.push(ticket.id.clone()),
            }
            next.insert(ticket.id.clone(), ticket.called_at);
        }

        self.marks = next;
        fresh
    }
}

/// Ids that were in `previous` but are missing from `current`, in previous order
pub fn departed(previous: &[TicketId], current: &[TicketId]) -> Vec<TicketId> {
    previous
        .iter()
        .filter(|id| !current.contains(id))
        .cloned()
        .collect()
}
