//! Ticket ledger
//!
//! Owns the ticket lifecycle on top of the shared store: issue, call,
//! eviction and the display/history views.
//!
//! Every mutation goes through the store's atomic primitives: the counter is
//! issued with [`SharedStore::increment`] and the ticket sequence is updated
//! with [`store::modify_json`], so a kiosk and a console issuing tickets at
//! the same moment both keep their tickets and never share a number.
//!
//! # Example
//!
//! ```no_run
//! use queuedesk::ledger::TicketLedger;
//! use queuedesk::store::MemoryStore;
//! use std::sync::Arc;
//!
//! let ledger = TicketLedger::new(Arc::new(MemoryStore::new()));
//! let ticket = ledger.create("General").unwrap();
//! ledger.call(&ticket.id, 3).unwrap();
//!
//! let view = ledger.active_view().unwrap();
//! assert_eq!(view.called[0].window, Some(3));
//! ```

mod retention;

pub use retention::{ActiveView, RetentionPolicy, VisibilityAnchor};

use crate::clock::{Clock, SystemClock};
use crate::model::{Ticket, TicketId};
use crate::notify::NotificationSignal;
use crate::store::{self, SharedStore, StoreKey};
use crate::sync::metrics;
use crate::{QueueError, Result};
use serde::Serialize;
use std::sync::Arc;

/// Counts over the retained ticket sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub retained: usize,
    pub waiting: usize,
    pub called: usize,
    pub next_number: u64,
}

pub struct TicketLedger {
    store: Arc<dyn SharedStore>,
    policy: RetentionPolicy,
    clock: Arc<dyn Clock>,
    signal: Option<Arc<dyn NotificationSignal>>,
}

impl TicketLedger {
    /// Create a ledger with the default retention policy and the system clock
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            store,
            policy: RetentionPolicy::default(),
            clock: Arc::new(SystemClock),
            signal: None,
        }
    }

    pub fn with_policy(mut self, policy: RetentionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Signal fired after every successful call
    pub fn with_signal(mut self, signal: Arc<dyn NotificationSignal>) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Issue a new waiting ticket for `category`
    pub fn create(&self, category: &str) -> Result<Ticket> {
        let number = self.store.increment(StoreKey::Counter)?;
        let ticket = Ticket::new(number, category, self.clock.now());

        let mut evicted = 0;
        store::modify_json(self.store.as_ref(), StoreKey::Tickets, |tickets: &mut Vec<Ticket>| {
            evicted = self.policy.admit(tickets, ticket.clone()).len();
            Ok(())
        })?;

        metrics::record_ticket_issued();
        tracing::info!(
            ticket_id = %ticket.id,
            number = ticket.number,
            category = %ticket.category,
            evicted,
            "Ticket issued"
        );

        Ok(ticket)
    }

    /// Call a ticket to a service window
    ///
    /// Calling an already-called ticket reassigns its window and refreshes
    /// `called_at`; this is how an operator corrects a misrouted call.
    pub fn call(&self, ticket_id: &TicketId, window: u32) -> Result<Ticket> {
        let now = self.clock.now();
        let mut called: Option<Ticket> = None;

        store::modify_json(self.store.as_ref(), StoreKey::Tickets, |tickets: &mut Vec<Ticket>| {
            let ticket = tickets
                .iter_mut()
                .find(|t| &t.id == ticket_id)
                .ok_or_else(|| QueueError::TicketNotFound(ticket_id.to_string()))?;

            if let (true, Some(previous)) = (ticket.is_called(), ticket.window) {
                tracing::warn!(
                    ticket_id = %ticket_id,
                    previous_window = previous,
                    window,
                    "Re-calling ticket, window reassigned"
                );
            }

            ticket.mark_called(window, now);
            called = Some(ticket.clone());
            Ok(())
        })?;

        let ticket = called.ok_or_else(|| QueueError::TicketNotFound(ticket_id.to_string()))?;

        metrics::record_ticket_called();
        tracing::info!(ticket_id = %ticket.id, window, "Ticket called");

        if let Some(ref signal) = self.signal {
            signal.fire();
        }

        Ok(ticket)
    }

    /// Full retained sequence, newest first
    pub fn tickets(&self) -> Result<Vec<Ticket>> {
        Ok(store::load_json(self.store.as_ref(), StoreKey::Tickets)?.unwrap_or_default())
    }

    /// Look up a retained ticket
    pub fn get(&self, ticket_id: &TicketId) -> Result<Option<Ticket>> {
        Ok(self.tickets()?.into_iter().find(|t| &t.id == ticket_id))
    }

    /// What the public display shows now
    pub fn active_view(&self) -> Result<ActiveView> {
        self.active_view_at(self.clock.now())
    }

    pub fn active_view_at(&self, now: chrono::DateTime<chrono::Utc>) -> Result<ActiveView> {
        let tickets = self.tickets()?;
        Ok(self.policy.active_view(&tickets, now))
    }

    /// Tickets beyond the most recent ones, in ledger order
    pub fn history_view(&self) -> Result<Vec<Ticket>> {
        let tickets = self.tickets()?;
        Ok(self.policy.history(&tickets))
    }

    /// Number the next issued ticket will receive
    pub fn next_number(&self) -> Result<u64> {
        let raw = self.store.read(StoreKey::Counter)?;
        Ok(store::parse_counter(raw.as_deref()))
    }

    pub fn summary(&self) -> Result<LedgerSummary> {
        let tickets = self.tickets()?;
        let called = tickets.iter().filter(|t| t.is_called()).count();
        Ok(LedgerSummary {
            retained: tickets.len(),
            waiting: tickets.len() - called,
            called,
            next_number: self.next_number()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::CountingSignal;
    use crate::store::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashSet;

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn setup() -> (TicketLedger, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(start()));
        let ledger = TicketLedger::new(store.clone()).with_clock(clock.clone());
        (ledger, store, clock)
    }

    fn ids(tickets: &[Ticket]) -> Vec<&str> {
        tickets.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_create_numbers_are_sequential() {
        let (ledger, _store, _clock) = setup();

        let tickets: Vec<Ticket> = (0..20).map(|_| ledger.create("General").unwrap()).collect();

        for (i, ticket) in tickets.iter().enumerate() {
            assert_eq!(ticket.number, i as u64 + 1);
            assert!(ticket.is_waiting());
        }
        let unique: HashSet<_> = tickets.iter().map(|t| t.id.clone()).collect();
        assert_eq!(unique.len(), 20);
        assert_eq!(ledger.next_number().unwrap(), 21);
    }

    #[test]
    fn test_call_scenario() {
        let (ledger, _store, _clock) = setup();

        let t1 = ledger.create("General").unwrap();
        assert_eq!(t1.id.as_str(), "T1");
        let t2 = ledger.create("General").unwrap();
        assert_eq!(t2.id.as_str(), "T2");
        assert_eq!(t2.number, 2);

        let called = ledger.call(&TicketId::new("T1"), 3).unwrap();
        assert!(called.is_called());
        assert_eq!(called.window, Some(3));

        let view = ledger.active_view().unwrap();
        assert_eq!(ids(&view.waiting), vec!["T2"]);
        assert_eq!(ids(&view.called), vec!["T1"]);
    }

    #[test]
    fn test_call_unknown_ticket_leaves_ledger_unchanged() {
        let (ledger, store, _clock) = setup();
        ledger.create("General").unwrap();
        let before = store.read(StoreKey::Tickets).unwrap();

        let result = ledger.call(&TicketId::new("T99"), 1);
        assert!(matches!(result, Err(QueueError::TicketNotFound(ref id)) if id == "T99"));
        assert_eq!(store.read(StoreKey::Tickets).unwrap(), before);
    }

    #[test]
    fn test_call_does_not_touch_other_tickets() {
        let (ledger, _store, _clock) = setup();
        let t1 = ledger.create("General").unwrap();
        let t2 = ledger.create("General").unwrap();

        ledger.call(&t1.id, 2).unwrap();
        ledger.call(&t2.id, 5).unwrap();

        let t1 = ledger.get(&t1.id).unwrap().unwrap();
        assert!(t1.is_called());
        assert_eq!(t1.window, Some(2));
    }

    #[test]
    fn test_recall_reassigns_window() {
        let (ledger, _store, clock) = setup();
        let t1 = ledger.create("General").unwrap();

        ledger.call(&t1.id, 2).unwrap();
        clock.advance(chrono::Duration::seconds(5));
        let recalled = ledger.call(&t1.id, 4).unwrap();

        assert!(recalled.is_called());
        assert_eq!(recalled.window, Some(4));
        assert_eq!(recalled.created_at, start());
        assert_eq!(recalled.called_at, Some(start() + chrono::Duration::seconds(5)));
    }

    #[test]
    fn test_call_fires_signal() {
        let store = Arc::new(MemoryStore::new());
        let signal = CountingSignal::new();
        let ledger = TicketLedger::new(store).with_signal(Arc::new(signal.clone()));

        let t1 = ledger.create("General").unwrap();
        ledger.call(&t1.id, 1).unwrap();
        assert_eq!(signal.count(), 1);

        let _ = ledger.call(&TicketId::new("T42"), 1);
        assert_eq!(signal.count(), 1);
    }

    #[test]
    fn test_called_visibility_expires_at_thirty_seconds() {
        let (ledger, _store, clock) = setup();
        let t1 = ledger.create("General").unwrap();
        ledger.call(&t1.id, 1).unwrap();

        clock.advance(chrono::Duration::milliseconds(29_999));
        assert_eq!(ids(&ledger.active_view().unwrap().called), vec!["T1"]);

        clock.advance(chrono::Duration::milliseconds(1));
        assert!(ledger.active_view().unwrap().called.is_empty());

        // Still retained, just no longer displayed
        assert!(ledger.get(&t1.id).unwrap().unwrap().is_called());
    }

    #[test]
    fn test_waiting_view_never_exceeds_limit() {
        let (ledger, _store, _clock) = setup();
        for _ in 0..12 {
            ledger.create("General").unwrap();
        }
        ledger.call(&TicketId::new("T12"), 1).unwrap();

        let view = ledger.active_view().unwrap();
        assert_eq!(ids(&view.waiting), vec!["T11", "T10", "T9", "T8", "T7"]);
        assert!(view.waiting.iter().all(|t| t.is_waiting()));
    }

    #[test]
    fn test_eviction_after_101_creates() {
        let (ledger, _store, _clock) = setup();
        for _ in 0..101 {
            ledger.create("General").unwrap();
        }

        let tickets = ledger.tickets().unwrap();
        assert_eq!(tickets.len(), 100);
        assert_eq!(tickets[0].number, 101);
        assert_eq!(tickets.last().unwrap().number, 2);

        let first = TicketId::new("T1");
        assert!(ledger.get(&first).unwrap().is_none());
        assert!(ledger.history_view().unwrap().iter().all(|t| t.id != first));
        let view = ledger.active_view().unwrap();
        assert!(view.waiting.iter().chain(view.called.iter()).all(|t| t.id != first));

        let history = ledger.history_view().unwrap();
        assert_eq!(history.len(), 90);
        assert_eq!(history[0].number, 91);
    }

    #[test]
    fn test_create_fails_when_store_offline() {
        let (ledger, store, _clock) = setup();
        store.set_available(false);

        assert!(matches!(
            ledger.create("General"),
            Err(QueueError::StoreUnavailable(_))
        ));
        assert!(matches!(
            ledger.active_view(),
            Err(QueueError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_malformed_tickets_read_as_empty() {
        let (ledger, store, _clock) = setup();
        store.write(StoreKey::Tickets, r#"{"schema":2,"items":[]}"#).unwrap();
        store.write(StoreKey::Counter, "seven").unwrap();

        assert!(ledger.tickets().unwrap().is_empty());
        assert_eq!(ledger.next_number().unwrap(), 1);

        let ticket = ledger.create("General").unwrap();
        assert_eq!(ticket.number, 1);
        assert_eq!(ledger.tickets().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_creators_serialize() {
        let (ledger, store, _clock) = setup();
        store.write(StoreKey::Counter, "5").unwrap();
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.create("General").unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.next_number().unwrap(), 7);
        let numbers: Vec<u64> = ledger.tickets().unwrap().iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![6, 5]);
    }

    #[test]
    fn test_summary_counts() {
        let (ledger, _store, _clock) = setup();
        for _ in 0..3 {
            ledger.create("General").unwrap();
        }
        ledger.call(&TicketId::new("T2"), 1).unwrap();

        let summary = ledger.summary().unwrap();
        assert_eq!(summary.retained, 3);
        assert_eq!(summary.waiting, 2);
        assert_eq!(summary.called, 1);
        assert_eq!(summary.next_number, 4);
    }

    #[test]
    fn test_next_number_never_decreases() {
        let (ledger, _store, clock) = setup();
        let mut last = ledger.next_number().unwrap();
        let mut check = |ledger: &TicketLedger| {
            let next = ledger.next_number().unwrap();
            assert!(next >= last, "counter went from {} to {}", last, next);
            last = next;
        };

        for i in 0..105 {
            let ticket = ledger.create("General").unwrap();
            check(&ledger);
            if i % 3 == 0 {
                ledger.call(&ticket.id, 1).unwrap();
                check(&ledger);
            }
        }
        let _ = ledger.call(&TicketId::new("T1"), 2);
        check(&ledger);

        clock.advance(chrono::Duration::seconds(60));
        ledger.active_view().unwrap();
        ledger.history_view().unwrap();
        ledger.summary().unwrap();
        ledger.tickets().unwrap();
        check(&ledger);

        // Eviction never frees a number for reuse
        let ticket = ledger.create("General").unwrap();
        assert_eq!(ticket.number, 106);
        let ids: HashSet<_> = ledger.tickets().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 100);
    }
}
