//! Integration tests for queuedesk
//!
//! Kiosk, console and display each open their own connection to one SQLite
//! file, the way separate actor processes would.

use chrono::{TimeZone, Utc};
use queuedesk::clock::ManualClock;
use queuedesk::config::{QueueConfig, StoreBackend};
use queuedesk::ledger::TicketLedger;
use queuedesk::model::{TicketId, TicketStatus};
use queuedesk::notify::CountingSignal;
use queuedesk::registry::{CompanySetup, WindowRegistry};
use queuedesk::store::{self, SharedStore, SqliteStore, StoreKey};
use queuedesk::sync::{QueueSync, QueueSyncConfig};
use queuedesk::QueueError;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn open_actor(path: &Path) -> Arc<dyn SharedStore> {
    Arc::new(SqliteStore::open(path, true).unwrap())
}

fn start_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.timestamp_opt(1_718_000_000, 0).unwrap(),
    ))
}

mod actor_tests {
    use super::*;

    #[test]
    fn test_kiosk_console_display_converge() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("queue.db");
        let clock = start_clock();

        let kiosk = open_actor(&db);
        let console = open_actor(&db);
        let display = open_actor(&db);

        // Setup through the console
        CompanySetup::new(console.clone())
            .save(queuedesk::model::CompanyProfile::new("Acme Bank", ""))
            .unwrap();
        WindowRegistry::new(console.clone()).add("General", 3).unwrap();

        // Kiosk sees the category and issues two tickets
        let categories = WindowRegistry::new(kiosk.clone()).list().unwrap();
        assert_eq!(categories[0].name, "General");
        let kiosk_ledger = TicketLedger::new(kiosk.clone()).with_clock(clock.clone());
        let t1 = kiosk_ledger.create("General").unwrap();
        let t2 = kiosk_ledger.create("General").unwrap();
        assert_eq!((t1.id.as_str(), t2.id.as_str()), ("T1", "T2"));

        // Display polls before any call
        let signal = CountingSignal::new();
        let mut sync = QueueSync::new(QueueSyncConfig::new(), display.clone())
            .with_signal(Arc::new(signal.clone()))
            .with_clock(clock.clone());
        sync.tick().unwrap();
        assert_eq!(signal.count(), 0);

        // Console calls T1 to window 3
        let console_ledger = TicketLedger::new(console.clone()).with_clock(clock.clone());
        let called = console_ledger.call(&TicketId::new("T1"), 3).unwrap();
        assert_eq!(called.status, TicketStatus::Called);
        assert_eq!(called.window, Some(3));

        // Display picks it up on the next tick and chimes once
        let outcome = sync.tick().unwrap();
        assert!(outcome.notified);
        assert_eq!(outcome.new_calls, vec![TicketId::new("T1")]);
        assert_eq!(signal.count(), 1);

        let view = sync.view();
        let waiting: Vec<&str> = view.waiting.iter().map(|t| t.id.as_str()).collect();
        let visible: Vec<&str> = view.called.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(waiting, vec!["T2"]);
        assert_eq!(visible, vec!["T1"]);

        // 30 seconds later the call leaves the board
        clock.advance(chrono::Duration::seconds(30));
        let outcome = sync.tick().unwrap();
        assert_eq!(outcome.expired, vec![TicketId::new("T1")]);
        assert!(sync.view().called.is_empty());
        assert_eq!(signal.count(), 1);
    }

    #[test]
    fn test_concurrent_creators_never_share_a_number() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("queue.db");

        // Seed the counter at 5
        open_actor(&db).write(StoreKey::Counter, "5").unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || {
                    let ledger = TicketLedger::new(open_actor(&db));
                    ledger.create("General").unwrap().number
                })
            })
            .collect();

        let mut numbers: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![5, 6]);

        let ledger = TicketLedger::new(open_actor(&db));
        assert_eq!(ledger.next_number().unwrap(), 7);

        let persisted: Vec<u64> = ledger.tickets().unwrap().iter().map(|t| t.number).collect();
        assert_eq!(persisted, vec![6, 5]);
    }

    #[test]
    fn test_many_writers_keep_every_ticket() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("queue.db");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || {
                    let ledger = TicketLedger::new(open_actor(&db));
                    for _ in 0..10 {
                        ledger.create("General").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let tickets = TicketLedger::new(open_actor(&db)).tickets().unwrap();
        assert_eq!(tickets.len(), 40);

        let ids: HashSet<String> = tickets.iter().map(|t| t.id.to_string()).collect();
        assert_eq!(ids.len(), 40);

        // Newest first, no gaps
        let numbers: Vec<u64> = tickets.iter().map(|t| t.number).collect();
        let expected: Vec<u64> = (1..=40).rev().collect();
        assert_eq!(numbers, expected);
    }

    #[test]
    fn test_eviction_across_actors() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("queue.db");
        let kiosk = TicketLedger::new(open_actor(&db));
        let console = TicketLedger::new(open_actor(&db));

        for i in 0..101 {
            if i % 2 == 0 {
                kiosk.create("General").unwrap();
            } else {
                console.create("General").unwrap();
            }
        }

        let display = TicketLedger::new(open_actor(&db));
        let tickets = display.tickets().unwrap();
        assert_eq!(tickets.len(), 100);
        assert!(tickets.iter().all(|t| t.number != 1));
        assert!(display.history_view().unwrap().iter().all(|t| t.number != 1));
        assert!(matches!(
            console.call(&TicketId::new("T1"), 2),
            Err(QueueError::TicketNotFound(_))
        ));
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_config_drives_store_and_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut config = QueueConfig::new();
        config.store.path = temp_dir.path().join("data").join("queue.db");
        config.retention.max_retained = 3;
        config.save(&config_path).unwrap();

        let loaded = QueueConfig::load(&config_path).unwrap();
        assert_eq!(loaded.store.backend, StoreBackend::Sqlite);

        let shared = store::open(&loaded.store).unwrap();
        assert_eq!(shared.backend(), "sqlite");
        assert!(loaded.store.path.exists());

        let ledger = TicketLedger::new(shared).with_policy(loaded.retention.clone());
        for _ in 0..5 {
            ledger.create("General").unwrap();
        }
        let numbers: Vec<u64> = ledger.tickets().unwrap().iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![5, 4, 3]);
    }

    #[test]
    fn test_memory_backend_is_process_local() {
        let mut config = QueueConfig::new();
        config.store.backend = StoreBackend::Memory;

        let a = store::open(&config.store).unwrap();
        let b = store::open(&config.store).unwrap();
        TicketLedger::new(a.clone()).create("General").unwrap();

        assert_eq!(TicketLedger::new(a).tickets().unwrap().len(), 1);
        assert!(TicketLedger::new(b).tickets().unwrap().is_empty());
    }
}
