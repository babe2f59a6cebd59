//! SQLite shared store
//!
//! One `kv` table holding a JSON document per key. WAL mode lets the kiosk,
//! console and display processes share a single database file; atomic
//! updates run inside `BEGIN IMMEDIATE` transactions so writers serialize on
//! the database write lock.

use super::{SharedStore, StoreKey};
use crate::{QueueError, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// How long a writer waits for another process to release the write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open or create the store database
    pub fn open(path: impl AsRef<Path>, wal_mode: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(QueueError::store)?;
            }
        }

        tracing::info!(path = %path.display(), wal_mode, "Opening shared store");

        let conn = Connection::open(&path).map_err(QueueError::store)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(QueueError::store)?;

        if wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(QueueError::store)?;
        }

        let store = Self {
            conn: Mutex::new(conn),
            path,
        };
        store.init_schema()?;

        Ok(store)
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                "#,
            )
            .map_err(QueueError::store)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| QueueError::StoreUnavailable("sqlite connection lock poisoned".to_string()))
    }
}

fn select(conn: &Connection, key: StoreKey) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM kv WHERE key = ?1",
        params![key.as_str()],
        |row| row.get(0),
    )
    .optional()
    .map_err(QueueError::store)
}

fn upsert(conn: &Connection, key: StoreKey, value: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key.as_str(), value, now],
    )
    .map_err(QueueError::store)?;
    Ok(())
}

fn begin_immediate(conn: &mut Connection) -> Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(QueueError::store)
}

impl SharedStore for SqliteStore {
    fn read(&self, key: StoreKey) -> Result<Option<String>> {
        let conn = self.conn()?;
        select(&conn, key)
    }

    fn write(&self, key: StoreKey, value: &str) -> Result<()> {
        let conn = self.conn()?;
        upsert(&conn, key, value)
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key.as_str()])
            .map_err(QueueError::store)?;
        Ok(())
    }

    fn modify(
        &self,
        key: StoreKey,
        f: &mut dyn FnMut(Option<String>) -> Result<String>,
    ) -> Result<String> {
        let mut conn = self.conn()?;
        let tx = begin_immediate(&mut conn)?;

        let current = select(&tx, key)?;
        // Dropping `tx` on error rolls the transaction back
        let updated = f(current)?;
        upsert(&tx, key, &updated)?;

        tx.commit().map_err(QueueError::store)?;
        Ok(updated)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_temp() -> (SqliteStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(temp_dir.path().join("queue.db"), true).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_read_write_remove() {
        let (store, _temp) = open_temp();

        assert_eq!(store.read(StoreKey::Tickets).unwrap(), None);
        store.write(StoreKey::Tickets, "[]").unwrap();
        assert_eq!(store.read(StoreKey::Tickets).unwrap().as_deref(), Some("[]"));

        store.write(StoreKey::Tickets, "[1]").unwrap();
        assert_eq!(store.read(StoreKey::Tickets).unwrap().as_deref(), Some("[1]"));

        store.remove(StoreKey::Tickets).unwrap();
        assert_eq!(store.read(StoreKey::Tickets).unwrap(), None);
    }

    #[test]
    fn test_modify_rolls_back_on_error() {
        let (store, _temp) = open_temp();
        store.write(StoreKey::Counter, "4").unwrap();

        let result = store.modify(StoreKey::Counter, &mut |_| {
            Err(QueueError::InvalidInput("nope".to_string()))
        });
        assert!(matches!(result, Err(QueueError::InvalidInput(_))));
        assert_eq!(store.read(StoreKey::Counter).unwrap().as_deref(), Some("4"));
    }

    #[test]
    fn test_two_connections_share_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");
        let kiosk = SqliteStore::open(&path, true).unwrap();
        let display = SqliteStore::open(&path, true).unwrap();

        kiosk.write(StoreKey::Company, r#"{"name":"Acme"}"#).unwrap();
        assert_eq!(
            display.read(StoreKey::Company).unwrap().as_deref(),
            Some(r#"{"name":"Acme"}"#)
        );
    }

    #[test]
    fn test_increment_across_connections() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");
        let a = Arc::new(SqliteStore::open(&path, true).unwrap());
        let b = Arc::new(SqliteStore::open(&path, true).unwrap());

        let handles: Vec<_> = [a, b]
            .into_iter()
            .map(|store| {
                std::thread::spawn(move || {
                    (0..10)
                        .map(|_| store.increment(StoreKey::Counter).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut issued: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        issued.sort_unstable();
        assert_eq!(issued, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("queue.db");
        let store = SqliteStore::open(&path, false).unwrap();
        assert_eq!(store.path(), path.as_path());
        assert!(path.exists());
    }

    #[test]
    fn test_unreadable_file_is_store_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");
        std::fs::write(&path, "not a sqlite database\n".repeat(64)).unwrap();

        for wal_mode in [true, false] {
            let result = SqliteStore::open(&path, wal_mode);
            assert!(matches!(result, Err(QueueError::StoreUnavailable(_))));
        }
    }
}
