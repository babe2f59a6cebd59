//! Shared store
//!
//! The only state the kiosk, operator console and display have in common.
//! Values are JSON documents addressed by a small fixed set of keys.
//!
//! # Write contracts
//!
//! - [`SharedStore::write`] is a plain last-write-wins overwrite. Two actors
//!   doing read-then-write of the same key at overlapping ticks lose one of
//!   the updates.
//! - [`SharedStore::modify`] and [`SharedStore::increment`] are atomic
//!   read-modify-write primitives. Every ledger and registry mutation goes
//!   through them, so concurrent creators serialize instead of racing.
//!
//! Malformed documents (e.g. written by an incompatible schema) read as
//! absent rather than failing the caller.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Logical keys held by the shared store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Sequence of tickets, newest first
    Tickets,
    /// Next ticket number to issue
    Counter,
    /// Sequence of window categories, insertion order
    Windows,
    /// Company profile singleton
    Company,
}

impl StoreKey {
    pub const ALL: [StoreKey; 4] = [
        StoreKey::Tickets,
        StoreKey::Counter,
        StoreKey::Windows,
        StoreKey::Company,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Tickets => "tickets",
            StoreKey::Counter => "counter",
            StoreKey::Windows => "windows",
            StoreKey::Company => "company",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-addressed persisted state shared by every actor
pub trait SharedStore: Send + Sync {
    /// Read the raw document stored under `key`
    fn read(&self, key: StoreKey) -> Result<Option<String>>;

    /// Overwrite the document under `key` (last write wins)
    fn write(&self, key: StoreKey, value: &str) -> Result<()>;

    /// Delete the document under `key`; absent keys are a no-op
    fn remove(&self, key: StoreKey) -> Result<()>;

    /// Atomically replace the document under `key` with `f(current)`
    ///
    /// If `f` fails nothing is written and its error is returned unchanged.
    fn modify(
        &self,
        key: StoreKey,
        f: &mut dyn FnMut(Option<String>) -> Result<String>,
    ) -> Result<String>;

    /// Short backend name for logs and status output
    fn backend(&self) -> &'static str;

    /// Atomically issue the counter value under `key` and advance it by one
    ///
    /// An absent or malformed counter issues 1.
    fn increment(&self, key: StoreKey) -> Result<u64> {
        let mut issued = 0;
        self.modify(key, &mut |raw| {
            issued = parse_counter(raw.as_deref());
            Ok((issued + 1).to_string())
        })?;
        Ok(issued)
    }
}

/// Parse a stored counter; absent or malformed values read as 1
pub fn parse_counter(raw: Option<&str>) -> u64 {
    match raw.map(str::trim) {
        None => 1,
        Some(text) => match text.parse::<u64>() {
            Ok(value) if value >= 1 => value,
            _ => {
                tracing::warn!(value = text, "Malformed counter in store, treating as absent");
                1
            }
        },
    }
}

/// Decode a JSON document, treating malformed content as absent
pub fn decode<T: DeserializeOwned>(key: StoreKey, raw: Option<&str>) -> Option<T> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Malformed document in store, treating as absent");
            None
        }
    }
}

/// Read and decode a JSON document
pub fn load_json<T: DeserializeOwned>(store: &dyn SharedStore, key: StoreKey) -> Result<Option<T>> {
    let raw = store.read(key)?;
    Ok(decode(key, raw.as_deref()))
}

/// Encode and overwrite a JSON document
pub fn save_json<T: Serialize>(store: &dyn SharedStore, key: StoreKey, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    store.write(key, &json)
}

/// Atomically decode, transform and re-encode a JSON document
///
/// Absent or malformed documents start from `T::default()`.
pub fn modify_json<T, F>(store: &dyn SharedStore, key: StoreKey, mut f: F) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
    F: FnMut(&mut T) -> Result<()>,
{
    let mut updated: Option<T> = None;
    store.modify(key, &mut |raw| {
        let mut value: T = decode(key, raw.as_deref()).unwrap_or_default();
        f(&mut value)?;
        let json = serde_json::to_string(&value)?;
        updated = Some(value);
        Ok(json)
    })?;
    updated.ok_or_else(|| crate::QueueError::Other(format!("Store update of '{}' produced no value", key)))
}

/// Open the store described by the configuration
pub fn open(config: &StoreConfig) -> Result<Arc<dyn SharedStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory shared store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open(&config.path, config.wal_mode)?)),
    }
}
