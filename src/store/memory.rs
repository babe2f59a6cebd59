//! In-memory shared store
//!
//! Used by tests and single-process demos. The availability switch simulates
//! an unreadable/unwritable store.

use super::{SharedStore, StoreKey};
use crate::{QueueError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StoreKey, String>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Make every subsequent operation succeed or fail with `StoreUnavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<StoreKey, String>>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(QueueError::StoreUnavailable(
                "memory store is offline".to_string(),
            ));
        }
        self.entries
            .lock()
            .map_err(|_| QueueError::StoreUnavailable("memory store lock poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore for MemoryStore {
    fn read(&self, key: StoreKey) -> Result<Option<String>> {
        Ok(self.entries()?.get(&key).cloned())
    }

    fn write(&self, key: StoreKey, value: &str) -> Result<()> {
        self.entries()?.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<()> {
        self.entries()?.remove(&key);
        Ok(())
    }

    fn modify(
        &self,
        key: StoreKey,
        f: &mut dyn FnMut(Option<String>) -> Result<String>,
    ) -> Result<String> {
        let mut entries = self.entries()?;
        let updated = f(entries.get(&key).cloned())?;
        entries.insert(key, updated.clone());
        Ok(updated)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
