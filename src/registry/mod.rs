//! Window registry
//!
//! The service-window categories the kiosk offers and the console routes
//! calls to. Categories are immutable: the console adds and removes them,
//! never edits. Window numbers may repeat across categories.

mod company;

pub use company::CompanySetup;

use crate::clock::{Clock, SystemClock};
use crate::model::{WindowCategory, WindowId};
use crate::store::{self, SharedStore, StoreKey};
use crate::{QueueError, Result};
use std::collections::HashSet;
use std::sync::Arc;

pub struct WindowRegistry {
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
}

impl WindowRegistry {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a new category
    ///
    /// Rejects an empty name or a window number that is not a positive
    /// integer. The id is derived from the current time in milliseconds and
    /// bumped past any id already registered.
    pub fn add(&self, name: &str, window_number: i64) -> Result<WindowCategory> {
        let name = name.trim();
        if name.is_empty() {
            return Err(QueueError::InvalidInput(
                "category name cannot be empty".to_string(),
            ));
        }
        let window_number = u32::try_from(window_number)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                QueueError::InvalidInput(format!(
                    "window number must be a positive integer, got {}",
                    window_number
                ))
            })?;

        let mut candidate = self.clock.now().timestamp_millis();
        let mut created: Option<WindowCategory> = None;

        store::modify_json(
            self.store.as_ref(),
            StoreKey::Windows,
            |windows: &mut Vec<WindowCategory>| {
                let taken: HashSet<i64> = windows
                    .iter()
                    .filter_map(|w| w.id.as_str().parse().ok())
                    .collect();
                while taken.contains(&candidate) {
                    candidate += 1;
                }
                let category = WindowCategory::new(candidate.to_string(), name, window_number);
                windows.push(category.clone());
                created = Some(category);
                Ok(())
            },
        )?;

        let category = created
            .ok_or_else(|| QueueError::Other("window category was not created".to_string()))?;
        tracing::info!(
            id = %category.id,
            name = %category.name,
            window_number = category.window_number,
            "Window category added"
        );
        Ok(category)
    }

    /// Remove a category; returns whether it existed
    pub fn remove(&self, id: &WindowId) -> Result<bool> {
        let mut removed = false;
        store::modify_json(
            self.store.as_ref(),
            StoreKey::Windows,
            |windows: &mut Vec<WindowCategory>| {
                let before = windows.len();
                windows.retain(|w| &w.id != id);
                removed = windows.len() != before;
                Ok(())
            },
        )?;

        if removed {
            tracing::info!(id = %id, "Window category removed");
        } else {
            tracing::debug!(id = %id, "Window category already absent");
        }
        Ok(removed)
    }

    /// All categories in insertion order
    pub fn list(&self) -> Result<Vec<WindowCategory>> {
        Ok(store::load_json(self.store.as_ref(), StoreKey::Windows)?.unwrap_or_default())
    }

    pub fn get(&self, id: &WindowId) -> Result<Option<WindowCategory>> {
        Ok(self.list()?.into_iter().find(|w| &w.id == id))
    }

    /// First category with the given name (surrounding whitespace ignored)
    pub fn find_by_name(&self, name: &str) -> Result<Option<WindowCategory>> {
        let name = name.trim();
        Ok(self.list()?.into_iter().find(|w| w.name == name))
    }
}
