//! The shared store seam and an in-memory session implementation.
//!
//! A store holds string values by key and is visible to every instance of
//! one session. Backends deliver a [`StoreEvent`] to every *other* attached
//! instance when a key is written; the writer itself is never notified.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;

/// Key/value persistence consumed by the coordinator.
pub trait SharedStore {
    /// Current value of `key`, or `None` when it has never been written.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the value of `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<T: SharedStore + ?Sized> SharedStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

impl<T: SharedStore + ?Sized> SharedStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

/// Notification of a write made by another instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub key: String,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
}

// ---------------------------------------------------------------------------
// In-memory session
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SessionState {
    values: HashMap<String, String>,
    inboxes: HashMap<u64, VecDeque<StoreEvent>>,
    next_handle: u64,
}

/// In-memory store shared by every handle attached to the same session.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<SessionState>>,
}

impl MemoryStore {
    /// Create an empty session.
    pub fn session() -> Self {
        Self::default()
    }

    /// Attach a new instance to the session.
    pub fn handle(&self) -> MemoryHandle {
        let mut state = self.lock();
        let id = state.next_handle;
        state.next_handle += 1;
        state.inboxes.insert(id, VecDeque::new());
        MemoryHandle {
            store: self.clone(),
            id,
        }
    }

    /// Read a value without going through a handle.
    pub fn raw_get(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    /// Write a value without notifying anyone.
    pub fn raw_set(&self, key: &str, value: &str) {
        self.lock().values.insert(key.to_owned(), value.to_owned());
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One instance's view of a [`MemoryStore`] session.
#[derive(Debug)]
pub struct MemoryHandle {
    store: MemoryStore,
    id: u64,
}

impl MemoryHandle {
    /// Drain pending notifications in delivery order.
    pub fn take_events(&self) -> Vec<StoreEvent> {
        let mut state = self.store.lock();
        state
            .inboxes
            .get_mut(&self.id)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }
}

impl SharedStore for MemoryHandle {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.store.raw_get(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut state = self.store.lock();
        state.values.insert(key.to_owned(), value.to_owned());
        for (handle, inbox) in state.inboxes.iter_mut() {
            if *handle == self.id {
                continue;
            }
            inbox.push_back(StoreEvent {
                key: key.to_owned(),
                new_value: Some(value.to_owned()),
            });
        }
        Ok(())
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.store.lock().inboxes.remove(&self.id);
    }
}
