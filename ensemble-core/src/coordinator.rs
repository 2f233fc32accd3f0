//! The instance coordinator.
//!
//! A [`Coordinator`] owns the local instance's identity and shape, keeps a
//! cached copy of the session [`Registry`], and writes local changes back to
//! the [`SharedStore`]. Remote writes arrive through
//! [`Coordinator::handle_remote_change`]; the host delivers them serially.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --init--> Active --shutdown / drop--> (consumed)
//! ```
//!
//! Departure runs exactly once: either through [`Coordinator::shutdown`] or,
//! if the coordinator is dropped while still active, from `Drop`.
//!
//! # Id allocation
//!
//! The counter is read, incremented and written back without any lock.
//! Two instances starting at the same time can allocate the same id; that
//! race is accepted and not detected here.
//!
//! # Pre-join notifications
//!
//! A host usually attaches its watcher before calling `init`, so a peer
//! write landing between the two is already part of the registry `init`
//! loaded and may still be delivered afterwards. The first registry
//! notification after joining is dropped when its value equals the one
//! `init` read; applying it would evict the local record from the cache.

use serde_json::Value;

use crate::error::CoordinatorError;
use crate::shape::ShapeSource;
use crate::store::{SharedStore, StoreEvent};
use crate::types::{InstanceId, InstanceRecord, Registry, Shape, COUNT_KEY, REGISTRY_KEY};

type MembershipCallback = Box<dyn FnMut(&Registry)>;
type ShapeCallback = Box<dyn FnMut(&InstanceRecord)>;

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Uninitialized,
    Active,
    Terminated,
}

pub struct Coordinator<S: SharedStore, P: ShapeSource> {
    store: S,
    shapes: P,
    windows: Registry,
    local: Option<InstanceRecord>,
    /// Raw registry value read by `init`, until the first remote registry write.
    joined_from: Option<String>,
    state: CoordinatorState,
    on_win_change: Option<MembershipCallback>,
    on_shape_change: Option<ShapeCallback>,
}

impl<S: SharedStore, P: ShapeSource> Coordinator<S, P> {
    pub fn new(store: S, shapes: P) -> Self {
        Self {
            store,
            shapes,
            windows: Registry::new(),
            local: None,
            joined_from: None,
            state: CoordinatorState::Uninitialized,
            on_win_change: None,
            on_shape_change: None,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Allocate an id, join the registry and persist both keys.
    pub fn init(&mut self, metadata: Value) -> Result<(), CoordinatorError> {
        if self.state != CoordinatorState::Uninitialized {
            return Err(CoordinatorError::AlreadyInitialized);
        }

        let shape = finite_shape(&self.shapes)?;
        let raw = self.store.get(REGISTRY_KEY)?;
        let mut windows = match raw.as_deref() {
            Some(raw) => parse_registry(raw)?,
            None => Registry::new(),
        };
        let counter = load_counter(&self.store)?;
        let id = counter
            .checked_add(1)
            .map(InstanceId)
            .ok_or(CoordinatorError::CounterExhausted { value: counter })?;

        let record = InstanceRecord {
            id,
            shape,
            metadata,
        };
        windows.push(record.clone());

        self.windows = windows;
        self.local = Some(record);
        self.joined_from = raw;
        self.state = CoordinatorState::Active;

        self.store.set(COUNT_KEY, &id.0.to_string())?;
        self.persist()?;
        tracing::info!(id = %id, instances = self.windows.len(), "joined registry");
        Ok(())
    }

    /// Re-query the local shape and publish it if it changed.
    ///
    /// Returns whether the shape changed. An unchanged shape writes nothing.
    pub fn update(&mut self) -> Result<bool, CoordinatorError> {
        self.ensure_active()?;
        let shape = finite_shape(&self.shapes)?;
        let local = self.active_local_mut()?;
        if local.shape == shape {
            return Ok(false);
        }
        local.shape = shape;
        let local = local.clone();

        match self.windows.get_mut(local.id) {
            Some(entry) => entry.shape = shape,
            None => {
                tracing::warn!(
                    id = %local.id,
                    "local instance missing from cached registry; re-adding",
                );
                self.windows.push(local.clone());
            }
        }

        if let Some(callback) = self.on_shape_change.as_mut() {
            callback(&local);
        }
        self.persist()?;
        tracing::debug!(id = %local.id, shape = %shape, "local shape changed");
        Ok(true)
    }

    /// Apply a write made by another instance.
    ///
    /// Returns whether the membership (the id sequence) changed. The cached
    /// registry is replaced either way. Keys other than the registry key
    /// are ignored; a removed key reads as an empty registry.
    pub fn handle_remote_change(
        &mut self,
        key: &str,
        new_value: Option<&str>,
    ) -> Result<bool, CoordinatorError> {
        self.ensure_active()?;
        if key != REGISTRY_KEY {
            return Ok(false);
        }
        if let Some(loaded) = self.joined_from.take() {
            if new_value == Some(loaded.as_str()) {
                tracing::debug!("dropping registry notification that predates join");
                return Ok(false);
            }
        }

        let next = match new_value {
            Some(raw) => parse_registry(raw)?,
            None => Registry::new(),
        };
        let changed = self.windows.membership_changed(&next);
        self.windows = next;

        if changed {
            tracing::debug!(ids = ?self.windows.ids(), "registry membership changed");
            if let Some(callback) = self.on_win_change.as_mut() {
                callback(&self.windows);
            }
        }
        Ok(changed)
    }

    /// [`handle_remote_change`](Self::handle_remote_change) for a store event.
    pub fn handle_event(&mut self, event: &StoreEvent) -> Result<bool, CoordinatorError> {
        self.handle_remote_change(&event.key, event.new_value.as_deref())
    }

    /// Leave the registry and persist the result.
    pub fn shutdown(mut self) -> Result<(), CoordinatorError> {
        self.depart()
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn windows(&self) -> &Registry {
        &self.windows
    }

    pub fn this_window(&self) -> Option<&InstanceRecord> {
        self.local.as_ref()
    }

    pub fn this_window_id(&self) -> Option<InstanceId> {
        self.local.as_ref().map(|record| record.id)
    }

    /// Position of `id` in the cached registry; `None` when absent.
    pub fn window_index_from_id(&self, id: InstanceId) -> Option<usize> {
        self.windows.index_of(id)
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Replace the membership-changed callback.
    pub fn set_win_change_callback(&mut self, callback: impl FnMut(&Registry) + 'static) {
        self.on_win_change = Some(Box::new(callback));
    }

    /// Replace the local-shape-changed callback.
    pub fn set_win_shape_change_callback(
        &mut self,
        callback: impl FnMut(&InstanceRecord) + 'static,
    ) {
        self.on_shape_change = Some(Box::new(callback));
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn ensure_active(&self) -> Result<(), CoordinatorError> {
        match self.state {
            CoordinatorState::Active => Ok(()),
            CoordinatorState::Uninitialized | CoordinatorState::Terminated => {
                Err(CoordinatorError::NotInitialized)
            }
        }
    }

    fn active_local_mut(&mut self) -> Result<&mut InstanceRecord, CoordinatorError> {
        self.ensure_active()?;
        self.local.as_mut().ok_or(CoordinatorError::NotInitialized)
    }

    fn depart(&mut self) -> Result<(), CoordinatorError> {
        if self.state != CoordinatorState::Active {
            return Ok(());
        }
        self.state = CoordinatorState::Terminated;

        let Some(id) = self.this_window_id() else {
            return Ok(());
        };
        match self.windows.index_of(id) {
            Some(index) => {
                self.windows.remove_at(index);
            }
            None => tracing::warn!(id = %id, "local instance already absent from registry"),
        }
        self.persist()?;
        tracing::info!(id = %id, remaining = self.windows.len(), "left registry");
        Ok(())
    }

    fn persist(&self) -> Result<(), CoordinatorError> {
        let json = serde_json::to_string(&self.windows).map_err(CoordinatorError::Serialize)?;
        self.store.set(REGISTRY_KEY, &json)?;
        Ok(())
    }
}

impl<S: SharedStore, P: ShapeSource> Drop for Coordinator<S, P> {
    fn drop(&mut self) {
        if let Err(err) = self.depart() {
            tracing::error!(error = %err, "failed to leave registry on drop");
        }
    }
}

impl<S: SharedStore, P: ShapeSource> std::fmt::Debug for Coordinator<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.state)
            .field("local", &self.local)
            .field("windows", &self.windows)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Store decoding
// ---------------------------------------------------------------------------

/// Read the registry; absent means empty, unparseable is an error.
pub fn load_registry(store: &impl SharedStore) -> Result<Registry, CoordinatorError> {
    match store.get(REGISTRY_KEY)? {
        Some(raw) => parse_registry(&raw),
        None => Ok(Registry::new()),
    }
}

/// Read the session counter; absent means zero, unparseable is an error.
pub fn load_counter(store: &impl SharedStore) -> Result<u64, CoordinatorError> {
    match store.get(COUNT_KEY)? {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|source| CoordinatorError::MalformedCounter { value: raw, source }),
        None => Ok(0),
    }
}

fn finite_shape(shapes: &impl ShapeSource) -> Result<Shape, CoordinatorError> {
    let shape = shapes.shape();
    if shape.is_finite() {
        Ok(shape)
    } else {
        Err(CoordinatorError::NonFiniteShape { shape })
    }
}

fn parse_registry(raw: &str) -> Result<Registry, CoordinatorError> {
    // `null` is what an emptied browser-era store held.
    let parsed: Option<Registry> =
        serde_json::from_str(raw).map_err(|source| CoordinatorError::MalformedRegistry { source })?;
    Ok(parsed.unwrap_or_default())
}
