//! Ensemble core library: registry types, store seam, instance coordinator.
//!
//! - [`types`]: instance ids, shapes, records and the registry
//! - [`store`]: [`SharedStore`] trait and the in-memory session store
//! - [`shape`]: [`ShapeSource`] host queries
//! - [`coordinator`]: [`Coordinator`]
//! - [`error`]: [`StoreError`], [`CoordinatorError`]

pub mod coordinator;
pub mod error;
pub mod shape;
pub mod store;
pub mod types;

pub use coordinator::{Coordinator, CoordinatorState};
pub use error::{CoordinatorError, StoreError};
pub use shape::{FixedShape, ShapeSource, SharedShape};
pub use store::{MemoryHandle, MemoryStore, SharedStore, StoreEvent};
pub use types::{InstanceId, InstanceRecord, Registry, Shape, COUNT_KEY, REGISTRY_KEY};
