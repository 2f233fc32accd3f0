//! Domain types for the shared instance registry.
//!
//! All types serialize to the JSON layout stored under [`REGISTRY_KEY`]:
//! an array of `{ id, shape: { x, y, width, height }, metadata }` objects.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Store key holding the session counter (a decimal integer).
pub const COUNT_KEY: &str = "count";

/// Store key holding the serialized [`Registry`].
pub const REGISTRY_KEY: &str = "windows";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Session-unique identifier of an instance, allocated from the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for InstanceId {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Placement and size of an instance in the host's coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Shape {
    pub x: f64,
    pub y: f64,
    #[serde(alias = "w")]
    pub width: f64,
    #[serde(alias = "h")]
    pub height: f64,
}

impl Shape {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether every component is a finite number. NaN and infinities have
    /// no JSON representation.
    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|value| value.is_finite())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// One live instance as recorded in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: InstanceId,
    pub shape: Shape,
    /// Application payload; never interpreted here.
    #[serde(default, alias = "metaData")]
    pub metadata: Value,
}

/// Ordered list of known instances. Order is insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry(pub Vec<InstanceRecord>);

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InstanceRecord> {
        self.0.iter()
    }

    pub fn ids(&self) -> Vec<InstanceId> {
        self.0.iter().map(|record| record.id).collect()
    }

    /// Position of `id`, or `None` when absent.
    ///
    /// Duplicate ids can only appear after a racing startup; the last
    /// matching position wins.
    pub fn index_of(&self, id: InstanceId) -> Option<usize> {
        self.0.iter().rposition(|record| record.id == id)
    }

    pub fn get(&self, id: InstanceId) -> Option<&InstanceRecord> {
        self.index_of(id).map(|index| &self.0[index])
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut InstanceRecord> {
        self.index_of(id).map(move |index| &mut self.0[index])
    }

    pub fn push(&mut self, record: InstanceRecord) {
        self.0.push(record);
    }

    pub fn remove_at(&mut self, index: usize) -> InstanceRecord {
        self.0.remove(index)
    }

    /// Whether the id sequence differs from `next`.
    ///
    /// Positional comparison: the same ids in a different order count as a
    /// change.
    pub fn membership_changed(&self, next: &Registry) -> bool {
        self.len() != next.len()
            || self
                .iter()
                .zip(next.iter())
                .any(|(prev, next)| prev.id != next.id)
    }
}

impl From<Vec<InstanceRecord>> for Registry {
    fn from(records: Vec<InstanceRecord>) -> Self {
        Self(records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
