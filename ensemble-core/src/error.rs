//! Error types for ensemble-core.

use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Shape;

/// Failures reported by a [`SharedStore`](crate::store::SharedStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backend-specific failure (watcher, envelope decoding, ...).
    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// All errors that can arise from coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The stored counter is present but not a decimal integer.
    #[error("malformed session counter {value:?}: {source}")]
    MalformedCounter {
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// The stored counter is already at the largest allocatable id.
    #[error("session counter {value} is exhausted; reset the session")]
    CounterExhausted { value: u64 },

    /// The stored registry is present but does not parse.
    #[error("malformed instance registry: {source}")]
    MalformedRegistry {
        #[source]
        source: serde_json::Error,
    },

    /// Registry serialization error (write path).
    #[error("failed to serialize registry: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The host reported a shape that cannot be stored as JSON numbers.
    #[error("shape {shape} has non-finite components")]
    NonFiniteShape { shape: Shape },

    #[error("coordinator has not been initialized; call init first")]
    NotInitialized,

    #[error("coordinator is already initialized")]
    AlreadyInitialized,
}
