//! Error types for ensemble-store.

use std::path::PathBuf;

use thiserror::Error;

use ensemble_core::StoreError;

/// All errors that can arise from the file-backed store.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A key file exists but does not hold a valid envelope.
    #[error("invalid store envelope at {path}: {source}")]
    Envelope {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Envelope serialization error (write path).
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// Keys become file names, so path separators are rejected.
    #[error("invalid store key or session name {0:?}")]
    InvalidKey(String),
}

impl From<FileStoreError> for StoreError {
    fn from(err: FileStoreError) -> Self {
        match err {
            FileStoreError::Io { path, source } => StoreError::Io { path, source },
            other => StoreError::Backend(Box::new(other)),
        }
    }
}

/// Convenience constructor for [`FileStoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> FileStoreError {
    FileStoreError::Io {
        path: path.into(),
        source,
    }
}
