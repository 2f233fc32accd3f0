use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the host runtime, its config and shape sources.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse shape file {path}: {source}")]
    ShapeFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid shape {0:?}; expected x,y,width,height")]
    InvalidShape(String),

    #[error("store error: {0}")]
    Store(#[from] ensemble_store::FileStoreError),

    #[error("coordinator error: {0}")]
    Coordinator(#[from] ensemble_core::CoordinatorError),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> HostError {
    HostError::Io {
        path: path.into(),
        source,
    }
}
