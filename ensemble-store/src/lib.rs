//! # ensemble-store
//!
//! File-backed shared store for ensemble sessions.
//!
//! [`FileStore`] implements [`ensemble_core::SharedStore`] on top of one
//! directory per session; [`FileStore::watch`] yields the cross-process
//! change notifications a coordinator consumes.

pub mod error;
pub mod file_store;
pub mod watcher;

pub use error::FileStoreError;
pub use file_store::{session_dir_at, sessions_root_at, Envelope, FileStore};
pub use watcher::StoreWatcher;
