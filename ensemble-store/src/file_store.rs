//! File store: one JSON envelope per key inside a session directory.
//!
//! Persists each key at `<home>/.ensemble/sessions/<session>/<key>.json`.
//! Writes use the atomic `.tmp` + rename pattern so readers never observe a
//! partially written value.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use ensemble_core::{SharedStore, StoreError};

use crate::error::{io_err, FileStoreError};
use crate::watcher::StoreWatcher;

pub(crate) const KEY_EXTENSION: &str = "json";

/// On-disk payload of one key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    /// Tag of the [`FileStore`] handle that wrote the value.
    pub writer: String,
    pub value: String,
}

/// `<home>/.ensemble/sessions/`
pub fn sessions_root_at(home: &Path) -> PathBuf {
    home.join(".ensemble").join("sessions")
}

/// `<home>/.ensemble/sessions/<session>/` (no I/O).
pub fn session_dir_at(home: &Path, session: &str) -> PathBuf {
    sessions_root_at(home).join(session)
}

/// Handle on one session directory. Each handle carries its own writer tag,
/// which is how watchers recognise (and skip) the handle's own writes.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    writer: String,
}

impl FileStore {
    /// Open (creating if needed) the store for `session` under `home`.
    pub fn open_at(home: &Path, session: &str) -> Result<Self, FileStoreError> {
        check_component(session)?;
        let dir = session_dir_at(home, session);
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
            set_dir_permissions(&dir)?;
        }
        Ok(Self {
            dir,
            writer: new_writer_tag(),
        })
    }

    /// Delete the whole session directory. Returns whether anything existed.
    pub fn reset_at(home: &Path, session: &str) -> Result<bool, FileStoreError> {
        check_component(session)?;
        let dir = session_dir_at(home, session);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_err(&dir, err)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn writer_tag(&self) -> &str {
        &self.writer
    }

    /// `<session dir>/<key>.json`
    pub fn key_path(&self, key: &str) -> Result<PathBuf, FileStoreError> {
        check_component(key)?;
        Ok(self.dir.join(format!("{key}.{KEY_EXTENSION}")))
    }

    /// Read the envelope stored for `key`, `None` when the key was never written.
    pub fn read(&self, key: &str) -> Result<Option<Envelope>, FileStoreError> {
        let path = self.key_path(key)?;
        read_envelope(&path).map(|found| found.map(|(envelope, _)| envelope))
    }

    /// Atomically replace the value of `key`.
    ///
    /// Write flow: serialize → `<key>.<writer>.tmp` sibling → `chmod 0600` → `rename`.
    pub fn write(&self, key: &str, value: &str) -> Result<(), FileStoreError> {
        let path = self.key_path(key)?;
        let envelope = Envelope {
            writer: self.writer.clone(),
            value: value.to_owned(),
        };
        let json = serde_json::to_string(&envelope)?;

        // The writer tag keeps concurrent writers off each other's tmp file.
        let tmp = self.dir.join(format!("{key}.{}.tmp", self.writer));
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp)?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        tracing::trace!(key, path = %path.display(), "store key written");
        Ok(())
    }

    /// Names of all keys currently present, sorted.
    pub fn list_keys(&self) -> Result<Vec<String>, FileStoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(io_err(&self.dir, err)),
        };
        let mut keys: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| key_for_path(&e.path()))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Start watching the session directory for other handles' writes.
    pub fn watch(&self) -> Result<StoreWatcher, FileStoreError> {
        StoreWatcher::start(self.dir.clone(), self.writer.clone())
    }
}

impl SharedStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read(key)?.map(|envelope| envelope.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(self.write(key, value)?)
    }
}

// ---------------------------------------------------------------------------
// Crate helpers
// ---------------------------------------------------------------------------

/// Read and decode an envelope, also returning the hex SHA-256 of the raw bytes.
pub(crate) fn read_envelope(path: &Path) -> Result<Option<(Envelope, String)>, FileStoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    let envelope = serde_json::from_slice(&bytes).map_err(|source| FileStoreError::Envelope {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some((envelope, hex::encode(Sha256::digest(&bytes)))))
}

/// Key name for a `<key>.json` path; `None` for tmp files and anything else.
pub(crate) fn key_for_path(path: &Path) -> Option<String> {
    let is_key_file = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == KEY_EXTENSION)
        .unwrap_or(false);
    if !is_key_file {
        return None;
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
}

fn check_component(name: &str) -> Result<(), FileStoreError> {
    // Dots are reserved for the `.json` / `.tmp` suffixes.
    if name.is_empty() || name.contains(['/', '\\', '.']) {
        return Err(FileStoreError::InvalidKey(name.to_owned()));
    }
    Ok(())
}

fn new_writer_tag() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    let mut hasher = Sha256::new();
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(SEQ.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let mut tag = hex::encode(hasher.finalize());
    tag.truncate(16);
    tag
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), FileStoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), FileStoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), FileStoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), FileStoreError> {
    Ok(())
}
