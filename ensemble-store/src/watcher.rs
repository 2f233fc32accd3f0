//! Filesystem watcher turning other handles' writes into [`StoreEvent`]s.
//!
//! One atomic write shows up as several raw events (tmp create, tmp modify,
//! rename). Deliveries are collapsed by the SHA-256 of the key file so each
//! distinct write is reported once. Writes carrying the watching handle's
//! own writer tag are never reported.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use ensemble_core::StoreEvent;

use crate::error::{io_err, FileStoreError};
use crate::file_store::{key_for_path, read_envelope};

pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    dir: PathBuf,
    writer: String,
    /// Last delivered digest per key.
    seen: HashMap<String, String>,
    pending: VecDeque<StoreEvent>,
}

impl StoreWatcher {
    pub(crate) fn start(dir: PathBuf, writer: String) -> Result<Self, FileStoreError> {
        // Canonicalize so that FSEvents paths (which arrive as real paths, e.g.
        // /private/var/... on macOS) match the directory we compare against.
        let dir = fs::canonicalize(&dir).map_err(|e| io_err(&dir, e))?;

        let (event_tx, events) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = recommended_watcher(move |event| {
            let _ = event_tx.send(event);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %dir.display(), "watching session directory");

        let mut this = Self {
            _watcher: watcher,
            events,
            dir,
            writer,
            seen: HashMap::new(),
            pending: VecDeque::new(),
        };
        this.seed()?;
        Ok(this)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Next notification of another handle's write.
    ///
    /// Returns `None` once the underlying watcher has shut down.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match self.events.recv().await? {
                Ok(event) => self.process(event),
                Err(err) => tracing::warn!(error = %err, "watcher event error"),
            }
        }
    }

    /// Record the digests of what is already on disk; only later writes notify.
    fn seed(&mut self) -> Result<(), FileStoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let Some(key) = key_for_path(&path) else {
                continue;
            };
            if let Ok(Some((_, digest))) = read_envelope(&path) {
                self.seen.insert(key, digest);
            }
        }
        Ok(())
    }

    fn process(&mut self, event: Event) {
        if !is_relevant_event_kind(&event.kind) {
            return;
        }
        for path in event.paths {
            let Some(key) = key_for_path(&path) else {
                continue;
            };
            if path.parent() != Some(self.dir.as_path()) {
                continue;
            }
            match read_envelope(&path) {
                Ok(Some((envelope, digest))) => {
                    if self.seen.get(&key) == Some(&digest) {
                        continue;
                    }
                    self.seen.insert(key.clone(), digest);
                    if envelope.writer == self.writer {
                        continue;
                    }
                    self.pending.push_back(StoreEvent {
                        key,
                        new_value: Some(envelope.value),
                    });
                }
                Ok(None) => {
                    if self.seen.remove(&key).is_some() {
                        self.pending.push_back(StoreEvent {
                            key,
                            new_value: None,
                        });
                    }
                }
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "skipping unreadable store key");
                }
            }
        }
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
