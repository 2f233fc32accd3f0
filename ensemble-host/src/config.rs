//! Host configuration, read from `~/.ensemble/config.yaml`.
//!
//! ```yaml
//! session: default
//! poll_interval_ms: 100
//! ```
//!
//! Every field is optional. Command-line flags override file values.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, HostError};
use crate::paths::{config_path, DEFAULT_POLL_INTERVAL, DEFAULT_SESSION};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Session name; instances only see others in the same session.
    pub session: String,
    /// How often the local shape is re-checked.
    pub poll_interval_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            session: DEFAULT_SESSION.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl HostConfig {
    /// Load the config under `home`; defaults when the file does not exist.
    pub fn load_at(home: &Path) -> Result<Self, HostError> {
        let path = config_path(home);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(io_err(&path, err)),
        };
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| HostError::Config { path, source })
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, session: Option<String>, poll_interval_ms: Option<u64>) -> Self {
        if let Some(session) = session {
            self.session = session;
        }
        if let Some(ms) = poll_interval_ms {
            self.poll_interval_ms = ms;
        }
        self
    }

    /// Poll interval, never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
