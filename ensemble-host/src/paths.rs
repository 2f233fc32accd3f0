use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SESSION: &str = "default";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub const CONFIG_FILE: &str = "config.yaml";

pub fn ensemble_root(home: &Path) -> PathBuf {
    home.join(".ensemble")
}

pub fn config_path(home: &Path) -> PathBuf {
    ensemble_root(home).join(CONFIG_FILE)
}
