pub mod join;
pub mod list;
pub mod reset;

use std::path::PathBuf;

use anyhow::{Context, Result};

use ensemble_host::HostConfig;

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Session named on the command line, else the configured one.
pub(crate) fn resolve_session(home: &std::path::Path, session: Option<String>) -> Result<String> {
    let config = HostConfig::load_at(home).context("failed to load ~/.ensemble/config.yaml")?;
    Ok(config.with_overrides(session, None).session)
}
