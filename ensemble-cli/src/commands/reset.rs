//! `ensemble reset`: clear a session's store.

use anyhow::{Context, Result};
use clap::Args;

use ensemble_store::FileStore;

/// Arguments for `ensemble reset`.
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Session to clear (defaults to the configured session).
    #[arg(long, short = 's')]
    pub session: Option<String>,
}

impl ResetArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let session = super::resolve_session(&home, self.session)?;

        let removed = FileStore::reset_at(&home, &session)
            .with_context(|| format!("failed to reset session '{session}'"))?;
        if removed {
            println!("✓ Reset session '{session}'");
        } else {
            println!("session '{session}' has no stored state");
        }
        Ok(())
    }
}
