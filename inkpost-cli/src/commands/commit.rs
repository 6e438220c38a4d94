//! `inkpost commit` — record staged note changes and commit them.

use anyhow::{Context, Result};
use clap::Args;

use inkpost_sync::{pipeline, SyncError};

use crate::commands::print_pending;
use crate::session::Session;
use crate::GlobalOpts;

/// Arguments for `inkpost commit`.
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Commit message; defaults to the current local time.
    #[arg(short, long)]
    pub message: Option<String>,
}

impl CommitArgs {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let session = Session::load(global)?;
        let git = session.git()?;
        let cache = session.cache()?;
        let mut confirm = session.confirmer();

        let outcome = match pipeline::commit(
            &git,
            &cache,
            &session.config.extensions,
            confirm.as_mut(),
            self.message.as_deref(),
        ) {
            Ok(outcome) => outcome,
            Err(SyncError::Declined) => {
                println!("Cancelled; pending changes were not saved.");
                return Ok(());
            }
            Err(e) => return Err(e).context("commit failed"),
        };

        println!("✓ committed \"{}\"", outcome.message);
        println!("Pending publication ({}):", outcome.pending.len());
        print_pending(&outcome.pending);
        Ok(())
    }
}
