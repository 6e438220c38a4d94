//! `inkpost push` — publish every pending change.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use inkpost_sync::{pipeline, DrainReport, PublishOutcome, Publisher, SyncError};

use crate::session::Session;
use crate::GlobalOpts;

/// Arguments for `inkpost push`.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Emit the publish report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl PushArgs {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let session = Session::load(global)?;
        let git = session.git()?;
        let cache = session.cache()?;
        let mut store = session.open_store()?;
        let mut client = session.client();
        let documents = session.documents();
        let tracked = vec![cache.path().to_path_buf(), session.db_path()?];
        let mut confirm = session.confirmer();

        let mut publisher = Publisher::new(&git, &cache, &mut store, &mut client, &documents)
            .with_retry(session.retry());
        let report = match pipeline::push(&git, &mut publisher, &tracked, confirm.as_mut()) {
            Ok(report) => report,
            Err(SyncError::Declined) => {
                println!("Cancelled; pull the notes repository first.");
                return Ok(());
            }
            Err(e) => {
                return Err(e).context(format!(
                    "push failed; unpublished changes remain in {}",
                    cache.path().display()
                ))
            }
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize push report")?
            );
            return Ok(());
        }
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &DrainReport) {
    if report.is_empty() {
        println!("✓ nothing to publish");
        return;
    }
    println!("✓ published {} change(s)", report.outcomes.len());
    for outcome in &report.outcomes {
        let glyph = match outcome {
            PublishOutcome::Created { .. } => "+".green(),
            PublishOutcome::Updated { .. } => "✎".normal(),
            PublishOutcome::Recreated { .. } => "↻".yellow(),
            PublishOutcome::Deleted { .. } => "-".red(),
            PublishOutcome::DeleteRefused { .. } => "!".red().bold(),
            PublishOutcome::Skipped { .. } => "·".bright_black(),
            PublishOutcome::Moved { .. } => "→".cyan(),
        };
        println!("  {glyph}  {outcome}");
    }
}
