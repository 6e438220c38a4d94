//! `inkpost diff <path>` — compare a published post with its local file.

use anyhow::{Context, Result};
use clap::Args;

use inkpost_core::RelPath;
use inkpost_sync::diff_post;

use crate::session::Session;
use crate::GlobalOpts;

/// Arguments for `inkpost diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Repository-relative path of a published note.
    pub path: String,
}

impl DiffArgs {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let session = Session::load(global)?;
        let store = session.open_store()?;
        let mut client = session.client();
        let documents = session.documents();
        let path = RelPath::from(self.path.trim_start_matches("./"));

        let result = diff_post(&store, &mut client, &documents, &path)
            .with_context(|| format!("diff failed for '{path}'"))?;

        if result.is_clean() {
            println!("No differences for '{}' (post {}).", result.path, result.id);
            return Ok(());
        }
        print!("{}", result.unified_diff);
        if !result.unified_diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
