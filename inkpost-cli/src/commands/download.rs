//! `inkpost download <title-or-id>` — back up a published post locally.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::session::Session;
use crate::GlobalOpts;

/// Arguments for `inkpost download`.
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Numeric post id, or the title of a published note.
    pub post: String,

    /// Target directory; defaults to `download_dir` under the repository.
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

impl DownloadArgs {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let session = Session::load(global)?;
        let store = session.open_store()?;
        let mut client = session.client();
        let dir = match self.dir {
            Some(dir) => dir,
            None => session.config.download_path()?,
        };

        let path = inkpost_sync::download(&store, &mut client, &self.post, &dir)
            .with_context(|| format!("download failed for '{}'", self.post))?;
        println!("✓ saved {}", path.display());
        Ok(())
    }
}
