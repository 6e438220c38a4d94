//! Per-invocation setup: config, repository handles and prompts.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use inkpost_core::{config, AssumeYes, Config, Confirm, IdentifierStore, PendingChangeCache};
use inkpost_detector::GitRepo;
use inkpost_sync::{MarkdownDocuments, MetaWeblogClient, RetryPolicy};

use crate::GlobalOpts;

pub struct Session {
    pub config: Config,
    pub root: PathBuf,
    yes: bool,
}

impl Session {
    pub fn load(opts: &GlobalOpts) -> Result<Self> {
        let config = match &opts.config {
            Some(path) => config::load_from(path),
            None => {
                let home: PathBuf =
                    dirs::home_dir().context("could not determine home directory")?;
                config::load_at(&home)
            }
        }
        .context("failed to load inkpost config")?;
        let root = config.repo_root().context("invalid repo_dir in config")?;
        tracing::debug!("notes repository: {}", root.display());
        Ok(Self {
            config,
            root,
            yes: opts.yes,
        })
    }

    /// The notes repository, verified to be a git work tree.
    pub fn git(&self) -> Result<GitRepo> {
        let repo = GitRepo::new(&self.root);
        repo.ensure_available()
            .with_context(|| format!("{} is not usable as a git repository", self.root.display()))?;
        Ok(repo)
    }

    pub fn cache(&self) -> Result<PendingChangeCache> {
        Ok(PendingChangeCache::new(self.config.cache_path()?))
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        Ok(self.config.db_path()?)
    }

    pub fn open_store(&self) -> Result<IdentifierStore> {
        let path = self.db_path()?;
        IdentifierStore::open(&path)
            .with_context(|| format!("failed to open post store at {}", path.display()))
    }

    pub fn client(&self) -> MetaWeblogClient {
        MetaWeblogClient::from_config(&self.config)
    }

    pub fn documents(&self) -> MarkdownDocuments {
        MarkdownDocuments::new(&self.root)
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            interval: self.config.rate_limit_interval(),
        }
    }

    /// `--yes` answers everything; otherwise ask on the terminal.
    pub fn confirmer(&self) -> Box<dyn Confirm> {
        if self.yes {
            Box::new(AssumeYes)
        } else {
            Box::new(ask_terminal)
        }
    }
}

/// Print `question` and read one line; only `y`/`yes` accepts.
fn ask_terminal(question: &str) -> bool {
    print!("{question} [y/N]: ");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}
