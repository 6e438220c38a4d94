//! `inkpost status` — pending changes and published posts.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use inkpost_core::{IdentifierStore, MappingRecord, PendingChangeSet};

use crate::commands::print_pending;
use crate::session::Session;
use crate::GlobalOpts;

/// Arguments for `inkpost status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also list every published post.
    #[arg(long)]
    pub posts: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusReportJson<'a> {
    summary: StatusSummaryJson,
    pending: &'a PendingChangeSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    posts: Option<&'a [MappingRecord]>,
}

#[derive(Serialize)]
struct StatusSummaryJson {
    pending: usize,
    published: usize,
}

#[derive(Tabled)]
struct PostRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "title")]
    title: String,
    #[tabled(rename = "tags")]
    tags: String,
}

impl StatusArgs {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let session = Session::load(global)?;
        let cache = session.cache()?;
        let pending = cache
            .load()
            .with_context(|| format!("failed to read {}", cache.path().display()))?;

        // Reading status must not create the database.
        let db = session.db_path()?;
        let posts = if db.exists() {
            IdentifierStore::open(&db)
                .and_then(|store| store.list())
                .with_context(|| format!("failed to read post store at {}", db.display()))?
        } else {
            Vec::new()
        };

        if self.json {
            let payload = StatusReportJson {
                summary: StatusSummaryJson {
                    pending: pending.len(),
                    published: posts.len(),
                },
                pending: &pending,
                posts: self.posts.then_some(posts.as_slice()),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        println!(
            "inkpost v{} | {} | {} pending | {} published",
            env!("CARGO_PKG_VERSION"),
            session.root.display(),
            pending.len(),
            posts.len(),
        );
        print_pending(&pending);

        if self.posts {
            if posts.is_empty() {
                println!("No published posts.");
            } else {
                let rows: Vec<PostRow> = posts
                    .into_iter()
                    .map(|rec| PostRow {
                        id: rec.remote_id.to_string(),
                        path: rec.path.to_string(),
                        title: rec.title,
                        tags: rec.tags.join(", "),
                    })
                    .collect();
                let mut table = Table::new(rows);
                table.with(Style::rounded());
                println!("{table}");
            }
        }

        if !pending.is_empty() {
            println!("{}", "Run 'inkpost push' to publish pending changes.".bright_black());
        }
        Ok(())
    }
}
