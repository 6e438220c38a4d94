//! `inkpost recent` — newest posts on the blog.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use crate::session::Session;
use crate::GlobalOpts;

/// Arguments for `inkpost recent`.
#[derive(Args, Debug)]
pub struct RecentArgs {
    /// How many posts to list.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub count: usize,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct RecentRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "title")]
    title: String,
    #[tabled(rename = "created")]
    created: String,
}

impl RecentArgs {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let session = Session::load(global)?;
        let mut client = session.client();
        let posts = inkpost_sync::recent(&mut client, self.count).context("failed to list recent posts")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&posts).context("failed to serialize posts")?
            );
            return Ok(());
        }
        if posts.is_empty() {
            println!("No posts.");
            return Ok(());
        }

        let rows: Vec<RecentRow> = posts
            .into_iter()
            .map(|p| RecentRow {
                id: p.id.to_string(),
                title: p.title,
                created: p.created.unwrap_or_default(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
