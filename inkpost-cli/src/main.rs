//! inkpost — publish a git-tracked folder of markdown notes to a MetaWeblog blog.
//!
//! # Usage
//!
//! ```text
//! inkpost commit [-m <message>]
//! inkpost push [--json]
//! inkpost status [--posts] [--json]
//! inkpost download <title-or-id> [--dir <dir>]
//! inkpost recent [-n <count>] [--json]
//! inkpost diff <path>
//! ```
//!
//! Global flags: `--config <file>`, `--yes`, `-v`.

mod commands;
mod session;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use commands::{
    commit::CommitArgs, diff::DiffArgs, download::DownloadArgs, push::PushArgs,
    recent::RecentArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "inkpost",
    version,
    about = "Publish staged markdown notes to a MetaWeblog blog",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Config file to use instead of `~/.inkpost/config.yaml`.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Answer yes to every confirmation prompt.
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record staged note changes in the pending cache and commit.
    Commit(CommitArgs),

    /// Publish every pending change to the blog.
    Push(PushArgs),

    /// Show pending changes and published posts.
    Status(StatusArgs),

    /// Save a published post's body as `<id>.md`.
    #[command(alias = "pull")]
    Download(DownloadArgs),

    /// List the most recent posts on the blog.
    Recent(RecentArgs),

    /// Show a unified diff between a published post and its local file.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    tracing::debug!("inkpost v{}", env!("CARGO_PKG_VERSION"));

    let global = cli.global;
    match cli.command {
        Commands::Commit(args) => args.run(&global),
        Commands::Push(args) => args.run(&global),
        Commands::Status(args) => args.run(&global),
        Commands::Download(args) => args.run(&global),
        Commands::Recent(args) => args.run(&global),
        Commands::Diff(args) => args.run(&global),
    }
}
