//! RepoWatch one-shot synchronization command.
//!
//! Runs exactly one clean/pull/compare/notify cycle against a clone and
//! reports the outcome. Exit code 0 whether or not the head moved;
//! non-zero on any failure, with the failing stage's message on stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use repowatch_core::marker::CommitMarker;
use repowatch_core::models::{RepoHandle, SyncOutcome};
use repowatch_core::synchronizer::{RepositorySynchronizer, DEFAULT_PULL_TIMEOUT_SECS};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// RepoWatch one-shot synchronization command.
#[derive(Parser, Debug)]
#[command(
    name = "repowatch",
    version,
    about = "Synchronize a repository clone once and report head movement"
)]
struct Cli {
    /// Path to the repository clone to synchronize.
    #[arg(value_name = "REPO")]
    repo: PathBuf,

    /// Remote to pull from.
    #[arg(long, default_value = "origin")]
    remote: String,

    /// Branch to pull. Defaults to the branch currently checked out.
    #[arg(long)]
    branch: Option<String>,

    /// Marker file announcing a detected change.
    #[arg(long, default_value = ".commit_id")]
    marker: PathBuf,

    /// Environment variable holding an auth token for the remote.
    #[arg(long)]
    token_env: Option<String>,

    /// Deadline for the pull stage, in seconds.
    #[arg(long, default_value_t = DEFAULT_PULL_TIMEOUT_SECS)]
    pull_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Unlike the daemon config, a token variable named on the command line
    // is expected to be present.
    let token = match &cli.token_env {
        Some(var) => Some(
            std::env::var(var)
                .with_context(|| format!("environment variable '{}' is not set", var))?,
        ),
        None => None,
    };

    let handle = RepoHandle {
        path: cli.repo,
        remote: cli.remote,
        branch: cli.branch,
        token,
    };

    let synchronizer = RepositorySynchronizer::new(
        handle,
        CommitMarker::new(&cli.marker),
        Duration::from_secs(cli.pull_timeout_secs),
    );

    match synchronizer.synchronize().await? {
        SyncOutcome::Unchanged { head } => {
            println!("no new commits (head {})", head);
        }
        SyncOutcome::Changed { previous, current } => {
            println!("head moved: {} -> {}", previous, current);
            println!("marker written to {}", cli.marker.display());
        }
    }
    Ok(())
}
