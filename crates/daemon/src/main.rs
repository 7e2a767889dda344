//! RepoWatch daemon entry point.
//!
//! Loads configuration, builds one synchronizer per watched repository,
//! starts a polling scheduler for each, and handles graceful shutdown.

mod scheduler;
mod signals;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use repowatch_core::config::AppConfig;
use repowatch_core::marker::CommitMarker;
use repowatch_core::synchronizer::RepositorySynchronizer;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// RepoWatch repository observer daemon.
#[derive(Parser, Debug)]
#[command(
    name = "repowatch-daemon",
    version,
    about = "Watches repository clones and publishes head movements"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load and resolve configuration
    let mut config =
        AppConfig::load_from_file(&args.config).context("failed to load configuration file")?;
    config.resolve_env_vars();
    config
        .validate()
        .context("configuration validation failed")?;

    // Initialize tracing
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    // Startup banner
    info!("========================================");
    info!("  RepoWatch Daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Config file   : {}", args.config.display());
    info!("Watched repos : {}", config.repos.len());
    info!("Poll interval : {}s", config.daemon.poll_interval_secs);
    info!("Pull timeout  : {}s", config.sync.pull_timeout_secs);
    info!("Log level     : {}", log_level);
    info!("========================================");

    let started_at = Utc::now();
    let poll_interval = Duration::from_secs(config.daemon.poll_interval_secs);
    let pull_timeout = config.sync.pull_timeout();

    // One scheduler task per watched repository; a shared Notify fans the
    // shutdown signal out to all of them.
    let shutdown = Arc::new(Notify::new());
    let mut tasks = Vec::with_capacity(config.repos.len());

    for repo in &config.repos {
        let name = repo.display_name();
        info!(
            repo = %name,
            path = %repo.path.display(),
            marker = %repo.marker.display(),
            "watching repository"
        );

        let synchronizer = Arc::new(RepositorySynchronizer::new(
            repo.handle(),
            CommitMarker::new(&repo.marker),
            pull_timeout,
        ));
        let sched = scheduler::Scheduler::new(name.clone(), synchronizer, poll_interval);
        let sched_shutdown = shutdown.clone();

        tasks.push((
            name,
            tokio::spawn(async move {
                sched.run(sched_shutdown).await;
            }),
        ));
    }

    // Wait for shutdown signal
    signals::wait_for_shutdown().await;

    info!("Shutdown signal received, stopping...");
    shutdown.notify_waiters();

    // Wait for each scheduler to finish its current cycle (up to 10s each)
    for (name, task) in tasks {
        match tokio::time::timeout(Duration::from_secs(10), task).await {
            Ok(Ok(())) => info!(repo = %name, "scheduler stopped gracefully"),
            Ok(Err(e)) => warn!(repo = %name, "scheduler task error: {}", e),
            Err(_) => warn!(repo = %name, "scheduler did not stop within 10s, forcing shutdown"),
        }
    }

    let uptime = (Utc::now() - started_at).num_seconds().max(0);
    info!(uptime_secs = uptime, "RepoWatch daemon stopped.");
    Ok(())
}
