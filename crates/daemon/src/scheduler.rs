//! Per-repository polling scheduler.
//!
//! Each watched repository gets its own [`Scheduler`] running synchronize
//! cycles on the configured interval. Repositories are independent: one
//! clone's failures never stall another's schedule. Within one scheduler,
//! cycles run strictly in sequence; a cycle that finds the previous one
//! still in flight is skipped, never queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time;
use tracing::{debug, error, info, warn};

use repowatch_core::errors::SyncError;
use repowatch_core::models::SyncOutcome;
use repowatch_core::synchronizer::RepositorySynchronizer;

/// Aggregate statistics across synchronize cycles.
pub struct SchedulerStats {
    pub total_cycles: AtomicU64,
    pub total_changes: AtomicU64,
    pub total_errors: AtomicU64,
    pub consecutive_errors: AtomicU64,
}

impl SchedulerStats {
    fn new() -> Self {
        Self {
            total_cycles: AtomicU64::new(0),
            total_changes: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            consecutive_errors: AtomicU64::new(0),
        }
    }
}

/// Polls one watched repository.
pub struct Scheduler {
    name: String,
    synchronizer: Arc<RepositorySynchronizer>,
    poll_interval: Duration,
    stats: Arc<SchedulerStats>,
}

impl Scheduler {
    pub fn new(
        name: String,
        synchronizer: Arc<RepositorySynchronizer>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            name,
            synchronizer,
            poll_interval,
            stats: Arc::new(SchedulerStats::new()),
        }
    }

    /// Main scheduler loop.
    ///
    /// Runs until `shutdown` is notified; an in-flight cycle finishes
    /// before the loop exits.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        info!(
            repo = %self.name,
            poll_interval_secs = self.poll_interval.as_secs(),
            "scheduler started"
        );

        let mut interval = time::interval(self.poll_interval);
        // The first tick fires immediately; consume it so the daemon
        // finishes starting up before the first cycle.
        interval.tick().await;

        // Pinned outside the loop so a notification arriving mid-cycle is
        // still observed on the next iteration.
        let stop = shutdown.notified();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
                _ = &mut stop => {
                    let cycles = self.stats.total_cycles.load(Ordering::SeqCst);
                    let changes = self.stats.total_changes.load(Ordering::SeqCst);
                    let errors = self.stats.total_errors.load(Ordering::SeqCst);
                    info!(repo = %self.name, cycles, changes, errors, "scheduler stopping");
                    break;
                }
            }
        }
    }

    /// Run one synchronize cycle and record the outcome.
    async fn run_cycle(&self) {
        let cycle = self.stats.total_cycles.fetch_add(1, Ordering::SeqCst) + 1;

        match self.synchronizer.synchronize().await {
            Ok(SyncOutcome::Changed { previous, current }) => {
                self.stats.consecutive_errors.store(0, Ordering::SeqCst);
                self.stats.total_changes.fetch_add(1, Ordering::SeqCst);
                info!(
                    repo = %self.name,
                    cycle,
                    previous = %previous,
                    current = %current,
                    marker = %self.synchronizer.marker().path().display(),
                    "head moved; marker published"
                );
            }
            Ok(SyncOutcome::Unchanged { head }) => {
                self.stats.consecutive_errors.store(0, Ordering::SeqCst);
                debug!(repo = %self.name, cycle, head = %head, "no new commits");
            }
            // Cycles within this scheduler run in sequence; this arm only
            // fires if another caller holds the same synchronizer.
            Err(SyncError::AlreadyRunning { .. }) => {
                warn!(repo = %self.name, cycle, "skipping cycle: previous invocation still running");
            }
            Err(e) => {
                let errors = self.stats.total_errors.fetch_add(1, Ordering::SeqCst) + 1;
                let consecutive = self
                    .stats
                    .consecutive_errors
                    .fetch_add(1, Ordering::SeqCst)
                    + 1;
                error!(
                    repo = %self.name,
                    cycle,
                    stage = ?e.stage().map(|s| s.to_string()),
                    error = %e,
                    total_errors = errors,
                    consecutive_errors = consecutive,
                    "sync cycle failed"
                );
            }
        }
    }
}
